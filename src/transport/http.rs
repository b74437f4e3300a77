use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::{BatchOutcome, CompletionSink, LookupTransport};
use crate::cache::BatchRequest;
use crate::errors::{NameCacheError, NameCacheResult};
use crate::models::LookupResponse;
use crate::utils::url::UrlUtils;

/// Batch lookup over HTTP, one spawned task per request
#[derive(Debug, Clone)]
pub struct HttpLookupTransport {
    client: Client,
    runtime: Handle,
}

impl HttpLookupTransport {
    /// Build a transport on the current tokio runtime
    pub fn new(timeout: Duration) -> NameCacheResult<Self> {
        Self::with_runtime(timeout, Handle::try_current()?)
    }

    pub fn with_runtime(timeout: Duration, runtime: Handle) -> NameCacheResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, runtime })
    }

    /// Perform one lookup and return the payload plus its Cache-Control
    pub async fn fetch(
        client: &Client,
        url: &str,
    ) -> NameCacheResult<(LookupResponse, Option<String>)> {
        debug!("query is [{}]", UrlUtils::obfuscate_credentials(url));

        let response = client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Self::process_response(response, url).await
    }

    async fn process_response(
        response: Response,
        url: &str,
    ) -> NameCacheResult<(LookupResponse, Option<String>)> {
        if !response.status().is_success() {
            return Err(NameCacheError::LookupStatus {
                status: response.status().as_u16(),
                url: UrlUtils::obfuscate_credentials(url),
            });
        }

        let cache_control = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await?;
        let payload: LookupResponse = serde_json::from_slice(&body)?;

        debug!(
            "Lookup returned {} agents, {} unresolved (cache-control: {:?})",
            payload.agents.len(),
            payload.bad_ids.len() + payload.bad_usernames.len(),
            cache_control
        );

        Ok((payload, cache_control))
    }
}

impl LookupTransport for HttpLookupTransport {
    fn dispatch(&self, request: BatchRequest, sink: CompletionSink) {
        let client = self.client.clone();
        self.runtime.spawn(async move {
            let outcome = match Self::fetch(&client, &request.url).await {
                Ok((response, cache_control)) => BatchOutcome::Success {
                    response,
                    cache_control,
                },
                Err(e) => {
                    warn!(
                        "Name lookup for {} keys failed: {}",
                        request.keys.len(),
                        e
                    );
                    BatchOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            sink.complete_batch(request.keys, outcome);
        });
    }
}
