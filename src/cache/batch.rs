//! Packing queued keys into as few lookup URLs as possible

use crate::models::NameKey;

/// One outbound GET against the lookup service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub url: String,
    /// Keys carried by this request, in query order
    pub keys: Vec<NameKey>,
}

/// Accumulate `param=value` pairs onto `base_url`, closing a request as soon
/// as its URL grows past `send_threshold` bytes.
///
/// URL format is like
/// `http://names.example.com/agents/?ids=<uuid>&ids=<uuid>&username=<handle>`.
pub fn pack_requests<'a, I>(base_url: &str, keys: I, send_threshold: usize) -> Vec<BatchRequest>
where
    I: IntoIterator<Item = &'a NameKey>,
{
    let first_separator = if base_url.contains('?') { '&' } else { '?' };
    let mut requests = Vec::new();
    let mut url = String::new();
    let mut batch = Vec::new();

    for key in keys {
        if url.is_empty() {
            url.push_str(base_url);
            url.push(first_separator);
        } else {
            url.push('&');
        }
        url.push_str(&key.query_pair());
        batch.push(key.clone());

        if url.len() > send_threshold {
            requests.push(BatchRequest {
                url: std::mem::take(&mut url),
                keys: std::mem::take(&mut batch),
            });
        }
    }

    if !url.is_empty() {
        requests.push(BatchRequest { url, keys: batch });
    }

    requests
}
