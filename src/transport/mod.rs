//! Collaborators the cache talks to and the channel their answers come back on
//!
//! Transports may finish on any thread. They never touch cache state: each
//! completion is pushed onto a [`CompletionSink`] and the cache drains the
//! matching receiver from its own `tick()`, so all mutation stays on the
//! cache's single execution context.

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::cache::BatchRequest;
use crate::models::{LookupResponse, NameKey};

pub mod http;
pub mod legacy;

pub use http::HttpLookupTransport;
pub use legacy::LegacyDirectory;

/// Result of one batch lookup round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Success {
        response: LookupResponse,
        /// Raw `Cache-Control` header, if the service sent one
        cache_control: Option<String>,
    },
    Failed {
        reason: String,
    },
}

/// A completed request, waiting to be applied to the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Batch {
        /// Keys the request carried
        keys: Vec<NameKey>,
        outcome: BatchOutcome,
    },
    Legacy {
        agent_id: Uuid,
        full_name: String,
    },
}

/// Sending half handed to transports with every request
#[derive(Debug, Clone)]
pub struct CompletionSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

pub type CompletionReceiver = mpsc::UnboundedReceiver<TransportEvent>;

pub fn completion_channel() -> (CompletionSink, CompletionReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CompletionSink { tx }, rx)
}

impl CompletionSink {
    pub fn complete_batch(&self, keys: Vec<NameKey>, outcome: BatchOutcome) {
        self.send(TransportEvent::Batch { keys, outcome });
    }

    pub fn complete_legacy(&self, agent_id: Uuid, full_name: impl Into<String>) {
        self.send(TransportEvent::Legacy {
            agent_id,
            full_name: full_name.into(),
        });
    }

    fn send(&self, event: TransportEvent) {
        // receiver is gone once the cache is dropped; late answers are moot
        if self.tx.send(event).is_err() {
            debug!("Name cache dropped before lookup completed");
        }
    }
}

/// Batched lookup against the name service
pub trait LookupTransport: Send {
    /// Start `request`; the answer must eventually be reported on `sink`.
    /// Must not block on the round trip.
    fn dispatch(&self, request: BatchRequest, sink: CompletionSink);
}

/// Single-id fallback lookup through the legacy name system
pub trait LegacyLookup: Send {
    /// Full name if the legacy system already knows it
    fn cached_full_name(&self, agent_id: &Uuid) -> Option<String>;

    /// Ask for `agent_id`, reporting the full name on `sink` when known
    fn request(&self, agent_id: Uuid, sink: CompletionSink);
}
