//! Avatar name cache
//!
//! Resolves agent ids and handles to display names. Lookups are answered
//! from memory when possible; misses and stale entries are queued and sent in
//! batches on the next [`NameCache::tick`]. Answers come back through the
//! completion channel and are applied on a later tick, firing any callbacks
//! registered for the key.
//!
//! Everything runs on the owner's thread. Transports only ever see a
//! [`CompletionSink`], never the cache itself.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod batch;
pub mod callbacks;
pub mod expiry;
pub mod index;

pub use batch::{BatchRequest, pack_requests};
pub use callbacks::{CallbackRegistry, NameCallback};
pub use expiry::{Clock, ManualClock, SystemClock};
pub use index::NameIndex;

use crate::config::NameCacheConfig;
use crate::models::{NameKey, NameRecord};
use crate::store::CacheDocument;
use crate::transport::{
    BatchOutcome, CompletionReceiver, CompletionSink, LegacyLookup, LookupTransport,
    TransportEvent, completion_channel,
};
use crate::utils::url::UrlUtils;

/// Notified when display names are switched on or off
pub type UseDisplayNamesListener = Box<dyn Fn(bool) + Send>;

pub struct NameCache {
    config: NameCacheConfig,
    /// Base lookup URL, `None` forces legacy mode
    lookup_url: Option<String>,
    use_display_names: bool,
    /// Immediate lookups are only attempted once running
    running: bool,
    index: NameIndex,
    /// Keys with a request in flight, and when it was issued
    pending: HashMap<NameKey, DateTime<Utc>>,
    /// Keys to send on the next tick
    queue: BTreeSet<NameKey>,
    callbacks: CallbackRegistry,
    listeners: Vec<UseDisplayNamesListener>,
    last_expire_check: Option<DateTime<Utc>>,
    transport: Box<dyn LookupTransport>,
    legacy: Box<dyn LegacyLookup>,
    clock: Arc<dyn Clock>,
    sink: CompletionSink,
    completions: CompletionReceiver,
}

impl NameCache {
    /// Create a cache in the state `config.running` says, using the wall clock
    pub fn new(
        config: NameCacheConfig,
        transport: Box<dyn LookupTransport>,
        legacy: Box<dyn LegacyLookup>,
    ) -> Self {
        let (sink, completions) = completion_channel();
        let mut cache = Self {
            lookup_url: None,
            use_display_names: config.use_display_names,
            running: config.running,
            index: NameIndex::new(),
            pending: HashMap::new(),
            queue: BTreeSet::new(),
            callbacks: CallbackRegistry::new(),
            listeners: Vec::new(),
            last_expire_check: None,
            transport,
            legacy,
            clock: Arc::new(SystemClock),
            sink,
            completions,
            config,
        };
        let configured = cache.config.lookup_url().map(str::to_string);
        cache.set_name_lookup_url(configured.as_deref());
        cache
    }

    /// Replace the clock used for expiry and pending decisions
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---------------------------------------------------------------------
    // Configuration surface
    // ---------------------------------------------------------------------

    /// Set or clear the batch lookup base URL. Empty or unparsable URLs clear it.
    pub fn set_name_lookup_url(&mut self, url: Option<&str>) {
        self.lookup_url = match url.map(str::trim).filter(|url| !url.is_empty()) {
            None => None,
            Some(url) => match UrlUtils::normalize_lookup_base(url) {
                Ok(normalized) => Some(normalized),
                Err(e) => {
                    warn!("Ignoring invalid name lookup URL '{}': {}", url, e);
                    None
                }
            },
        };
        info!(
            "Name lookup URL {}",
            self.lookup_url
                .as_deref()
                .map(UrlUtils::obfuscate_credentials)
                .unwrap_or_else(|| "unset, using legacy names".to_string())
        );
    }

    pub fn has_name_lookup_url(&self) -> bool {
        self.lookup_url.is_some()
    }

    pub fn name_lookup_url(&self) -> Option<&str> {
        self.lookup_url.as_deref()
    }

    /// Display names must be switched on and have a service to ask
    pub fn use_display_names(&self) -> bool {
        self.use_display_names && self.lookup_url.is_some()
    }

    /// Switch display names on or off. A change flushes the cache and
    /// notifies every listener.
    pub fn set_use_display_names(&mut self, enabled: bool) {
        if enabled == self.use_display_names {
            return;
        }
        self.use_display_names = enabled;
        self.index.clear();
        info!(
            "Display names {}, name cache flushed",
            if enabled { "enabled" } else { "disabled" }
        );
        for listener in &self.listeners {
            listener(enabled);
        }
    }

    pub fn add_use_display_names_listener(&mut self, listener: UseDisplayNamesListener) {
        self.listeners.push(listener);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    // ---------------------------------------------------------------------
    // Lookup API
    // ---------------------------------------------------------------------

    /// Immediate lookup.
    ///
    /// Returns whatever is cached, even if expired; an expired hit is queued
    /// for refresh unless a request is already in flight. A miss is queued the
    /// same way. Before the cache is running nothing is returned and every
    /// key is queued.
    pub fn get_key(&mut self, key: &NameKey) -> Option<NameRecord> {
        if self.running {
            if self.use_display_names() {
                if let Some(record) = self.index.get(key).cloned() {
                    if record.is_expired(self.now()) && !self.is_request_pending(key) {
                        debug!("refresh agent {}", key);
                        self.queue.insert(key.clone());
                    }
                    return Some(record);
                }
            } else if let NameKey::AgentId(agent_id) = key
                && let Some(full_name) = self.legacy.cached_full_name(agent_id)
            {
                return Some(NameRecord::from_legacy(*agent_id, &full_name));
            }
        }

        self.enqueue(key);
        None
    }

    /// Immediate lookup by agent id
    pub fn get(&mut self, agent_id: Uuid) -> Option<NameRecord> {
        self.get_key(&NameKey::AgentId(agent_id))
    }

    /// Lookup with a callback.
    ///
    /// A fresh cached record fires `callback` before this returns. Otherwise
    /// the key is queued and `callback` runs once, when the key resolves.
    pub fn get_key_with<F>(&mut self, key: &NameKey, callback: F)
    where
        F: FnOnce(&NameKey, &NameRecord) + Send + 'static,
    {
        if self.running {
            if self.use_display_names() {
                if let Some(record) = self.index.get(key)
                    && record.expires > self.now()
                {
                    debug!("name for {} already cached, firing now", key);
                    callback(key, record);
                    return;
                }
            } else if let NameKey::AgentId(agent_id) = key
                && let Some(full_name) = self.legacy.cached_full_name(agent_id)
            {
                let record = NameRecord::from_legacy(*agent_id, &full_name);
                callback(key, &record);
                return;
            }
        }

        self.enqueue(key);
        // stored even when a request is already pending
        self.callbacks.register(key.clone(), Box::new(callback));
    }

    /// Lookup with a callback taking the agent id
    pub fn get_with<F>(&mut self, agent_id: Uuid, callback: F)
    where
        F: FnOnce(Uuid, &NameRecord) + Send + 'static,
    {
        self.get_key_with(&NameKey::AgentId(agent_id), move |key, record| {
            callback(key.as_uuid().unwrap_or(agent_id), record)
        });
    }

    /// Forget an agent under both its id and its handle. Waiting callbacks
    /// are left alone.
    pub fn erase(&mut self, agent_id: Uuid) {
        self.index.remove(&NameKey::AgentId(agent_id));
    }

    /// Re-request an agent even if a request is already in flight, keeping
    /// the current entry until the answer arrives
    pub fn fetch(&mut self, agent_id: Uuid) {
        self.queue.insert(NameKey::AgentId(agent_id));
    }

    /// Seed the cache with a record known from elsewhere
    pub fn insert(&mut self, agent_id: Uuid, record: NameRecord) {
        self.index.insert(agent_id, record);
    }

    /// Whether a request for `key` is in flight and not yet stale
    pub fn is_request_pending(&self, key: &NameKey) -> bool {
        let stale_before = expiry::saturating_sub(self.now(), self.config.pending_timeout);
        self.pending
            .get(key)
            .is_some_and(|issued| *issued > stale_before)
    }

    fn enqueue(&mut self, key: &NameKey) {
        if !self.is_request_pending(key) {
            debug!("queue request for {}", key);
            self.queue.insert(key.clone());
        }
    }

    // ---------------------------------------------------------------------
    // Periodic processing
    // ---------------------------------------------------------------------

    /// Drive the cache: apply finished lookups, send queued keys and sweep
    /// long-expired entries. Call once per frame or event-loop turn.
    pub fn tick(&mut self) {
        self.running = true;

        self.process_completions();

        if !self.queue.is_empty() {
            if self.use_display_names() {
                self.request_names_via_lookup();
            } else {
                self.request_names_via_legacy();
            }
        }

        self.erase_unrefreshed();
    }

    /// Apply every completion reported so far, returning how many
    pub fn process_completions(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.completions.try_recv() {
            processed += 1;
            match event {
                TransportEvent::Batch { keys, outcome } => self.handle_batch(keys, outcome),
                TransportEvent::Legacy {
                    agent_id,
                    full_name,
                } => self.handle_legacy_name(agent_id, &full_name),
            }
        }
        processed
    }

    fn request_names_via_lookup(&mut self) {
        let Some(base_url) = self.lookup_url.clone() else {
            return;
        };
        let now = self.now();
        let queued = std::mem::take(&mut self.queue);

        // a key that alone breaks the URL ceiling can never be sent
        let max_length = self.config.url_max_length;
        let (oversized, sendable): (Vec<NameKey>, Vec<NameKey>) = queued
            .into_iter()
            .partition(|key| base_url.len() + 1 + key.query_pair().len() > max_length);
        for key in &oversized {
            warn!(
                "lookup URL for {} would exceed {} bytes, not sending",
                key, max_length
            );
            self.pending.insert(key.clone(), now);
            self.handle_agent_error(key);
        }

        let requests = pack_requests(&base_url, &sendable, self.config.url_send_threshold);
        let total = sendable.len();

        for request in requests {
            // marked before sending so a synchronous failure still finds them
            for key in &request.keys {
                self.pending.insert(key.clone(), now);
            }
            debug!(
                "requesting {} of {} names via lookup service",
                request.keys.len(),
                total
            );
            self.transport.dispatch(request, self.sink.clone());
        }
    }

    fn request_names_via_legacy(&mut self) {
        let now = self.now();
        let queued = std::mem::take(&mut self.queue);

        for key in queued {
            if let NameKey::AgentId(agent_id) = key {
                self.pending.insert(key, now);
                debug!("requesting legacy name for {}", agent_id);
                self.legacy.request(agent_id, self.sink.clone());
            }
        }
    }

    fn handle_batch(&mut self, keys: Vec<NameKey>, outcome: BatchOutcome) {
        match outcome {
            BatchOutcome::Success {
                response,
                cache_control,
            } => {
                let now = self.now();
                let expires = expiry::name_expiration(
                    cache_control.as_deref(),
                    now,
                    self.config.default_expiry,
                );
                let requested: HashSet<&NameKey> = keys.iter().collect();
                let mut answered: HashSet<NameKey> = HashSet::new();

                for agent in response.agents.iter().cloned() {
                    let record = agent.into_record(expires);
                    debug!(
                        "lookup result for {} user '{}' display '{}' expires in {} seconds",
                        record.agent_id,
                        record.username,
                        record.display_name,
                        (expires - now).num_seconds()
                    );

                    let id_key = NameKey::AgentId(record.agent_id);
                    let handle_key = (!record.username.is_empty())
                        .then(|| NameKey::Username(record.username.clone()));

                    self.process_key(&id_key, record.clone(), true);
                    answered.insert(id_key);

                    // requests made by handle wait under the handle key
                    if let Some(handle_key) = handle_key
                        && requested.contains(&handle_key)
                    {
                        self.process_key(&handle_key, record, false);
                        answered.insert(handle_key);
                    }
                }

                for key in response.unresolved_keys() {
                    warn!(
                        "unresolved key {}; expires in {} seconds",
                        key,
                        (expires - now).num_seconds()
                    );
                    self.handle_agent_error(&key);
                    answered.insert(key);
                }

                for key in keys.iter().filter(|key| !answered.contains(*key)) {
                    warn!("lookup response did not mention {}", key);
                    self.handle_agent_error(key);
                }

                debug!("{} cached names", self.index.len());
            }
            BatchOutcome::Failed { reason } => {
                warn!("name lookup failed for {} keys: {}", keys.len(), reason);
                for key in &keys {
                    self.handle_agent_error(key);
                }
            }
        }
    }

    /// Recover from a failed lookup of `key`: a cached entry, even an
    /// expired one, stays authoritative; otherwise fall back to legacy names.
    fn handle_agent_error(&mut self, key: &NameKey) {
        if let Some(record) = self.index.get(key) {
            debug!(
                "using cached name for {} user '{}' display '{}'",
                key, record.username, record.display_name
            );
            self.pending.remove(key);
            return;
        }

        match key {
            NameKey::AgentId(agent_id) => {
                warn!("falling back to legacy name for {}", agent_id);
                self.legacy.request(*agent_id, self.sink.clone());
            }
            NameKey::Username(_) => {
                // legacy names cannot be looked up by handle
                warn!("no name available for {}", key);
                self.pending.remove(key);
            }
        }
    }

    fn handle_legacy_name(&mut self, agent_id: Uuid, full_name: &str) {
        debug!("legacy name for {} is '{}'", agent_id, full_name);
        let record = NameRecord::from_legacy(agent_id, full_name);
        // the legacy system keeps its own copy; temporary names stay out of the cache
        self.process_key(&NameKey::AgentId(agent_id), record, false);
    }

    /// Store (optionally), clear pending state and notify everyone waiting
    fn process_key(&mut self, key: &NameKey, record: NameRecord, add_to_cache: bool) {
        if add_to_cache {
            self.index.insert(record.agent_id, record.clone());
        }
        self.pending.remove(key);
        self.callbacks.fire(key, &record);
    }

    /// Remove entries that went unrefreshed past `max_unrefreshed`, at most
    /// once per that interval
    fn erase_unrefreshed(&mut self) {
        let now = self.now();
        let max_unrefreshed = expiry::saturating_sub(now, self.config.max_unrefreshed);

        let due = self
            .last_expire_check
            .is_none_or(|last| last < max_unrefreshed);
        if !due {
            return;
        }

        self.last_expire_check = Some(now);
        let removed = self.index.remove_expired_before(max_unrefreshed);
        if removed > 0 {
            debug!("erased {} unrefreshed names", removed);
        }
        info!("{} cached avatar names", self.index.len());
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    /// Load entries from a stored document, returning how many were added.
    /// Expired entries are kept until the first sweep.
    pub fn import(&mut self, document: CacheDocument) -> usize {
        let mut loaded = 0;
        for (stored_key, mut record) in document.agents {
            record.is_temporary = false;
            match Uuid::parse_str(&stored_key) {
                Ok(agent_id) => {
                    self.index.insert(agent_id, record);
                    loaded += 1;
                }
                Err(_) if !record.agent_id.is_nil() => {
                    self.index.insert(record.agent_id, record);
                    loaded += 1;
                }
                Err(_) => debug!("skipping stored name without agent id: {}", stored_key),
            }
        }
        info!("loaded {} cached avatar names", self.index.len());
        loaded
    }

    /// Snapshot for storage, leaving out temporary and long-expired entries
    pub fn export(&self) -> CacheDocument {
        let max_unrefreshed = expiry::saturating_sub(self.now(), self.config.max_unrefreshed);
        let agents = self
            .index
            .iter()
            .filter(|(_, record)| !record.is_temporary && record.expires >= max_unrefreshed)
            .map(|(agent_id, record)| (agent_id.to_string(), record.clone()))
            .collect();
        CacheDocument { agents }
    }

    // ---------------------------------------------------------------------
    // Teardown and diagnostics
    // ---------------------------------------------------------------------

    /// Stop and drop every waiting callback without firing it. Cached
    /// entries survive so they can still be exported.
    pub fn shutdown(&mut self) {
        let dropped = self.callbacks.clear();
        let in_flight = self.pending.len();
        self.pending.clear();
        self.queue.clear();
        self.running = false;
        info!(
            "Name cache shut down ({} callbacks dropped, {} requests abandoned)",
            dropped, in_flight
        );
    }

    /// Distinct cached records
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, key: &NameKey) -> bool {
        self.queue.contains(key)
    }

    /// Keys with callbacks still waiting
    pub fn waiting_len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn config(&self) -> &NameCacheConfig {
        &self.config
    }
}

impl std::fmt::Debug for NameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameCache")
            .field("lookup_url", &self.lookup_url)
            .field("use_display_names", &self.use_display_names)
            .field("running", &self.running)
            .field("cached", &self.index.len())
            .field("pending", &self.pending.len())
            .field("queued", &self.queue.len())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
