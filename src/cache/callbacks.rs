//! One-shot multicast callbacks keyed by lookup key

use std::collections::HashMap;

use crate::models::{NameKey, NameRecord};

/// Invoked once with the key it was registered under and the resolved record
pub type NameCallback = Box<dyn FnOnce(&NameKey, &NameRecord) + Send>;

/// Callbacks waiting for a key to resolve.
///
/// Firing a key runs every callback in registration order and then forgets
/// the entry, so each callback runs at most once.
#[derive(Default)]
pub struct CallbackRegistry {
    slots: HashMap<NameKey, Vec<NameCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: NameKey, callback: NameCallback) {
        self.slots.entry(key).or_default().push(callback);
    }

    /// Run and drop the callbacks for `key`, returning how many ran
    pub fn fire(&mut self, key: &NameKey, record: &NameRecord) -> usize {
        let Some(callbacks) = self.slots.remove(key) else {
            return 0;
        };
        let fired = callbacks.len();
        for callback in callbacks {
            callback(key, record);
        }
        fired
    }

    pub fn is_waiting(&self, key: &NameKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Keys with at least one waiting callback
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every waiting callback without running it, returning how many
    pub fn clear(&mut self) -> usize {
        let dropped = self.slots.values().map(Vec::len).sum();
        self.slots.clear();
        dropped
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("keys", &self.slots.len())
            .finish()
    }
}
