//! Dual index over cached records
//!
//! Records are stored once, keyed by agent id. Handles resolve through a
//! secondary handle -> id map, so both keys always see the same value and a
//! removal through either one drops both.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{NameKey, NameRecord};

#[derive(Debug, Default)]
pub struct NameIndex {
    records: HashMap<Uuid, NameRecord>,
    handles: HashMap<String, Uuid>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self, key: &NameKey) -> Option<Uuid> {
        match key {
            NameKey::AgentId(id) => Some(*id),
            NameKey::Username(name) => self.handles.get(name).copied(),
        }
    }

    pub fn get(&self, key: &NameKey) -> Option<&NameRecord> {
        self.resolve(key).and_then(|id| self.records.get(&id))
    }

    pub fn contains(&self, key: &NameKey) -> bool {
        self.get(key).is_some()
    }

    /// Store `record` under `agent_id`, and under its handle when it has one
    pub fn insert(&mut self, agent_id: Uuid, record: NameRecord) {
        if let Some(previous) = self.records.get(&agent_id)
            && previous.username != record.username
        {
            let stale = previous.username.clone();
            self.unlink_handle(&stale, agent_id);
        }

        if !record.username.is_empty() {
            self.handles.insert(record.username.clone(), agent_id);
        }
        self.records.insert(agent_id, record);
    }

    /// Remove the entry reachable through `key` along with its paired key
    pub fn remove(&mut self, key: &NameKey) -> Option<NameRecord> {
        let agent_id = self.resolve(key)?;
        let record = self.records.remove(&agent_id)?;
        self.unlink_handle(&record.username, agent_id);
        Some(record)
    }

    /// Drop every record that expired before `cutoff`, returning how many went
    pub fn remove_expired_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.expires >= cutoff);
        let records = &self.records;
        self.handles.retain(|_, agent_id| records.contains_key(agent_id));
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.handles.clear();
    }

    /// Distinct records held, not counting handle aliases
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &NameRecord)> {
        self.records.iter()
    }

    fn unlink_handle(&mut self, handle: &str, agent_id: Uuid) {
        if handle.is_empty() {
            return;
        }
        if self.handles.get(handle) == Some(&agent_id) {
            self.handles.remove(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn record(agent_id: Uuid, username: &str, expires: DateTime<Utc>) -> NameRecord {
        NameRecord {
            agent_id,
            username: username.to_string(),
            display_name: format!("{username} display"),
            legacy_name: String::new(),
            is_display_name_default: false,
            is_temporary: false,
            expires,
        }
    }

    #[test]
    fn test_both_keys_resolve_to_same_record() {
        let mut index = NameIndex::new();
        let id = Uuid::new_v4();
        index.insert(id, record(id, "bob", Utc::now()));

        let by_id = index.get(&NameKey::AgentId(id)).unwrap();
        let by_handle = index.get(&NameKey::from("bob")).unwrap();
        assert_eq!(by_id, by_handle);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_empty_handle_not_indexed() {
        let mut index = NameIndex::new();
        let id = Uuid::new_v4();
        index.insert(id, record(id, "", Utc::now()));
        assert!(index.contains(&NameKey::AgentId(id)));
        assert!(!index.contains(&NameKey::from("")));
    }

    #[test]
    fn test_remove_through_either_key_drops_both() {
        let mut index = NameIndex::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        index.insert(first, record(first, "alice", Utc::now()));
        index.insert(second, record(second, "bob", Utc::now()));

        assert!(index.remove(&NameKey::AgentId(first)).is_some());
        assert!(!index.contains(&NameKey::from("alice")));

        assert!(index.remove(&NameKey::from("bob")).is_some());
        assert!(!index.contains(&NameKey::AgentId(second)));
        assert!(index.is_empty());
        assert!(index.remove(&NameKey::from("bob")).is_none());
    }

    #[test]
    fn test_renamed_handle_unlinks_old_alias() {
        let mut index = NameIndex::new();
        let id = Uuid::new_v4();
        index.insert(id, record(id, "old.name", Utc::now()));
        index.insert(id, record(id, "new.name", Utc::now()));

        assert!(!index.contains(&NameKey::from("old.name")));
        assert!(index.contains(&NameKey::from("new.name")));
    }

    #[test]
    fn test_remove_expired_before_drops_aliases() {
        let mut index = NameIndex::new();
        let now = Utc::now();
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        index.insert(stale, record(stale, "stale", now - TimeDelta::minutes(30)));
        index.insert(fresh, record(fresh, "fresh", now));

        let removed = index.remove_expired_before(now - TimeDelta::minutes(20));
        assert_eq!(removed, 1);
        assert!(!index.contains(&NameKey::from("stale")));
        assert!(!index.contains(&NameKey::AgentId(stale)));
        assert!(index.contains(&NameKey::from("fresh")));
    }
}
