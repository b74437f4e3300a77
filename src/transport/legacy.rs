use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::{CompletionSink, LegacyLookup};
use crate::errors::NameCacheResult;

/// In-memory legacy name directory
///
/// Another subsystem feeds full names in through [`LegacyDirectory::insert`];
/// clones share the same storage, so the cache can own one handle while the
/// feeder keeps another.
#[derive(Debug, Clone, Default)]
pub struct LegacyDirectory {
    names: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl LegacyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent_id: Uuid, full_name: impl Into<String>) {
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(agent_id, full_name.into());
    }

    /// Merge a JSON object of `"<agent id>": "<full name>"` pairs, returning
    /// how many were read
    pub fn load_json<R: Read>(&self, reader: R) -> NameCacheResult<usize> {
        let names: HashMap<Uuid, String> = serde_json::from_reader(reader)?;
        let loaded = names.len();
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(names);
        Ok(loaded)
    }

    pub fn load_file(&self, path: &Path) -> NameCacheResult<usize> {
        let file = File::open(path)?;
        let loaded = self.load_json(BufReader::new(file))?;
        info!("Read {} legacy names from {}", loaded, path.display());
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LegacyLookup for LegacyDirectory {
    fn cached_full_name(&self, agent_id: &Uuid) -> Option<String> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(agent_id)
            .cloned()
    }

    fn request(&self, agent_id: Uuid, sink: CompletionSink) {
        match self.cached_full_name(&agent_id) {
            Some(full_name) => sink.complete_legacy(agent_id, full_name),
            None => debug!("Legacy directory has no name for {}", agent_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportEvent, completion_channel};

    #[test]
    fn test_clones_share_names() {
        let directory = LegacyDirectory::new();
        let feeder = directory.clone();
        let id = Uuid::new_v4();
        feeder.insert(id, "Sardonyx Linden");

        assert_eq!(
            directory.cached_full_name(&id).as_deref(),
            Some("Sardonyx Linden")
        );
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_request_completes_known_names_only() {
        let directory = LegacyDirectory::new();
        let known = Uuid::new_v4();
        directory.insert(known, "Known Resident");
        let (sink, mut rx) = completion_channel();

        directory.request(Uuid::new_v4(), sink.clone());
        directory.request(known, sink);

        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::Legacy {
                agent_id: known,
                full_name: "Known Resident".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_load_file_merges_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy_names.json");
        std::fs::write(
            &path,
            r#"{"3941037e-78ab-45f0-b421-bd6e77c1804d": "Sardonyx Linden"}"#,
        )
        .unwrap();

        let directory = LegacyDirectory::new();
        directory.insert(Uuid::new_v4(), "Earlier Resident");
        assert_eq!(directory.load_file(&path).unwrap(), 1);
        assert_eq!(directory.len(), 2);

        let id = Uuid::parse_str("3941037e-78ab-45f0-b421-bd6e77c1804d").unwrap();
        assert_eq!(
            directory.cached_full_name(&id).as_deref(),
            Some("Sardonyx Linden")
        );
    }

    #[test]
    fn test_load_json_rejects_non_uuid_keys() {
        let directory = LegacyDirectory::new();
        assert!(
            directory
                .load_json(r#"{"bob": "Bob Resident"}"#.as_bytes())
                .is_err()
        );
        assert!(directory.is_empty());
    }
}
