//! Persistent name cache document
//!
//! The cache is stored as one JSON object keyed by stringified agent id:
//!
//! ```json
//! {
//!   "agents": {
//!     "3941037e-78ab-45f0-b421-bd6e77c1804d": {
//!       "id": "3941037e-78ab-45f0-b421-bd6e77c1804d",
//!       "username": "sardonyx.linden",
//!       "display_name": "Bjork Gudmundsdottir",
//!       "legacy_name": "Sardonyx Linden",
//!       "is_display_name_default": false,
//!       "expires": "2010-04-16T21:32:26Z"
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::NameCacheResult;
use crate::models::NameRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDocument {
    #[serde(default)]
    pub agents: BTreeMap<String, NameRecord>,
}

impl CacheDocument {
    pub fn from_reader<R: Read>(reader: R) -> NameCacheResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> NameCacheResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// File-backed storage for [`CacheDocument`]
#[derive(Debug, Clone)]
pub struct PersistentStore {
    path: PathBuf,
}

impl PersistentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored document; a missing file is not an error
    pub fn load(&self) -> NameCacheResult<Option<CacheDocument>> {
        if !self.path.exists() {
            debug!("No stored name cache at {}", self.path.display());
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        let document = CacheDocument::from_reader(BufReader::new(file))?;
        info!(
            "Read {} stored names from {}",
            document.len(),
            self.path.display()
        );
        Ok(Some(document))
    }

    /// Write the document, replacing any previous file atomically
    pub fn save(&self, document: &CacheDocument) -> NameCacheResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let staging = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            document.to_writer(&mut writer)?;
            writer.flush()?;
        }
        std::fs::rename(&staging, &self.path)?;

        info!(
            "Wrote {} names to {}",
            document.len(),
            self.path.display()
        );
        Ok(())
    }
}
