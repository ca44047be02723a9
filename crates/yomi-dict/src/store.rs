//! File-backed dictionary store with atomic replace-on-write.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::types::{DictEntry, DictMap, DictScope, GlobalDoc, ScopedDoc};

/// Errors from dictionary persistence.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    /// Filesystem failure reading or writing a document.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A document exists but does not parse.
    #[error("malformed dictionary document {path}: {source}")]
    Malformed {
        /// Offending document path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failure on write (should not happen for these types).
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Store of reading corrections, one JSON document per scope.
///
/// Shared mutably across concurrent runs of the same scope: every write is
/// an atomic replace (temp file + rename in the same directory), so readers
/// never observe a torn document and last-writer-wins per document.
#[derive(Clone, Debug)]
pub struct ReadingDictionary {
    root: PathBuf,
}

impl ReadingDictionary {
    /// Open a store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a scope's document.
    #[must_use]
    pub fn path_for(&self, scope: &DictScope) -> PathBuf {
        self.root.join(scope.file_name())
    }

    /// Load one scope's entries. A missing document is an empty map.
    pub fn load(&self, scope: &DictScope) -> Result<DictMap, DictError> {
        let path = self.path_for(scope);
        let Some(raw) = read_if_exists(&path)? else {
            return Ok(DictMap::new());
        };
        match scope {
            DictScope::Global => {
                let doc: GlobalDoc = parse_doc(&path, &raw)?;
                let stamp = doc.updated_at.unwrap_or_else(Utc::now);
                Ok(doc
                    .words
                    .into_iter()
                    .map(|(surface, reading)| {
                        let mut entry = DictEntry::new(reading, crate::types::Provenance::Manual);
                        entry.last_updated = stamp;
                        (surface, entry)
                    })
                    .collect())
            }
            DictScope::Channel(_) => {
                let doc: ScopedDoc = parse_doc(&path, &raw)?;
                Ok(doc.entries)
            }
        }
    }

    /// Load the effective dictionary for a scope: the global learned-words
    /// document first, then the named scope's entries over it.
    pub fn load_effective(&self, scope: &DictScope) -> Result<DictMap, DictError> {
        let mut map = self.load(&DictScope::Global)?;
        if *scope != DictScope::Global {
            map.extend(self.load(scope)?);
        }
        Ok(map)
    }

    /// Idempotent upsert of `updates` into a scope's document.
    ///
    /// Later write wins per key; each touched key gets a fresh
    /// `lastUpdated`. Empty surfaces and no-op corrections (surface equal
    /// to its own reading) are rejected at this boundary — logged and
    /// skipped, never stored. Returns the merged map as persisted.
    pub fn merge(
        &self,
        scope: &DictScope,
        updates: impl IntoIterator<Item = (String, DictEntry)>,
    ) -> Result<DictMap, DictError> {
        let mut map = self.load(scope)?;
        let now = Utc::now();
        let mut accepted = 0usize;
        for (surface, mut entry) in updates {
            if surface.is_empty() {
                warn!("rejecting dictionary entry with empty surface");
                continue;
            }
            if surface == entry.reading_primary {
                warn!(surface, "rejecting no-op dictionary entry");
                continue;
            }
            entry.last_updated = now;
            let _ = map.insert(surface, entry);
            accepted += 1;
        }
        self.persist(scope, &map)?;
        debug!(scope = %scope.file_name(), accepted, total = map.len(), "dictionary merged");
        Ok(map)
    }

    /// Flatten a map to `surface → reading`, dropping provenance.
    #[must_use]
    pub fn export_flat(map: &DictMap) -> BTreeMap<String, String> {
        map.iter()
            .map(|(surface, entry)| (surface.clone(), entry.reading_primary.clone()))
            .collect()
    }

    /// Write a scope's document via temp-file-then-rename in the document's
    /// own directory, so the replace is atomic on the same filesystem.
    fn persist(&self, scope: &DictScope, map: &DictMap) -> Result<(), DictError> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(scope);
        let version = next_version(&path);
        let json = match scope {
            DictScope::Global => serde_json::to_string_pretty(&GlobalDoc {
                version,
                updated_at: Some(Utc::now()),
                words: Self::export_flat(map),
            })?,
            DictScope::Channel(_) => serde_json::to_string_pretty(&ScopedDoc {
                version,
                updated_at: Some(Utc::now()),
                entries: map.clone(),
            })?,
        };
        let tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        fs::write(tmp.path(), json)?;
        let _ = tmp.persist(&path).map_err(|e| DictError::Io(e.error))?;
        Ok(())
    }
}

fn read_if_exists(path: &Path) -> Result<Option<String>, DictError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DictError::Io(e)),
    }
}

fn parse_doc<T: serde::de::DeserializeOwned>(path: &Path, raw: &str) -> Result<T, DictError> {
    serde_json::from_str(raw).map_err(|source| DictError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Version counter: previous document's version + 1, starting at 1.
fn next_version(path: &Path) -> u32 {
    #[derive(serde::Deserialize)]
    struct VersionOnly {
        #[serde(default)]
        version: u32,
    }
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<VersionOnly>(&raw).ok())
        .map_or(1, |v| v.version + 1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
