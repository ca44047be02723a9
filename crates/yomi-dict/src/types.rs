//! Dictionary entries, scopes, and on-disk document shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a correction entered the dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Hand-edited by an operator.
    Manual,
    /// Accepted from a judgement-model verdict.
    Judge,
    /// Bulk-imported from an external word list.
    Import,
}

/// One reading correction, keyed by surface form in a [`DictMap`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictEntry {
    /// Canonical reading for the surface.
    pub reading_primary: String,
    /// Optional alternate reading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading_alternate: Option<String>,
    /// Optional per-mora decomposition for ruby rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phonetic_decomposition: Option<String>,
    /// How the entry entered the dictionary.
    pub provenance: Provenance,
    /// Refreshed on every merge that touches this key.
    pub last_updated: DateTime<Utc>,
}

impl DictEntry {
    /// Create an entry with the current timestamp and no alternates.
    #[must_use]
    pub fn new(reading: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            reading_primary: reading.into(),
            reading_alternate: None,
            phonetic_decomposition: None,
            provenance,
            last_updated: Utc::now(),
        }
    }
}

/// In-memory dictionary: surface form → entry. Ordered for stable exports.
pub type DictMap = BTreeMap<String, DictEntry>;

/// Which document a dictionary operation targets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DictScope {
    /// The unconditional "learned words" document, applied before any
    /// other step of every resolution pass.
    Global,
    /// A named scope, e.g. one per content channel.
    Channel(String),
}

impl DictScope {
    /// File name of the scope's document under the store root.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Global => "global.json".to_owned(),
            Self::Channel(name) => format!("channel-{name}.json"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// On-disk documents
// ─────────────────────────────────────────────────────────────────────────────

/// Flat global document: `{version, updatedAt, words: {surface: reading}}`.
///
/// Deliberately provenance-free so it stays quick to hand-edit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GlobalDoc {
    pub version: u32,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub words: BTreeMap<String, String>,
}

/// Structured named-scope document with full entries.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScopedDoc {
    pub version: u32,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entries: DictMap,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
