//! Resolution settings with compiled defaults and file overrides.
//!
//! A settings file overrides only the keys it names; everything else keeps
//! the compiled default. A missing or unreadable file falls back to
//! defaults with a warning, never an error.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables for one resolution run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolveSettings {
    /// Engine voice to query.
    pub voice_id: u32,
    /// Conflicts per judge batch in segment arbitration.
    pub arbiter_batch_size: usize,
    /// Terms per judge batch in the ruby audit.
    pub audit_batch_size: usize,
    /// Hard ceiling on judge calls per audit run.
    pub max_judge_calls: usize,
    /// Hard ceiling on distinct escalated terms per audit run.
    pub max_terms: usize,
    /// Run the token-level ruby audit after arbitration.
    pub audit: bool,
    /// Include level-B (kanji-only) segments in the audit.
    pub audit_level_b: bool,
    /// Example contexts attached per audited term.
    pub context_examples: usize,
    /// Per-request engine deadline.
    pub engine_timeout_ms: u64,
    /// Per-request judge deadline.
    pub judge_timeout_ms: u64,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            voice_id: 1,
            arbiter_batch_size: 10,
            audit_batch_size: 20,
            max_judge_calls: 8,
            max_terms: 120,
            audit: false,
            audit_level_b: false,
            context_examples: 3,
            engine_timeout_ms: 5_000,
            judge_timeout_ms: 30_000,
        }
    }
}

impl ResolveSettings {
    /// Load settings from a JSON file, falling back to defaults when the
    /// file is missing or malformed.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, ?path, "settings file unreadable, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, ?path, "settings file malformed, using defaults");
                Self::default()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
