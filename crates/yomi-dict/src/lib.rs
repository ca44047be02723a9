//! # yomi-dict
//!
//! Versioned, mergeable, atomically persisted store of reading corrections.
//!
//! - **Entries**: [`types::DictEntry`] with provenance and timestamps
//! - **Scopes**: [`types::DictScope`] — one unconditional global
//!   "learned words" document plus per-channel structured documents
//! - **Store**: [`store::ReadingDictionary`] — `load` / `merge` /
//!   `load_effective` / `export_flat`, all writes atomic-replace
//!
//! Persistence is plain human-editable JSON, one document per scope.
//! Writers replace atomically; readers never observe a torn document.
//! Last-writer-wins per key is the accepted conflict policy.
//!
//! ## Crate Position
//!
//! Leaf crate. Depended on by yomi-runtime.

#![deny(unsafe_code)]

pub mod store;
pub mod types;

pub use store::{DictError, ReadingDictionary};
pub use types::{DictEntry, DictMap, DictScope, Provenance};
