//! # yomi-core
//!
//! Foundation types and pure utilities for the Yomi reading resolver.
//!
//! This crate provides the shared vocabulary that all other yomi crates
//! depend on:
//!
//! - **Kana utilities**: [`kana::normalize`], [`kana::is_trivial`],
//!   [`kana::mora_split`] — canonicalization and trivial-diff
//!   classification for phonetic strings
//! - **Hazard lookup**: [`hazard::is_hazard`], [`hazard::hazard_tags`],
//!   [`hazard::text_risk`] — the "always escalate" surface classes
//! - **Data model**: [`types::Segment`], [`types::Verdict`],
//!   [`types::ReadingConflict`], [`types::RubyToken`], [`types::KanaPatch`],
//!   [`types::RiskySpan`], [`types::BudgetReason`]
//! - **Logging**: [`logging::init_logging`] tracing bootstrap
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other yomi crates. Pure — no I/O
//! beyond the logging bootstrap.

#![deny(unsafe_code)]

pub mod hazard;
pub mod kana;
pub mod logging;
pub mod types;
