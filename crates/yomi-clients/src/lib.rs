//! # yomi-clients
//!
//! Traits and HTTP implementations for the three external collaborators of
//! the reading resolver:
//!
//! - **Morphological analyzer**: [`analyzer::MorphologicalAnalyzer`] —
//!   deterministic tokenization with baseline readings
//! - **Speech engine**: [`engine::SpeechEngine`] — live audio-query
//!   predictions with per-mora output
//! - **Judgement client**: [`judge::JudgementClient`] — batched remote
//!   arbitration with lenient response parsing
//!
//! All remote calls carry an explicit timeout; timeout and transport
//! failure surface as distinct-but-equivalent error variants that callers
//! treat identically (fail open or fail the run, per call site).
//!
//! ## Crate Position
//!
//! Depends on yomi-core. Depended on by yomi-runtime.

#![deny(unsafe_code)]

pub mod analyzer;
pub mod engine;
pub mod judge;

pub use analyzer::{AnalyzerError, HttpAnalyzer, MorphToken, MorphologicalAnalyzer, baseline_reading};
pub use engine::{AccentPhrase, AudioQuery, EngineError, HttpSpeechEngine, Mora, SpeechEngine};
pub use judge::{
    HttpJudgementClient, ItemVerdict, JudgeBatch, JudgeError, JudgeItem, JudgementClient,
    Replacement, parse_verdicts,
};
