//! # yomi-runtime
//!
//! The reading-resolution pipeline: segmentation, arbitration, ruby audit,
//! and partial-resume orchestration.
//!
//! - **Segmenter**: deterministic split of raw text into ordered segments
//!   with heading/pause metadata
//! - **Segment arbiter**: per-segment baseline-vs-engine comparison,
//!   dictionary priority, batched judge escalation, verdict application
//! - **Ruby auditor**: token-level pass over risky segments with mora
//!   alignment, bounded by hard call/term budgets
//! - **Orchestrator**: sequences segmenter → arbiter (→ audit), owns the
//!   run log, and reuses prior verdicts on partial re-runs
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on: yomi-core, yomi-dict, yomi-clients.

#![deny(unsafe_code)]

pub mod arbiter;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod ruby;
pub mod segmenter;

#[cfg(test)]
pub(crate) mod testutil;

pub use arbiter::{ArbiterReport, SegmentArbiter};
pub use config::ResolveSettings;
pub use errors::RuntimeError;
pub use orchestrator::{ResolveOrchestrator, RunLog, RunOutcome, RunRequest, SegmentRecord};
pub use ruby::{AuditReport, RubyAuditor};
pub use segmenter::segment;
