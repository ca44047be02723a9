//! Runtime error hierarchy.
//!
//! Judge failures never appear here: every judge-call site fails open
//! (no verdict) by design. Engine failure is a run-level error for
//! arbitration — every segment needs an engine reading — but only a local
//! skip inside the optional ruby audit.

use yomi_clients::analyzer::AnalyzerError;
use yomi_clients::engine::EngineError;
use yomi_dict::DictError;

/// Errors that abort a resolution run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The morphological analyzer failed; no baseline readings available.
    #[error("analyzer failure: {0}")]
    Analyzer(#[from] AnalyzerError),

    /// The speech engine failed during arbitration.
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),

    /// The dictionary store failed to load or persist.
    #[error("dictionary failure: {0}")]
    Dict(#[from] DictError),
}
