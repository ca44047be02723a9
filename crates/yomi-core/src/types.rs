//! Data model for the reading-resolution pipeline.
//!
//! - [`Segment`]: ordered spoken-text unit, owned by the orchestrator
//! - [`Verdict`]: the seven-way classification every segment ends a run with
//! - [`ReadingConflict`]: transient non-trivial mismatch, consumed within
//!   one escalation round
//! - [`RubyToken`] / [`KanaPatch`] / [`RiskySpan`]: token-level audit model
//! - [`BudgetReason`]: which ceiling ended an audit early

use serde::{Deserialize, Serialize};

use crate::hazard::HazardTag;

// ─────────────────────────────────────────────────────────────────────────────
// Segments and verdicts
// ─────────────────────────────────────────────────────────────────────────────

/// Final classification of a segment's reading after arbitration.
///
/// Exactly one applies per segment; `Pending` survives only until a
/// successful arbiter pass. Every transition is recorded in the run log —
/// auditability is a hard contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Not yet arbitrated.
    #[default]
    Pending,
    /// Dictionary substitution applied and the engine agreed.
    MatchedDictionary,
    /// No substitution; baseline and engine readings agree.
    MatchedBaseline,
    /// Engine disagreed with a registered correction — the dictionary wins.
    DictionaryPriorityOverride,
    /// Escalated; the judge accepted the engine's prediction.
    LlmApproved,
    /// Escalated; the judge emitted one or more corrections.
    LlmFixed,
    /// Escalated but no verdict arrived — fail open, keep the original text.
    Fallback,
}

/// One ordered spoken-text unit.
///
/// Created by the segmenter. `reading`/`verdict` are mutated only by the
/// arbiter (or copied forward by the orchestrator on resume);
/// `duration_seconds` is set later by the external synthesizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Position in the run's segment sequence. Unique, non-negative.
    pub index: usize,
    /// Raw text as segmented from the source.
    pub text: String,
    /// Resolved reading; unset until arbitration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
    /// The engine's predicted reading for `text`, recorded for the run log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_reading: Option<String>,
    /// Pause before speaking, milliseconds.
    pub pause_before_ms: u32,
    /// Pause after speaking, milliseconds.
    pub pause_after_ms: u32,
    /// Heading nesting level when the segment is a heading line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
    /// Measured audio duration, set externally after synthesis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Arbitration outcome.
    #[serde(default)]
    pub verdict: Verdict,
}

impl Segment {
    /// Create a pending segment at `index` with the given text.
    #[must_use]
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            reading: None,
            engine_reading: None,
            pause_before_ms: 0,
            pause_after_ms: 0,
            heading_level: None,
            duration_seconds: None,
            verdict: Verdict::Pending,
        }
    }

    /// Whether the segment is a heading line.
    #[must_use]
    pub fn is_heading(&self) -> bool {
        self.heading_level.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conflicts
// ─────────────────────────────────────────────────────────────────────────────

/// Where the expected reading of a conflict came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedSource {
    /// A dictionary substitution produced the expected reading.
    Dictionary,
    /// The morphological baseline produced the expected reading.
    Baseline,
}

impl ExpectedSource {
    /// The verdict recorded when the engine agrees with this source.
    #[must_use]
    pub fn matched_verdict(self) -> Verdict {
        match self {
            Self::Dictionary => Verdict::MatchedDictionary,
            Self::Baseline => Verdict::MatchedBaseline,
        }
    }
}

/// A non-trivial baseline/engine mismatch awaiting judgement.
///
/// Transient: created on mismatch, consumed within one escalation round,
/// never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadingConflict {
    /// Index of the conflicted segment.
    pub segment_index: usize,
    /// Original segment text.
    pub text: String,
    /// Reading the resolver expected.
    pub expected_reading: String,
    /// Reading the engine predicted.
    pub engine_reading: String,
    /// Provenance of the expected reading.
    pub source: ExpectedSource,
}

// ─────────────────────────────────────────────────────────────────────────────
// Token-level audit model
// ─────────────────────────────────────────────────────────────────────────────

/// One morphological token of a segment, with its baseline reading.
///
/// Immutable once created: corrections are recorded as separate
/// [`KanaPatch`]es, never in place, so alignment stays reproducible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubyToken {
    /// Owning segment index.
    pub segment_index: usize,
    /// Position within the segment's token sequence.
    pub position: usize,
    /// Surface form.
    pub surface: String,
    /// Baseline (analyzer) reading of the surface.
    pub baseline_reading: String,
    /// Char span of the surface within the segment text, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(usize, usize)>,
}

/// An accepted correction over a range of the segment's mora stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanaPatch {
    /// Owning segment index.
    pub segment_index: usize,
    /// Token the correction targets.
    pub token_position: usize,
    /// Half-open mora range `[start, end)` in the segment's mora stream.
    pub mora_range: (usize, usize),
    /// Corrected phonetic text.
    pub corrected: String,
    /// True when the mora stream was structurally shorter than expected and
    /// the range is a best-effort length-based slice.
    #[serde(default)]
    pub align_fallback: bool,
}

/// Why a token was flagged risky.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskReason {
    /// Curated hazard term.
    Curated,
    /// ASCII digit in the surface.
    Numeric,
    /// Consecutive-Latin-letter run in the surface.
    LatinRun,
    /// Non-trivial baseline/engine reading divergence.
    Divergence,
}

impl From<HazardTag> for RiskReason {
    fn from(tag: HazardTag) -> Self {
        match tag {
            HazardTag::Curated => Self::Curated,
            HazardTag::Numeric => Self::Numeric,
            HazardTag::LatinRun => Self::LatinRun,
        }
    }
}

/// A token flagged risky during the audit; run-log only, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskySpan {
    /// Owning segment index.
    pub segment_index: usize,
    /// Token the flag targets.
    pub token_position: usize,
    /// Machine-readable reason.
    pub reason: RiskReason,
    /// Human-readable justification for the run log.
    pub justification: String,
    /// Half-open mora range `[start, end)` in the segment's mora stream.
    pub mora_range: (usize, usize),
}

/// Which per-run ceiling terminated escalation early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetReason {
    /// The distinct-terms ceiling fired.
    Terms,
    /// The batch-calls ceiling fired.
    Calls,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Segment ──────────────────────────────────────────────────────────

    #[test]
    fn new_segment_is_pending() {
        let seg = Segment::new(0, "こんにちは。");
        assert_eq!(seg.index, 0);
        assert_eq!(seg.verdict, Verdict::Pending);
        assert!(seg.reading.is_none());
        assert!(!seg.is_heading());
    }

    #[test]
    fn segment_serde_roundtrip() {
        let mut seg = Segment::new(3, "第一章");
        seg.heading_level = Some(1);
        seg.pause_after_ms = 1200;
        seg.reading = Some("ダイイッショウ".into());
        seg.verdict = Verdict::MatchedBaseline;
        let json = serde_json::to_string(&seg).unwrap();
        let back: Segment = serde_json::from_str(&json).unwrap();
        assert_eq!(seg, back);
    }

    #[test]
    fn segment_optional_fields_omitted() {
        let seg = Segment::new(0, "text");
        let v = serde_json::to_value(&seg).unwrap();
        assert!(v.get("reading").is_none());
        assert!(v.get("headingLevel").is_none());
        assert!(v.get("durationSeconds").is_none());
    }

    // ── Verdict ──────────────────────────────────────────────────────────

    #[test]
    fn verdict_snake_case_wire_form() {
        assert_eq!(
            serde_json::to_value(Verdict::DictionaryPriorityOverride).unwrap(),
            json!("dictionary_priority_override")
        );
        assert_eq!(serde_json::to_value(Verdict::LlmFixed).unwrap(), json!("llm_fixed"));
    }

    #[test]
    fn verdict_default_is_pending() {
        assert_eq!(Verdict::default(), Verdict::Pending);
    }

    #[test]
    fn missing_verdict_deserializes_pending() {
        let v = json!({
            "index": 0,
            "text": "t",
            "pauseBeforeMs": 0,
            "pauseAfterMs": 0
        });
        let seg: Segment = serde_json::from_value(v).unwrap();
        assert_eq!(seg.verdict, Verdict::Pending);
    }

    // ── BudgetReason ─────────────────────────────────────────────────────

    #[test]
    fn budget_reason_wire_form() {
        assert_eq!(serde_json::to_value(BudgetReason::Terms).unwrap(), json!("terms"));
        assert_eq!(serde_json::to_value(BudgetReason::Calls).unwrap(), json!("calls"));
    }

    #[test]
    fn risk_reason_from_hazard_tag() {
        assert_eq!(RiskReason::from(HazardTag::Numeric), RiskReason::Numeric);
        assert_eq!(
            serde_json::to_value(RiskReason::Divergence).unwrap(),
            json!("divergence")
        );
    }

    #[test]
    fn matched_verdict_by_source() {
        assert_eq!(
            ExpectedSource::Dictionary.matched_verdict(),
            Verdict::MatchedDictionary
        );
        assert_eq!(
            ExpectedSource::Baseline.matched_verdict(),
            Verdict::MatchedBaseline
        );
    }

    // ── Patches ──────────────────────────────────────────────────────────

    #[test]
    fn kana_patch_fallback_defaults_false() {
        let v = json!({
            "segmentIndex": 1,
            "tokenPosition": 0,
            "moraRange": [2, 4],
            "corrected": "イカ"
        });
        let patch: KanaPatch = serde_json::from_value(v).unwrap();
        assert!(!patch.align_fallback);
        assert_eq!(patch.mora_range, (2, 4));
    }
}
