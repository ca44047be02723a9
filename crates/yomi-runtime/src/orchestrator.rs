//! Run orchestration.
//!
//! Drives one resolution run end to end: segment the text, carry forward
//! prior results on a partial resume, arbitrate what remains, optionally
//! run the ruby audit, and emit a run log. A resumed segment is only
//! carried when its text is byte-identical to the prior run's — changed
//! text always re-arbitrates, whatever the reprocess set says.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;
use yomi_clients::analyzer::MorphologicalAnalyzer;
use yomi_clients::engine::SpeechEngine;
use yomi_clients::judge::JudgementClient;
use yomi_core::types::{BudgetReason, Segment, Verdict};
use yomi_dict::{DictScope, ReadingDictionary};

use crate::arbiter::{ArbiterReport, SegmentArbiter};
use crate::config::ResolveSettings;
use crate::errors::RuntimeError;
use crate::ruby::{AuditReport, RubyAuditor};
use crate::segmenter::segment;

// ─────────────────────────────────────────────────────────────────────────────
// Run log
// ─────────────────────────────────────────────────────────────────────────────

/// One segment's outcome, as persisted in the run log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRecord {
    /// Position in the run's segment sequence.
    pub index: usize,
    /// Raw segment text, the resume guard's comparison key.
    pub text: String,
    /// Resolved reading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
    /// Engine prediction recorded during arbitration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_reading: Option<String>,
    /// Arbitration outcome.
    pub verdict: Verdict,
}

/// Persistent record of one resolution run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLog {
    /// Time-ordered run identifier.
    pub run_id: String,
    /// When the run completed.
    pub created_at: DateTime<Utc>,
    /// Per-segment outcomes, in segment order.
    pub segments: Vec<SegmentRecord>,
}

impl RunLog {
    /// Build a log from resolved segments, stamped now.
    #[must_use]
    pub fn from_segments(segments: &[Segment]) -> Self {
        Self {
            run_id: Uuid::now_v7().to_string(),
            created_at: Utc::now(),
            segments: segments
                .iter()
                .map(|s| SegmentRecord {
                    index: s.index,
                    text: s.text.clone(),
                    reading: s.reading.clone(),
                    engine_reading: s.engine_reading.clone(),
                    verdict: s.verdict,
                })
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests and outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// One resolution request.
#[derive(Clone, Debug, Default)]
pub struct RunRequest {
    /// Source text to resolve.
    pub text: String,
    /// Segment indices to re-arbitrate; everything else is carried from
    /// `prior` when possible. `None` means a full run.
    pub reprocess: Option<BTreeSet<usize>>,
    /// The previous run's log, required for carrying results forward.
    pub prior: Option<RunLog>,
}

impl RunRequest {
    /// A full run over `text`.
    #[must_use]
    pub fn full(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reprocess: None,
            prior: None,
        }
    }
}

/// Everything one run produced.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Resolved segments, in order.
    pub segments: Vec<Segment>,
    /// The persisted run log.
    pub log: RunLog,
    /// What arbitration did.
    pub arbiter: ArbiterReport,
    /// Audit findings, when the audit ran.
    pub audit: Option<AuditReport>,
}

impl RunOutcome {
    /// Which ceiling cut the audit's escalation short, if any.
    #[must_use]
    pub fn budget_reason(&self) -> Option<BudgetReason> {
        self.audit.as_ref().and_then(|a| a.budget_reason)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// End-to-end resolution driver.
pub struct ResolveOrchestrator<'a> {
    analyzer: &'a dyn MorphologicalAnalyzer,
    engine: &'a dyn SpeechEngine,
    judge: &'a dyn JudgementClient,
    dict: &'a ReadingDictionary,
    scope: DictScope,
    settings: &'a ResolveSettings,
}

impl<'a> ResolveOrchestrator<'a> {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        analyzer: &'a dyn MorphologicalAnalyzer,
        engine: &'a dyn SpeechEngine,
        judge: &'a dyn JudgementClient,
        dict: &'a ReadingDictionary,
        scope: DictScope,
        settings: &'a ResolveSettings,
    ) -> Self {
        Self {
            analyzer,
            engine,
            judge,
            dict,
            scope,
            settings,
        }
    }

    /// Run one resolution pass and return its outcome.
    #[instrument(skip_all, fields(reprocess = ?request.reprocess))]
    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome, RuntimeError> {
        let mut segments = segment(&request.text);

        let carried = match (&request.reprocess, &request.prior) {
            (Some(subset), Some(prior)) => carry_forward(&mut segments, subset, prior),
            _ => 0,
        };

        let arbiter = SegmentArbiter::new(
            self.analyzer,
            self.engine,
            self.judge,
            self.dict,
            self.scope.clone(),
            self.settings,
        );
        let report = arbiter.resolve(&mut segments).await?;

        let audit = if self.settings.audit {
            let auditor = RubyAuditor::new(self.analyzer, self.engine, self.judge, self.settings);
            Some(auditor.audit(&segments).await?)
        } else {
            None
        };

        let log = RunLog::from_segments(&segments);
        info!(
            run_id = %log.run_id,
            segments = segments.len(),
            carried,
            resolved = report.resolved,
            "run complete"
        );
        Ok(RunOutcome {
            segments,
            log,
            arbiter: report,
            audit,
        })
    }
}

/// Copy prior results onto segments outside the reprocess set.
///
/// Carries only when the prior record exists at the same index with
/// byte-identical text and a settled verdict. Everything else stays
/// pending and re-arbitrates.
fn carry_forward(segments: &mut [Segment], subset: &BTreeSet<usize>, prior: &RunLog) -> usize {
    let mut carried = 0usize;
    for seg in segments.iter_mut() {
        if subset.contains(&seg.index) {
            continue;
        }
        let Some(rec) = prior.segments.iter().find(|r| r.index == seg.index) else {
            continue;
        };
        if rec.text != seg.text {
            debug!(index = seg.index, "text changed, resume restriction overridden");
            continue;
        }
        if rec.verdict == Verdict::Pending {
            continue;
        }
        seg.reading = rec.reading.clone();
        seg.engine_reading = rec.engine_reading.clone();
        seg.verdict = rec.verdict;
        carried += 1;
    }
    carried
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
