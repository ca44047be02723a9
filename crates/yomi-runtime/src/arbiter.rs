//! Segment-level arbiter.
//!
//! For every pending segment: apply the dictionary longest-surface-first,
//! compare the expected reading against the engine's live prediction, and
//! either accept, let the dictionary override, or escalate to the judge in
//! fixed-size batches. A registered correction always outranks a live
//! engine prediction; a missing judge verdict fails open, never blocks.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};
use yomi_clients::analyzer::{MorphologicalAnalyzer, baseline_reading};
use yomi_clients::engine::SpeechEngine;
use yomi_clients::judge::{ItemVerdict, JudgeBatch, JudgeItem, JudgementClient};
use yomi_core::hazard::hazard_tags;
use yomi_core::kana::normalize;
use yomi_core::types::{ExpectedSource, ReadingConflict, Segment, Verdict};
use yomi_dict::{DictEntry, DictScope, Provenance, ReadingDictionary};

use crate::config::ResolveSettings;
use crate::errors::RuntimeError;

/// What one arbiter pass did, for the run log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArbiterReport {
    /// Segments resolved in this pass (pending at entry).
    pub resolved: usize,
    /// Conflicts escalated to the judge.
    pub conflicts_escalated: usize,
    /// Judge batches sent.
    pub judge_calls: usize,
    /// Corrections persisted into the dictionary.
    pub corrections_persisted: usize,
}

/// Per-segment reading arbiter.
pub struct SegmentArbiter<'a> {
    analyzer: &'a dyn MorphologicalAnalyzer,
    engine: &'a dyn SpeechEngine,
    judge: &'a dyn JudgementClient,
    dict: &'a ReadingDictionary,
    scope: DictScope,
    settings: &'a ResolveSettings,
}

impl<'a> SegmentArbiter<'a> {
    /// Create an arbiter over the given collaborators.
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

    /// Resolve every pending segment in place.
    ///
    /// Engine failure is a run-level error: arbitration cannot proceed
    /// without a live reading per segment. Judge failure is not — affected
    /// conflicts fall back to the original text.
    #[instrument(skip_all, fields(segments = segments.len()))]
    pub async fn resolve(&self, segments: &mut [Segment]) -> Result<ArbiterReport, RuntimeError> {
        let effective = self.dict.load_effective(&self.scope)?;
        let ordered = ordered_entries(ReadingDictionary::export_flat(&effective));

        let mut report = ArbiterReport::default();
        let mut conflicts: Vec<ReadingConflict> = Vec::new();

        for seg in segments.iter_mut().filter(|s| s.verdict == Verdict::Pending) {
            report.resolved += 1;
            let (substituted, replaced) = apply_dictionary(&seg.text, &ordered);
            let source = if replaced {
                ExpectedSource::Dictionary
            } else {
                ExpectedSource::Baseline
            };
            let expected_text = if replaced { substituted.as_str() } else { seg.text.as_str() };
            let tokens = self.analyzer.tokenize(expected_text).await?;
            let expected_reading = baseline_reading(&tokens);

            // The engine sees the original text: its prediction is what
            // will actually be spoken if we accept it.
            let query = self
                .engine
                .audio_query(&seg.text, self.settings.voice_id)
                .await?;
            let engine_reading = query.predicted_reading();
            seg.engine_reading = Some(engine_reading.clone());

            if normalize(&expected_reading) == normalize(&engine_reading) {
                // Keep the written form so the engine keeps inferring
                // pronunciation and emphasis from it.
                seg.reading = Some(seg.text.clone());
                seg.verdict = source.matched_verdict();
            } else if source == ExpectedSource::Dictionary {
                debug!(
                    index = seg.index,
                    expected = %expected_reading,
                    engine = %engine_reading,
                    "dictionary outranks engine prediction"
                );
                seg.reading = Some(substituted.clone());
                seg.verdict = Verdict::DictionaryPriorityOverride;
            } else {
                conflicts.push(ReadingConflict {
                    segment_index: seg.index,
                    text: seg.text.clone(),
                    expected_reading,
                    engine_reading,
                    source,
                });
            }
        }

        report.conflicts_escalated = conflicts.len();
        let mut corrections: Vec<(String, DictEntry)> = Vec::new();

        for chunk in conflicts.chunks(self.settings.arbiter_batch_size) {
            report.judge_calls += 1;
            let verdicts = match self.judge.judge(&batch_for(chunk)).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "judge batch failed, falling back open");
                    Vec::new()
                }
            };
            let by_id: HashMap<&str, &ItemVerdict> =
                verdicts.iter().map(|v| (v.id.as_str(), v)).collect();

            for conflict in chunk {
                let Some(seg) = segments.iter_mut().find(|s| s.index == conflict.segment_index)
                else {
                    warn!(index = conflict.segment_index, "conflict for unknown segment");
                    continue;
                };
                apply_verdict(
                    seg,
                    by_id.get(conflict_id(conflict).as_str()).copied(),
                    &mut corrections,
                );
            }
        }

        if !corrections.is_empty() {
            report.corrections_persisted = corrections.len();
            let _ = self.dict.merge(&self.scope, corrections)?;
        }

        info!(
            resolved = report.resolved,
            escalated = report.conflicts_escalated,
            judge_calls = report.judge_calls,
            persisted = report.corrections_persisted,
            "arbiter pass complete"
        );
        Ok(report)
    }
}

fn conflict_id(conflict: &ReadingConflict) -> String {
    format!("s{}", conflict.segment_index)
}

fn batch_for(chunk: &[ReadingConflict]) -> JudgeBatch {
    JudgeBatch::new(
        chunk
            .iter()
            .map(|c| JudgeItem {
                id: conflict_id(c),
                surface: c.text.clone(),
                baseline_kana: c.expected_reading.clone(),
                engine_kana: c.engine_reading.clone(),
                hazard_tags: hazard_tags(&c.text),
                contexts: Vec::new(),
            })
            .collect(),
    )
}

/// Apply one judge verdict (or its absence) to a conflicted segment.
fn apply_verdict(
    seg: &mut Segment,
    verdict: Option<&ItemVerdict>,
    corrections: &mut Vec<(String, DictEntry)>,
) {
    match verdict {
        Some(v) if v.replacements.is_empty() => {
            seg.reading = Some(seg.text.clone());
            seg.verdict = Verdict::LlmApproved;
        }
        Some(v) => {
            let mut fixed = seg.text.clone();
            for r in &v.replacements {
                if r.from.is_empty() || r.from == r.to {
                    warn!(index = seg.index, "skipping degenerate replacement");
                    continue;
                }
                fixed = fixed.replace(&r.from, &r.to);
                corrections.push((r.from.clone(), DictEntry::new(r.to.clone(), Provenance::Judge)));
            }
            seg.reading = Some(fixed);
            seg.verdict = Verdict::LlmFixed;
        }
        None => {
            // No verdict arrived for this id: fail open.
            seg.reading = Some(seg.text.clone());
            seg.verdict = Verdict::Fallback;
        }
    }
}

/// Flat dictionary entries sorted longest-surface-first, so
/// multi-character entries take precedence over their substrings.
fn ordered_entries(flat: std::collections::BTreeMap<String, String>) -> Vec<(String, String)> {
    let mut ordered: Vec<(String, String)> = flat.into_iter().collect();
    ordered.sort_by(|a, b| {
        b.0.chars()
            .count()
            .cmp(&a.0.chars().count())
            .then_with(|| a.0.cmp(&b.0))
    });
    ordered
}

/// Replace every dictionary surface occurring in `text` with its reading.
/// Returns the substituted text and whether any substitution occurred.
fn apply_dictionary(text: &str, ordered: &[(String, String)]) -> (String, bool) {
    let mut out = text.to_owned();
    let mut replaced = false;
    for (surface, reading) in ordered {
        if out.contains(surface.as_str()) {
            out = out.replace(surface.as_str(), reading);
            replaced = true;
        }
    }
    (out, replaced)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
