//! Token-level ruby audit.
//!
//! Re-checks risky segments one morphological token at a time: the
//! engine's mora stream is aligned against the analyzer's token readings,
//! and tokens that carry a hazard signal or a non-trivial divergence are
//! escalated to the judge, deduplicated by surface, in fixed-size batches
//! under per-run ceilings. Accepted corrections come back as [`KanaPatch`]es
//! over the mora stream; the audit never mutates segments.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use yomi_clients::analyzer::MorphologicalAnalyzer;
use yomi_clients::engine::SpeechEngine;
use yomi_clients::judge::{JudgeBatch, JudgeItem, JudgementClient};
use yomi_core::hazard::{HazardTag, RiskLevel, hazard_tags, text_risk};
use yomi_core::kana::{is_trivial, mora_len};
use yomi_core::types::{BudgetReason, KanaPatch, RiskReason, RiskySpan, RubyToken, Segment};

use crate::config::ResolveSettings;
use crate::errors::RuntimeError;

/// What one audit pass found, for the run log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Ruby annotations: every aligned token of every audited segment.
    pub tokens: Vec<RubyToken>,
    /// Tokens flagged risky, in discovery order.
    pub risky_spans: Vec<RiskySpan>,
    /// Accepted corrections over the mora stream.
    pub patches: Vec<KanaPatch>,
    /// Distinct surfaces actually sent to the judge.
    pub terms_escalated: usize,
    /// Judge batches sent.
    pub judge_calls: usize,
    /// Surfaces flagged but never judged (budget or transport).
    pub unresolved: Vec<String>,
    /// First ceiling that cut escalation short, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_reason: Option<BudgetReason>,
}

/// One place a flagged surface occurred.
struct Occurrence {
    segment_index: usize,
    token_position: usize,
    mora_range: (usize, usize),
    engine_kana: String,
    align_fallback: bool,
}

/// A flagged surface, deduplicated across segments.
struct Candidate {
    baseline_kana: String,
    engine_kana: String,
    tags: Vec<HazardTag>,
    contexts: Vec<String>,
    occurrences: Vec<Occurrence>,
}

/// Token-level auditor over already-arbitrated segments.
pub struct RubyAuditor<'a> {
    analyzer: &'a dyn MorphologicalAnalyzer,
    engine: &'a dyn SpeechEngine,
    judge: &'a dyn JudgementClient,
    settings: &'a ResolveSettings,
}

impl<'a> RubyAuditor<'a> {
    /// Create an auditor over the given collaborators.
    pub fn new(
        analyzer: &'a dyn MorphologicalAnalyzer,
        engine: &'a dyn SpeechEngine,
        judge: &'a dyn JudgementClient,
        settings: &'a ResolveSettings,
    ) -> Self {
        Self {
            analyzer,
            engine,
            judge,
            settings,
        }
    }

    /// Audit every risky segment and return the findings.
    ///
    /// Level-A segments are always audited; level-B only when enabled.
    /// Engine failure skips the affected segment; judge failure skips the
    /// affected batch. Neither aborts the audit.
    #[instrument(skip_all, fields(segments = segments.len()))]
    pub async fn audit(&self, segments: &[Segment]) -> Result<AuditReport, RuntimeError> {
        let mut report = AuditReport::default();
        let mut candidates: HashMap<String, Candidate> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for seg in segments {
            match text_risk(&seg.text) {
                Some(RiskLevel::A) => {}
                Some(RiskLevel::B) if self.settings.audit_level_b => {}
                _ => continue,
            }
            self.collect(seg, &mut report, &mut candidates, &mut order)
                .await?;
        }

        // Terms ceiling applies at selection, before any batch is cut.
        let mut selected: Vec<String> = Vec::new();
        for surface in order {
            if selected.len() >= self.settings.max_terms {
                if report.budget_reason.is_none() {
                    report.budget_reason = Some(BudgetReason::Terms);
                }
                report.unresolved.push(surface);
            } else {
                selected.push(surface);
            }
        }

        for chunk in selected.chunks(self.settings.audit_batch_size) {
            if report.judge_calls >= self.settings.max_judge_calls {
                if report.budget_reason.is_none() {
                    report.budget_reason = Some(BudgetReason::Calls);
                }
                report.unresolved.extend(chunk.iter().cloned());
                continue;
            }
            report.judge_calls += 1;
            let batch = batch_for(chunk, &candidates);
            let verdicts = match self.judge.judge(&batch).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "audit batch failed, skipping");
                    report.unresolved.extend(chunk.iter().cloned());
                    continue;
                }
            };
            report.terms_escalated += chunk.len();

            for verdict in &verdicts {
                if verdict.replacements.is_empty() {
                    continue;
                }
                let Some(candidate) = candidates.get(&verdict.id) else {
                    warn!(id = %verdict.id, "verdict for unknown surface");
                    continue;
                };
                for occ in &candidate.occurrences {
                    let mut corrected = occ.engine_kana.clone();
                    for r in &verdict.replacements {
                        corrected = corrected.replace(&r.from, &r.to);
                    }
                    report.patches.push(KanaPatch {
                        segment_index: occ.segment_index,
                        token_position: occ.token_position,
                        mora_range: occ.mora_range,
                        corrected,
                        align_fallback: occ.align_fallback,
                    });
                }
            }
        }

        info!(
            flagged = report.risky_spans.len(),
            escalated = report.terms_escalated,
            judge_calls = report.judge_calls,
            patches = report.patches.len(),
            unresolved = report.unresolved.len(),
            "ruby audit complete"
        );
        Ok(report)
    }

    /// Tokenize one segment, align moras, and record flagged tokens.
    async fn collect(
        &self,
        seg: &Segment,
        report: &mut AuditReport,
        candidates: &mut HashMap<String, Candidate>,
        order: &mut Vec<String>,
    ) -> Result<(), RuntimeError> {
        let tokens = self.analyzer.tokenize(&seg.text).await?;
        let query = match self
            .engine
            .audio_query(&seg.text, self.settings.voice_id)
            .await
        {
            Ok(q) => q,
            Err(e) => {
                warn!(index = seg.index, error = %e, "engine unavailable, segment skipped");
                return Ok(());
            }
        };
        let moras = query.mora_texts();
        let text_chars: Vec<char> = seg.text.chars().collect();

        let mut cursor = 0usize;
        let mut span_from = 0usize;
        for (position, token) in tokens.iter().enumerate() {
            if token.reading.is_empty() {
                continue;
            }
            let span = char_span(&text_chars, &token.surface, span_from);
            if let Some((_, end)) = span {
                span_from = end;
            }
            report.tokens.push(RubyToken {
                segment_index: seg.index,
                position,
                surface: token.surface.clone(),
                baseline_reading: token.reading.clone(),
                span,
            });
            let need = mora_len(&token.reading);
            let (mora_range, engine_kana, align_fallback) = if cursor + need <= moras.len() {
                (
                    (cursor, cursor + need),
                    moras[cursor..cursor + need].concat(),
                    false,
                )
            } else {
                // Engine produced fewer moras than the baseline expects;
                // take what remains and mark the slice best-effort.
                let start = cursor.min(moras.len());
                warn!(
                    index = seg.index,
                    position,
                    surface = %token.surface,
                    "mora stream exhausted, length-based fallback"
                );
                ((start, moras.len()), moras[start..].concat(), true)
            };
            cursor = (cursor + need).min(moras.len());

            let tags = hazard_tags(&token.surface);
            if tags.is_empty() && is_trivial(&token.reading, &engine_kana) {
                continue;
            }

            let reason = tags
                .first()
                .copied()
                .map_or(RiskReason::Divergence, RiskReason::from);
            debug!(
                index = seg.index,
                position,
                surface = %token.surface,
                ?reason,
                "token flagged"
            );
            report.risky_spans.push(RiskySpan {
                segment_index: seg.index,
                token_position: position,
                reason,
                justification: format!(
                    "baseline {} vs engine {}",
                    token.reading, engine_kana
                ),
                mora_range,
            });

            let candidate = candidates
                .entry(token.surface.clone())
                .or_insert_with(|| {
                    order.push(token.surface.clone());
                    Candidate {
                        baseline_kana: token.reading.clone(),
                        engine_kana: engine_kana.clone(),
                        tags,
                        contexts: Vec::new(),
                        occurrences: Vec::new(),
                    }
                });
            if candidate.contexts.len() < self.settings.context_examples
                && !candidate.contexts.contains(&seg.text)
            {
                candidate.contexts.push(seg.text.clone());
            }
            candidate.occurrences.push(Occurrence {
                segment_index: seg.index,
                token_position: position,
                mora_range,
                engine_kana,
                align_fallback,
            });
        }
        Ok(())
    }
}

/// First occurrence of `needle` in `haystack` at or after char index `from`,
/// as a half-open char range.
fn char_span(haystack: &[char], needle: &str, from: usize) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .map(|offset| (from + offset, from + offset + needle.len()))
}

fn batch_for(chunk: &[String], candidates: &HashMap<String, Candidate>) -> JudgeBatch {
    JudgeBatch::new(
        chunk
            .iter()
            .filter_map(|surface| {
                candidates.get(surface).map(|c| JudgeItem {
                    id: surface.clone(),
                    surface: surface.clone(),
                    baseline_kana: c.baseline_kana.clone(),
                    engine_kana: c.engine_kana.clone(),
                    hazard_tags: c.tags.clone(),
                    contexts: c.contexts.clone(),
                })
            })
            .collect(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
