//! Hazard lookup — surface classes that must always escalate.
//!
//! Numerals, foreign-script runs, and a curated list of known-treacherous
//! surfaces are disproportionately likely to be mis-spoken, so they bypass
//! the trivial-diff shortcut entirely: a hazard surface escalates even when
//! its reading delta looks cosmetic.

use serde::{Deserialize, Serialize};

/// Curated surfaces whose readings the engine is known to get wrong.
///
/// Counters, date words, and heteronyms whose reading depends on context
/// the analyzer cannot see. Extended by field reports, never pruned.
pub const HAZARD_TERMS: &[&str] = &[
    "一日",
    "一人",
    "二人",
    "一行",
    "今日",
    "明日",
    "昨日",
    "今年",
    "上手",
    "下手",
    "大人",
    "仮名",
    "風邪",
    "行方",
    "方々",
    "何方",
    "最中",
    "紅葉",
    "辛い",
    "怒り",
];

/// Why a surface was classified hazardous.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardTag {
    /// Member of the curated [`HAZARD_TERMS`] list.
    Curated,
    /// Contains an ASCII digit.
    Numeric,
    /// Contains two or more consecutive ASCII Latin letters.
    LatinRun,
}

/// Audit priority of a segment.
///
/// Level A segments carry a hazard signal and are audited by default;
/// level B is the softer class (any kanji at all) and is opt-in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Hazard signal present — audited unconditionally.
    A,
    /// Kanji present — audited only on explicit request.
    B,
}

/// All hazard tags that apply to a surface.
#[must_use]
pub fn hazard_tags(surface: &str) -> Vec<HazardTag> {
    let mut tags = Vec::new();
    if HAZARD_TERMS.contains(&surface) {
        tags.push(HazardTag::Curated);
    }
    if surface.chars().any(|c| c.is_ascii_digit()) {
        tags.push(HazardTag::Numeric);
    }
    if has_latin_run(surface) {
        tags.push(HazardTag::LatinRun);
    }
    tags
}

/// Whether a surface must always escalate, regardless of diff triviality.
#[must_use]
pub fn is_hazard(surface: &str) -> bool {
    !hazard_tags(surface).is_empty()
}

/// Risk classification of a whole text span (segment granularity).
///
/// Curated terms are matched by containment here rather than equality —
/// the segment text embeds the surface.
#[must_use]
pub fn text_risk(text: &str) -> Option<RiskLevel> {
    let curated_hit = HAZARD_TERMS.iter().any(|t| text.contains(t));
    if curated_hit
        || text.chars().any(|c| c.is_ascii_digit())
        || has_latin_run(text)
    {
        return Some(RiskLevel::A);
    }
    if text.chars().any(is_kanji) {
        return Some(RiskLevel::B);
    }
    None
}

/// CJK unified ideograph check (base block plus extension A).
#[must_use]
pub fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

fn has_latin_run(s: &str) -> bool {
    let mut run = 0usize;
    for c in s.chars() {
        if c.is_ascii_alphabetic() {
            run += 1;
            if run >= 2 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
