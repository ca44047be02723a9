//! Deterministic text segmentation.
//!
//! Splits raw text into ordered speech segments on blank lines and
//! sentence-final punctuation, preserving line order. Heading lines become
//! their own segments with a per-level pause; blank lines lengthen the
//! pause after the preceding segment. Segmenting identical text twice
//! yields structurally identical output — the partial-resume guard
//! depends on it.

use yomi_core::types::Segment;

/// Pause after a heading, by nesting level (1-based; deepest shortest).
const HEADING_PAUSE_MS: [u32; 6] = [1400, 1200, 1000, 900, 800, 700];

/// Pause inserted by a blank line between paragraphs.
const PARAGRAPH_PAUSE_MS: u32 = 800;

/// Pause after an ordinary terminated sentence.
const SENTENCE_PAUSE_MS: u32 = 200;

/// Sentence-final punctuation that ends a segment within a line.
const SENTENCE_TERMINATORS: [char; 3] = ['。', '！', '？'];

/// Split `text` into ordered segments.
///
/// Pure and deterministic. Concatenating the returned segment texts in
/// order reproduces the input's non-blank, non-marker content.
#[must_use]
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            // Paragraph break: widen the pause after whatever came before.
            if let Some(last) = segments.last_mut() {
                last.pause_after_ms = last.pause_after_ms.max(PARAGRAPH_PAUSE_MS);
            }
            continue;
        }

        if let Some((level, title)) = parse_heading(line) {
            let mut seg = Segment::new(segments.len(), title);
            seg.heading_level = Some(level);
            seg.pause_after_ms = heading_pause(level);
            segments.push(seg);
            continue;
        }
        if line.chars().all(|c| c == '#') {
            // Marker with no title: nothing to speak.
            continue;
        }

        for (sentence, terminated) in split_sentences(line) {
            let mut seg = Segment::new(segments.len(), sentence);
            if terminated {
                seg.pause_after_ms = SENTENCE_PAUSE_MS;
            }
            segments.push(seg);
        }
    }

    segments
}

/// Parse a heading marker line: one or more `#` then the title.
fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let stripped = line.trim_start_matches('#');
    let level = line.len() - stripped.len();
    if level == 0 {
        return None;
    }
    let title = stripped.trim_start();
    if title.is_empty() {
        return None;
    }
    Some((level.min(HEADING_PAUSE_MS.len()) as u8, title))
}

fn heading_pause(level: u8) -> u32 {
    HEADING_PAUSE_MS[(level as usize - 1).min(HEADING_PAUSE_MS.len() - 1)]
}

/// Split a line into sentences, keeping terminal punctuation attached.
///
/// The trailing remainder of a line lacking terminal punctuation is
/// emitted unchanged.
fn split_sentences(line: &str) -> Vec<(String, bool)> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in line.chars() {
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c) {
            out.push((std::mem::take(&mut current), true));
        }
    }
    if !current.is_empty() {
        out.push((current, false));
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
