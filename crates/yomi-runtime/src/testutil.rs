//! Scripted collaborator doubles for runtime tests.
//!
//! Each double answers from a fixture table and falls back to a kana
//! identity (the normalized text) for unscripted inputs, so happy-path
//! tests need no scripting at all. Call counts are recorded for the
//! zero-calls assertions in the resume tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use yomi_clients::analyzer::{AnalyzerError, MorphToken, MorphologicalAnalyzer};
use yomi_clients::engine::{AccentPhrase, AudioQuery, EngineError, Mora, SpeechEngine};
use yomi_clients::judge::{ItemVerdict, JudgeBatch, JudgeError, JudgementClient, Replacement};
use yomi_core::kana::{mora_split, normalize};

// ─────────────────────────────────────────────────────────────────────────────
// Analyzer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedAnalyzer {
    tokens: HashMap<String, Vec<MorphToken>>,
    pub calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the token sequence for one text as (surface, reading) pairs.
    pub fn with_tokens(mut self, text: &str, pairs: &[(&str, &str)]) -> Self {
        let tokens = pairs
            .iter()
            .map(|(surface, reading)| MorphToken {
                surface: (*surface).into(),
                reading: (*reading).into(),
                part_of_speech: "名詞".into(),
            })
            .collect();
        let _ = self.tokens.insert(text.into(), tokens);
        self
    }
}

#[async_trait]
impl MorphologicalAnalyzer for ScriptedAnalyzer {
    async fn tokenize(&self, text: &str) -> Result<Vec<MorphToken>, AnalyzerError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(tokens) = self.tokens.get(text) {
            return Ok(tokens.clone());
        }
        Ok(vec![MorphToken {
            surface: text.into(),
            reading: normalize(text),
            part_of_speech: "名詞".into(),
        }])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedEngine {
    readings: HashMap<String, String>,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the predicted reading for one text.
    pub fn with_reading(mut self, text: &str, reading: &str) -> Self {
        let _ = self.readings.insert(text.into(), reading.into());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechEngine for ScriptedEngine {
    async fn audio_query(&self, text: &str, _voice_id: u32) -> Result<AudioQuery, EngineError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngineError::Timeout { timeout_ms: 1 });
        }
        let reading = self
            .readings
            .get(text)
            .cloned()
            .unwrap_or_else(|| normalize(text));
        Ok(AudioQuery {
            kana: reading.clone(),
            accent_phrases: vec![AccentPhrase {
                moras: mora_split(&reading)
                    .into_iter()
                    .map(|text| Mora { text })
                    .collect(),
            }],
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Judge
// ─────────────────────────────────────────────────────────────────────────────

enum JudgeMode {
    /// Echo every item id with zero replacements.
    Approve,
    /// Return no verdicts at all.
    Silent,
    /// Transport failure on every call.
    Fail,
    /// Fixes for the listed ids; everything else gets an approval.
    Fixes(HashMap<String, Vec<Replacement>>),
}

pub struct ScriptedJudge {
    mode: JudgeMode,
    pub batches: Mutex<Vec<JudgeBatch>>,
    pub calls: AtomicUsize,
}

impl ScriptedJudge {
    fn with_mode(mode: JudgeMode) -> Self {
        Self {
            mode,
            batches: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn approving() -> Self {
        Self::with_mode(JudgeMode::Approve)
    }

    pub fn silent() -> Self {
        Self::with_mode(JudgeMode::Silent)
    }

    pub fn failing() -> Self {
        Self::with_mode(JudgeMode::Fail)
    }

    /// Fix the listed ids as (id, from, to); approve everything else.
    pub fn fixing(fixes: &[(&str, &str, &str)]) -> Self {
        let mut map: HashMap<String, Vec<Replacement>> = HashMap::new();
        for (id, from, to) in fixes {
            map.entry((*id).into()).or_default().push(Replacement {
                from: (*from).into(),
                to: (*to).into(),
            });
        }
        Self::with_mode(JudgeMode::Fixes(map))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent_batches(&self) -> Vec<JudgeBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl JudgementClient for ScriptedJudge {
    async fn judge(&self, batch: &JudgeBatch) -> Result<Vec<ItemVerdict>, JudgeError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(batch.clone());
        match &self.mode {
            JudgeMode::Fail => Err(JudgeError::Timeout { timeout_ms: 1 }),
            JudgeMode::Silent => Ok(Vec::new()),
            JudgeMode::Approve => Ok(batch
                .items
                .iter()
                .map(|item| ItemVerdict {
                    id: item.id.clone(),
                    replacements: Vec::new(),
                })
                .collect()),
            JudgeMode::Fixes(map) => Ok(batch
                .items
                .iter()
                .map(|item| ItemVerdict {
                    id: item.id.clone(),
                    replacements: map.get(&item.id).cloned().unwrap_or_default(),
                })
                .collect()),
        }
    }
}
