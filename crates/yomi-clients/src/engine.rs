//! Speech-synthesis engine client.
//!
//! The engine's `/audio_query` endpoint returns its grapheme-to-phoneme
//! prediction as accent phrases of moras — the live reading the arbiter
//! compares against the baseline. Synthesis itself is downstream and not
//! part of this crate.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One mora as reported by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mora {
    /// Katakana text of the mora.
    pub text: String,
}

/// A run of moras sharing one pitch-accent contour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccentPhrase {
    /// Moras in order.
    pub moras: Vec<Mora>,
}

/// The engine's prediction for one text.
///
/// Wire field names are the engine's own (snake_case).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioQuery {
    /// Engine-native kana notation, when reported.
    #[serde(default)]
    pub kana: String,
    /// Accent phrases in order.
    pub accent_phrases: Vec<AccentPhrase>,
}

impl AudioQuery {
    /// Flatten the accent phrases into one ordered mora-text stream.
    #[must_use]
    pub fn mora_texts(&self) -> Vec<String> {
        self.accent_phrases
            .iter()
            .flat_map(|p| p.moras.iter().map(|m| m.text.clone()))
            .collect()
    }

    /// The engine's predicted reading: the mora stream, concatenated.
    #[must_use]
    pub fn predicted_reading(&self) -> String {
        self.accent_phrases
            .iter()
            .flat_map(|p| p.moras.iter().map(|m| m.text.as_str()))
            .collect()
    }
}

/// Errors from the speech engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transport failure.
    #[error("engine transport error: {0}")]
    Http(reqwest::Error),

    /// Non-2xx response.
    #[error("engine api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// The request exceeded its deadline.
    #[error("engine timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured deadline.
        timeout_ms: u64,
    },
}

/// Engine seam consumed by the arbiter and the ruby auditor.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Ask the engine how it would pronounce `text` with the given voice.
    async fn audio_query(&self, text: &str, voice_id: u32) -> Result<AudioQuery, EngineError>;
}

/// HTTP engine client (VOICEVOX-shaped wire format).
pub struct HttpSpeechEngine {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSpeechEngine {
    /// Create a client against `base_url` with a per-request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn classify(&self, e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            EngineError::Http(e)
        }
    }
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    async fn audio_query(&self, text: &str, voice_id: u32) -> Result<AudioQuery, EngineError> {
        let url = format!("{}/audio_query", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .query(&[("text", text), ("speaker", &voice_id.to_string())])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let query: AudioQuery = response.json().await.map_err(|e| self.classify(e))?;
        debug!(
            voice_id,
            phrases = query.accent_phrases.len(),
            moras = query.mora_texts().len(),
            "audio query returned"
        );
        Ok(query)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
