//! Morphological analyzer interface.
//!
//! The analyzer is an external collaborator (a MeCab-style sidecar); this
//! module owns only its seam: the token shape, the trait, and an HTTP
//! implementation. One `tokenize` call per distinct text.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One morphological token with its deterministic baseline reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MorphToken {
    /// Surface form as written.
    pub surface: String,
    /// Baseline katakana reading.
    pub reading: String,
    /// Part-of-speech label, analyzer-native.
    pub part_of_speech: String,
}

/// Errors from the analyzer sidecar.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Transport failure.
    #[error("analyzer transport error: {0}")]
    Http(reqwest::Error),

    /// Non-2xx response.
    #[error("analyzer api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// The request exceeded its deadline.
    #[error("analyzer timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured deadline.
        timeout_ms: u64,
    },
}

/// Tokenizer seam consumed by the arbiter and the ruby auditor.
#[async_trait]
pub trait MorphologicalAnalyzer: Send + Sync {
    /// Tokenize `text` into ordered tokens with baseline readings.
    async fn tokenize(&self, text: &str) -> Result<Vec<MorphToken>, AnalyzerError>;
}

/// Concatenated baseline reading of a token sequence.
#[must_use]
pub fn baseline_reading(tokens: &[MorphToken]) -> String {
    tokens.iter().map(|t| t.reading.as_str()).collect()
}

/// HTTP analyzer client posting to a tokenizer sidecar.
pub struct HttpAnalyzer {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpAnalyzer {
    /// Create a client against `base_url` with a per-request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn classify(&self, e: reqwest::Error) -> AnalyzerError {
        if e.is_timeout() {
            AnalyzerError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AnalyzerError::Http(e)
        }
    }
}

#[async_trait]
impl MorphologicalAnalyzer for HttpAnalyzer {
    async fn tokenize(&self, text: &str) -> Result<Vec<MorphToken>, AnalyzerError> {
        let url = format!("{}/tokenize", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let tokens: Vec<MorphToken> = response.json().await.map_err(|e| self.classify(e))?;
        debug!(chars = text.chars().count(), tokens = tokens.len(), "text tokenized");
        Ok(tokens)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(surface: &str, reading: &str) -> MorphToken {
        MorphToken {
            surface: surface.into(),
            reading: reading.into(),
            part_of_speech: "名詞".into(),
        }
    }

    // ── baseline_reading ─────────────────────────────────────────────────

    #[test]
    fn baseline_reading_concatenates_in_order() {
        let tokens = vec![token("招待", "ショウタイ"), token("状", "ジョウ")];
        assert_eq!(baseline_reading(&tokens), "ショウタイジョウ");
    }

    #[test]
    fn baseline_reading_empty() {
        assert_eq!(baseline_reading(&[]), "");
    }

    // ── HttpAnalyzer ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn tokenize_posts_text_and_parses_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokenize"))
            .and(body_json(serde_json::json!({ "text": "招待状" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "surface": "招待", "reading": "ショウタイ", "partOfSpeech": "名詞" },
                { "surface": "状", "reading": "ジョウ", "partOfSpeech": "接尾辞" }
            ])))
            .mount(&server)
            .await;

        let analyzer = HttpAnalyzer::new(server.uri(), Duration::from_secs(5));
        let tokens = analyzer.tokenize("招待状").await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].reading, "ショウタイ");
        assert_eq!(tokens[1].part_of_speech, "接尾辞");
    }

    #[tokio::test]
    async fn non_2xx_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokenize"))
            .respond_with(ResponseTemplate::new(500).set_body_string("analyzer down"))
            .mount(&server)
            .await;

        let analyzer = HttpAnalyzer::new(server.uri(), Duration::from_secs(5));
        let err = analyzer.tokenize("x").await.unwrap_err();
        assert_matches!(err, AnalyzerError::Api { status: 500, message } if message == "analyzer down");
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokenize"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;

        let analyzer = HttpAnalyzer::new(server.uri(), Duration::from_millis(50));
        let err = analyzer.tokenize("x").await.unwrap_err();
        assert_matches!(err, AnalyzerError::Timeout { timeout_ms: 50 });
    }
}
