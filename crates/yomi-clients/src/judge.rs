//! Remote judgement client.
//!
//! Non-trivial reading conflicts are escalated in batches to a judgement
//! model. The judge is told to prefer the engine's prediction (it encodes
//! contextual accent information a spelled-out reading would lose) and to
//! emit corrections only for clear mispronunciations.
//!
//! Model output is parsed **leniently**: an enveloping key, a bare array,
//! or a single object are all accepted; anything else parses to an empty
//! verdict list. An item id missing from the response is "no verdict",
//! never an error — callers fail open.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use yomi_core::hazard::HazardTag;

/// Instruction sent with every batch.
pub const ARBITRATION_GUIDANCE: &str = "You arbitrate Japanese reading conflicts for speech \
synthesis. For each item, compare baselineKana (morphological analyzer) with engineKana \
(synthesis engine). Prefer the engine's prediction: it encodes contextual accent information \
that a fully spelled-out reading would lose. Emit replacements only when the engine reading is \
a clear mispronunciation. Respond with JSON of the form \
{\"items\": [{\"id\": \"...\", \"replacements\": [{\"from\": \"...\", \"to\": \"...\"}]}]}; \
an empty replacements list approves the engine reading.";

/// One conflict presented to the judge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeItem {
    /// Batch-unique id the response must echo.
    pub id: String,
    /// Surface form under dispute.
    pub surface: String,
    /// Baseline (analyzer or dictionary) reading.
    pub baseline_kana: String,
    /// Engine-predicted reading.
    pub engine_kana: String,
    /// Hazard tags that forced or accompanied escalation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hazard_tags: Vec<HazardTag>,
    /// Up to a few example contexts the surface appears in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
}

/// One batch sent to the judge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeBatch {
    /// Fixed arbitration instruction.
    pub guidance: String,
    /// Items under dispute.
    pub items: Vec<JudgeItem>,
}

impl JudgeBatch {
    /// Build a batch with the standard guidance.
    #[must_use]
    pub fn new(items: Vec<JudgeItem>) -> Self {
        Self {
            guidance: ARBITRATION_GUIDANCE.to_owned(),
            items,
        }
    }
}

/// One verbatim substring replacement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    /// Text to replace.
    pub from: String,
    /// Replacement text.
    pub to: String,
}

/// The judge's verdict for one item id.
///
/// Zero replacements approves the engine reading; one or more are applied
/// as verbatim substring replacements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemVerdict {
    /// Echoed item id.
    pub id: String,
    /// Corrections, possibly empty.
    #[serde(default)]
    pub replacements: Vec<Replacement>,
}

/// Errors from the judgement endpoint. Malformed response *content* is not
/// here — it parses to an empty verdict list by design.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    /// Transport failure.
    #[error("judge transport error: {0}")]
    Http(reqwest::Error),

    /// Non-2xx response.
    #[error("judge api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// The request exceeded its deadline.
    #[error("judge timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured deadline.
        timeout_ms: u64,
    },
}

/// Judgement seam consumed by the arbiter and the ruby auditor.
#[async_trait]
pub trait JudgementClient: Send + Sync {
    /// Submit one batch and collect whatever verdicts came back.
    async fn judge(&self, batch: &JudgeBatch) -> Result<Vec<ItemVerdict>, JudgeError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Lenient response parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Envelope keys accepted around the verdict array.
const ENVELOPE_KEYS: &[&str] = &["items", "results", "verdicts"];

/// Normalize any accepted response shape into a verdict list.
///
/// Accepted: a bare array of verdict objects, an object enveloping such an
/// array under `items`/`results`/`verdicts`, or a single verdict object.
/// Unrecognized shapes and unparseable elements yield nothing — the
/// corresponding items simply have no verdict.
#[must_use]
pub fn parse_verdicts(value: &Value) -> Vec<ItemVerdict> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_one).collect(),
        Value::Object(map) => {
            for key in ENVELOPE_KEYS {
                if let Some(Value::Array(items)) = map.get(*key) {
                    return items.iter().filter_map(parse_one).collect();
                }
            }
            // A single verdict object, not enveloped.
            parse_one(value).into_iter().collect()
        }
        _ => {
            warn!("unrecognized judge response shape, treating as no verdicts");
            Vec::new()
        }
    }
}

fn parse_one(value: &Value) -> Option<ItemVerdict> {
    match serde_json::from_value::<ItemVerdict>(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, "skipping unparseable judge verdict");
            None
        }
    }
}

/// Parse the raw text a model returned into verdicts.
///
/// Tolerates a Markdown code fence around the JSON. Unparseable text is an
/// empty verdict list, never an error.
#[must_use]
pub fn parse_verdict_text(raw: &str) -> Vec<ItemVerdict> {
    let stripped = strip_code_fence(raw);
    match serde_json::from_str::<Value>(stripped) {
        Ok(value) => parse_verdicts(&value),
        Err(e) => {
            warn!(error = %e, "malformed judge response, treating batch as no-verdict");
            Vec::new()
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag, then the closing fence.
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim().strip_suffix("```").unwrap_or(inner).trim()
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Chat-completions-shaped judge client.
pub struct HttpJudgementClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpJudgementClient {
    /// Create a client against `base_url` for `model` with a per-request
    /// timeout.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn classify(&self, e: reqwest::Error) -> JudgeError {
        if e.is_timeout() {
            JudgeError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            JudgeError::Http(e)
        }
    }

    fn build_request(&self, batch: &JudgeBatch) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": batch.guidance },
                {
                    "role": "user",
                    "content": serde_json::to_string(&batch.items).unwrap_or_default()
                }
            ],
            "temperature": 0
        })
    }
}

#[async_trait]
impl JudgementClient for HttpJudgementClient {
    async fn judge(&self, batch: &JudgeBatch) -> Result<Vec<ItemVerdict>, JudgeError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, items = batch.items.len(), "sending judge batch");
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(batch))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(JudgeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await.map_err(|e| self.classify(e))?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();
        let verdicts = parse_verdict_text(content);
        debug!(verdicts = verdicts.len(), "judge batch returned");
        Ok(verdicts)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verdict_json() -> Value {
        json!([
            { "id": "c0", "replacements": [] },
            { "id": "c1", "replacements": [{ "from": "ツライ", "to": "カライ" }] }
        ])
    }

    // ── parse_verdicts shapes ────────────────────────────────────────────

    #[test]
    fn bare_array_accepted() {
        let verdicts = parse_verdicts(&verdict_json());
        assert_eq!(verdicts.len(), 2);
        assert!(verdicts[0].replacements.is_empty());
        assert_eq!(verdicts[1].replacements[0].to, "カライ");
    }

    #[test]
    fn items_envelope_accepted() {
        let verdicts = parse_verdicts(&json!({ "items": verdict_json() }));
        assert_eq!(verdicts.len(), 2);
    }

    #[test]
    fn results_and_verdicts_envelopes_accepted() {
        assert_eq!(parse_verdicts(&json!({ "results": verdict_json() })).len(), 2);
        assert_eq!(parse_verdicts(&json!({ "verdicts": verdict_json() })).len(), 2);
    }

    #[test]
    fn single_object_accepted() {
        let verdicts = parse_verdicts(&json!({ "id": "c7", "replacements": [] }));
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].id, "c7");
    }

    #[test]
    fn missing_replacements_defaults_empty() {
        let verdicts = parse_verdicts(&json!([{ "id": "c0" }]));
        assert!(verdicts[0].replacements.is_empty());
    }

    #[test]
    fn unrecognized_shape_is_empty_not_error() {
        assert!(parse_verdicts(&json!("nope")).is_empty());
        assert!(parse_verdicts(&json!(42)).is_empty());
        assert!(parse_verdicts(&json!({ "unexpected": true })).is_empty());
    }

    #[test]
    fn unparseable_elements_are_skipped_individually() {
        let verdicts = parse_verdicts(&json!([
            { "id": "good", "replacements": [] },
            { "no_id_here": true }
        ]));
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].id, "good");
    }

    // ── parse_verdict_text ───────────────────────────────────────────────

    #[test]
    fn garbage_text_is_empty_batch() {
        assert!(parse_verdict_text("I could not decide, sorry!").is_empty());
        assert!(parse_verdict_text("").is_empty());
    }

    #[test]
    fn code_fenced_json_accepted() {
        let raw = "```json\n[{\"id\": \"c0\", \"replacements\": []}]\n```";
        assert_eq!(parse_verdict_text(raw).len(), 1);
    }

    #[test]
    fn unfenced_json_accepted() {
        let raw = r#"{"items": [{"id": "c0"}]}"#;
        assert_eq!(parse_verdict_text(raw).len(), 1);
    }

    // ── batch building ───────────────────────────────────────────────────

    #[test]
    fn batch_carries_standard_guidance() {
        let batch = JudgeBatch::new(vec![]);
        assert!(batch.guidance.contains("Prefer the engine's prediction"));
    }

    #[test]
    fn judge_item_omits_empty_optional_fields() {
        let item = JudgeItem {
            id: "c0".into(),
            surface: "辛い".into(),
            baseline_kana: "ツライ".into(),
            engine_kana: "カライ".into(),
            hazard_tags: vec![],
            contexts: vec![],
        };
        let v = serde_json::to_value(&item).unwrap();
        assert!(v.get("hazardTags").is_none());
        assert!(v.get("contexts").is_none());
    }

    // ── HttpJudgementClient ──────────────────────────────────────────────

    fn item(id: &str) -> JudgeItem {
        JudgeItem {
            id: id.into(),
            surface: "辛い".into(),
            baseline_kana: "ツライ".into(),
            engine_kana: "カライ".into(),
            hazard_tags: vec![HazardTag::Curated],
            contexts: vec!["辛い日々が続く。".into()],
        }
    }

    #[tokio::test]
    async fn judge_posts_batch_and_parses_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "content": "{\"items\": [{\"id\": \"c0\", \"replacements\": [{\"from\": \"カライ\", \"to\": \"ツライ\"}]}]}"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client =
            HttpJudgementClient::new(server.uri(), "test-key", "judge-1", Duration::from_secs(5));
        let verdicts = client.judge(&JudgeBatch::new(vec![item("c0")])).await.unwrap();
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].replacements[0].to, "ツライ");
    }

    #[tokio::test]
    async fn malformed_model_content_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "sorry, no JSON today" } }]
            })))
            .mount(&server)
            .await;

        let client =
            HttpJudgementClient::new(server.uri(), "k", "judge-1", Duration::from_secs(5));
        let verdicts = client.judge(&JudgeBatch::new(vec![item("c0")])).await.unwrap();
        assert!(verdicts.is_empty());
    }

    #[tokio::test]
    async fn non_2xx_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client =
            HttpJudgementClient::new(server.uri(), "k", "judge-1", Duration::from_secs(5));
        let err = client.judge(&JudgeBatch::new(vec![item("c0")])).await.unwrap_err();
        assert_matches!(err, JudgeError::Api { status: 429, .. });
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "choices": [] }))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;

        let client =
            HttpJudgementClient::new(server.uri(), "k", "judge-1", Duration::from_millis(50));
        let err = client.judge(&JudgeBatch::new(vec![item("c0")])).await.unwrap_err();
        assert_matches!(err, JudgeError::Timeout { timeout_ms: 50 });
    }
}
