/// LLM Client — the single point of entry for all generative-model calls.
///
/// ARCHITECTURAL RULE: No other module may call a model vendor API directly.
/// Callers depend on the `GenerativeModel` trait; `GeminiClient` is the only
/// production implementation.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub mod fake;
pub mod prompts;

const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One structured-output request to a model.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub output_schema: &'a Value,
}

/// Why a model stopped, as reported alongside its output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub finish_reason: Option<String>,
    pub finish_message: Option<String>,
    /// Safety categories that caused content to be blocked.
    pub blocked_categories: Vec<String>,
}

/// The outcome of a completed model call.
///
/// `output` is `None` when the model produced nothing parseable as JSON.
/// `raw` is the untouched vendor response, kept for operator logging only.
#[derive(Debug, Clone)]
pub struct Generation {
    pub output: Option<Value>,
    pub diagnostics: Diagnostics,
    pub raw: Value,
}

/// A generative model that answers a prompt with JSON matching a schema.
///
/// Carried in `AppState` as `Arc<dyn GenerativeModel>`.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<Generation, LlmError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire format
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    finish_message: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SafetyRating {
    category: String,
    #[serde(default)]
    blocked: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

fn blocked(ratings: &[SafetyRating]) -> Vec<String> {
    ratings
        .iter()
        .filter(|r| r.blocked)
        .map(|r| r.category.clone())
        .collect()
}

impl GeminiResponse {
    /// Concatenated text of the top candidate's parts.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }

    /// Diagnostics from the top candidate, or from prompt feedback when the
    /// prompt itself was blocked and no candidate came back.
    fn diagnostics(&self) -> Diagnostics {
        if let Some(top) = self.candidates.first() {
            return Diagnostics {
                finish_reason: top.finish_reason.clone(),
                finish_message: top.finish_message.clone(),
                blocked_categories: blocked(&top.safety_ratings),
            };
        }
        match &self.prompt_feedback {
            Some(feedback) => Diagnostics {
                finish_reason: feedback.block_reason.clone(),
                finish_message: None,
                blocked_categories: blocked(&feedback.safety_ratings),
            },
            None => Diagnostics::default(),
        }
    }
}

/// Turns a raw `generateContent` response body into a `Generation`.
fn generation_from_raw(raw: Value) -> Result<Generation, LlmError> {
    let response: GeminiResponse = serde_json::from_value(raw.clone())?;

    let output = response.text().and_then(|text| {
        match serde_json::from_str::<Value>(strip_json_fences(&text)) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Model text is not JSON: {e}");
                None
            }
        }
    });

    Ok(Generation {
        output,
        diagnostics: response.diagnostics(),
        raw,
    })
}

/// Maps a non-2xx response body to `LlmError::Api`, preferring the API's own
/// error message over the raw body.
fn api_error_from_body(status: u16, body: String) -> LlmError {
    let message = serde_json::from_str::<GeminiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    LlmError::Api { status, message }
}

// ────────────────────────────────────────────────────────────────────────────
// GeminiClient
// ────────────────────────────────────────────────────────────────────────────

/// Wraps the Generative Language `generateContent` endpoint with
/// schema-constrained JSON output. Exactly one HTTP request per call.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        timeout: std::time::Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            api_base,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<Generation, LlmError> {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: request.system,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: JSON_MIME_TYPE,
                response_schema: request.output_schema,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error_from_body(status.as_u16(), body));
        }

        let raw: Value = response.json().await?;
        let generation = generation_from_raw(raw)?;

        debug!(
            model = %self.model,
            has_output = generation.output.is_some(),
            finish_reason = ?generation.diagnostics.finish_reason,
            "Model call completed"
        );

        Ok(generation)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}
