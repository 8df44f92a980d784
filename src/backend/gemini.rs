//! Gemini REST backend: `generateContent` for text, Imagen `predict` for images.
//!
//! Grounded calls attach the `google_search` tool and map the candidate's
//! `groundingMetadata.groundingChunks[].web` entries to [`Source`]s.
//! HTTP failures keep their status code and response body, so quota errors
//! (`429 RESOURCE_EXHAUSTED`) reach the retry layer intact.

use super::{
    clean_sources, GenerateRequest, GroundedTextResponse, ImageRequest, ImageResponse, LlmBackend,
    PlainTextResponse, PromptPart,
};
use crate::error::LlmCallError;
use crate::output::Source;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables checked for an API key, in order.
pub const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmCallError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmCallError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the backend at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// First non-empty key found in [`API_KEY_VARS`].
    pub fn api_key_from_env() -> Option<String> {
        API_KEY_VARS
            .iter()
            .filter_map(|v| std::env::var(v).ok())
            .find(|k| !k.trim().is_empty())
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, LlmCallError> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmCallError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmCallError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmCallError::Api {
                status: Some(status.as_u16()),
                message: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| LlmCallError::MalformedResponse(format!("invalid JSON: {e}")))
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<PlainTextResponse, LlmCallError> {
        let body = build_generate_body(request, false);
        let value = self
            .post_json(&self.endpoint(&request.model, "generateContent"), &body)
            .await?;
        let (text, _) = parse_generate_response(value)?;
        Ok(PlainTextResponse { text })
    }

    async fn generate_grounded(
        &self,
        request: &GenerateRequest,
    ) -> Result<GroundedTextResponse, LlmCallError> {
        let body = build_generate_body(request, true);
        let value = self
            .post_json(&self.endpoint(&request.model, "generateContent"), &body)
            .await?;
        let (text, sources) = parse_generate_response(value)?;
        debug!("Grounded response with {} citations", sources.len());
        Ok(GroundedTextResponse { text, sources })
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, LlmCallError> {
        let body = json!({
            "instances": [{ "prompt": request.prompt }],
            "parameters": {
                "sampleCount": 1,
                "outputMimeType": request.output_mime_type,
            }
        });
        let value = self
            .post_json(&self.endpoint(&request.model, "predict"), &body)
            .await?;
        parse_predict_response(value, &request.output_mime_type)
    }
}

/// Build a `generateContent` request body.
pub(crate) fn build_generate_body(request: &GenerateRequest, grounded: bool) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|p| match p {
            PromptPart::Text(t) => json!({ "text": t }),
            PromptPart::Image(img) => json!({
                "inline_data": { "mime_type": img.mime_type, "data": img.data }
            }),
        })
        .collect();

    let mut body = json!({
        "contents": [{ "role": "user", "parts": parts }],
    });

    if let Some(ref sys) = request.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": sys }] });
    }

    if grounded {
        body["tools"] = json!([{ "google_search": {} }]);
    }

    let mut generation_config = serde_json::Map::new();
    if let Some(t) = request.temperature {
        generation_config.insert("temperature".into(), json!(t));
    }
    if let Some(ref schema) = request.response_schema {
        generation_config.insert("responseMimeType".into(), json!("application/json"));
        generation_config.insert("responseSchema".into(), schema.clone());
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }

    body
}

// ── Response shapes ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

/// Extract answer text and citations from a `generateContent` response.
pub(crate) fn parse_generate_response(value: Value) -> Result<(String, Vec<Source>), LlmCallError> {
    let response: GenerateContentResponse = serde_json::from_value(value)
        .map_err(|e| LlmCallError::MalformedResponse(format!("unexpected shape: {e}")))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(LlmCallError::MalformedResponse(format!(
            "empty response ({reason})"
        )));
    };

    let text: String = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmCallError::MalformedResponse(format!(
            "candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    let sources = candidate
        .grounding_metadata
        .map(|g| {
            g.grounding_chunks
                .into_iter()
                .filter_map(|c| c.web)
                .map(|w| Source {
                    uri: w.uri.unwrap_or_default(),
                    title: w.title.unwrap_or_default(),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok((text, clean_sources(sources)))
}

/// Decode the first generated image of a `predict` response.
pub(crate) fn parse_predict_response(
    value: Value,
    requested_mime: &str,
) -> Result<ImageResponse, LlmCallError> {
    let response: PredictResponse = serde_json::from_value(value)
        .map_err(|e| LlmCallError::MalformedResponse(format!("unexpected shape: {e}")))?;

    let prediction = response
        .predictions
        .into_iter()
        .find(|p| p.bytes_base64_encoded.is_some())
        .ok_or_else(|| LlmCallError::MalformedResponse("no generated images".into()))?;

    let encoded = prediction.bytes_base64_encoded.unwrap_or_default();
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| LlmCallError::MalformedResponse(format!("image payload is not base64: {e}")))?;
    if bytes.is_empty() {
        return Err(LlmCallError::MalformedResponse("generated image is empty".into()));
    }

    Ok(ImageResponse {
        bytes,
        mime_type: prediction
            .mime_type
            .unwrap_or_else(|| requested_mime.to_string()),
    })
}
