//! LLM backend contract.
//!
//! The pipeline needs exactly three kinds of call, expressed by
//! [`LlmBackend`]:
//!
//! | Call | Response |
//! |------|----------|
//! | plain generation | [`PlainTextResponse`] |
//! | web-search grounded generation | [`GroundedTextResponse`] (text + citations) |
//! | image generation | [`ImageResponse`] (raw bytes) |
//!
//! Implementations validate required response fields at the boundary and
//! fail with [`LlmCallError::MalformedResponse`] instead of passing empty
//! values downstream. All calls must be safe to repeat: the retry layer may
//! issue the same request several times.
//!
//! Two implementations ship with the crate:
//!
//! * [`gemini::GeminiBackend`]: Gemini REST API, supports all three calls.
//! * [`provider::ProviderBackend`]: any `edgequake_llm` provider (OpenAI,
//!   Anthropic, Ollama, …); no web search and no image generation.

pub mod gemini;
pub mod provider;

use crate::document::ImagePart;
use crate::error::LlmCallError;
use crate::output::Source;
use async_trait::async_trait;

/// One piece of a multimodal prompt, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    Image(ImagePart),
}

impl PromptPart {
    pub fn text(s: impl Into<String>) -> Self {
        PromptPart::Text(s.into())
    }
}

/// A text-generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub model: String,
    pub parts: Vec<PromptPart>,
    pub system_instruction: Option<String>,
    /// JSON schema the response must follow (structured output).
    pub response_schema: Option<serde_json::Value>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, parts: Vec<PromptPart>) -> Self {
        Self {
            model: model.into(),
            parts,
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(text.into());
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, t: Option<f32>) -> Self {
        self.temperature = t;
        self
    }

    /// Concatenated text parts, for backends without interleaved content.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(t) => Some(t.as_str()),
                PromptPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &ImagePart> {
        self.parts.iter().filter_map(|p| match p {
            PromptPart::Image(img) => Some(img),
            PromptPart::Text(_) => None,
        })
    }
}

/// An image-generation request.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    /// MIME type asked of the backend.
    pub output_mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainTextResponse {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedTextResponse {
    pub text: String,
    /// Citations, empty URIs already removed.
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Transport over an LLM service.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short identifier for logs ("gemini", "openai", …).
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<PlainTextResponse, LlmCallError>;

    /// Generation with the web-search tool enabled.
    async fn generate_grounded(
        &self,
        request: &GenerateRequest,
    ) -> Result<GroundedTextResponse, LlmCallError>;

    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, LlmCallError>;
}

/// Keep citations with a non-empty URI, first occurrence of each URI wins.
pub fn clean_sources(sources: impl IntoIterator<Item = Source>) -> Vec<Source> {
    let mut out: Vec<Source> = Vec::new();
    for s in sources {
        let uri = s.uri.trim();
        if uri.is_empty() || out.iter().any(|o| o.uri == uri) {
            continue;
        }
        out.push(Source {
            uri: uri.to_string(),
            title: s.title.trim().to_string(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(uri: &str, title: &str) -> Source {
        Source {
            uri: uri.into(),
            title: title.into(),
        }
    }

    #[test]
    fn clean_sources_drops_empty_uris() {
        let cleaned = clean_sources(vec![
            src("", "no link"),
            src("https://a.example", "A"),
            src("   ", "blank"),
        ]);
        assert_eq!(cleaned, vec![src("https://a.example", "A")]);
    }

    #[test]
    fn clean_sources_collapses_duplicates() {
        let cleaned = clean_sources(vec![
            src("https://a.example", "first"),
            src("https://a.example", "second"),
            src("https://b.example", ""),
        ]);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].title, "first");
        assert_eq!(cleaned[1].title, "");
    }

    #[test]
    fn joined_text_skips_images() {
        let req = GenerateRequest::new(
            "m",
            vec![
                PromptPart::text("one"),
                PromptPart::Image(ImagePart::new("AA==", "image/png")),
                PromptPart::text("two"),
            ],
        );
        assert_eq!(req.joined_text(), "one\n\ntwo");
        assert_eq!(req.images().count(), 1);
    }
}
