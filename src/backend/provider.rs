//! Adapter from any `edgequake_llm` provider to [`LlmBackend`].
//!
//! Chat-style providers have no web-search tool and no image model, so
//! `generate_grounded` degrades to a plain chat with no citations and
//! `generate_image` reports [`LlmCallError::Unsupported`].
//!
//! A provider is bound to one model when it is created, so the backend keeps
//! one provider per configured model name and picks it by
//! `GenerateRequest::model`. Unknown names use the default provider.

use super::{
    GenerateRequest, GroundedTextResponse, ImageRequest, ImageResponse, LlmBackend,
    PlainTextResponse,
};
use crate::error::LlmCallError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    by_model: HashMap<String, Arc<dyn LLMProvider>>,
    label: String,
}

impl ProviderBackend {
    /// `label` names the provider in logs ("openai", "ollama", …).
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            by_model: HashMap::new(),
            label: label.into(),
        }
    }

    /// Serve requests for `model` with their own provider.
    pub fn with_model(mut self, model: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        self.by_model.insert(model.into(), provider);
        self
    }

    fn provider_for(&self, model: &str) -> &Arc<dyn LLMProvider> {
        self.by_model.get(model).unwrap_or(&self.provider)
    }

    async fn chat(&self, request: &GenerateRequest) -> Result<String, LlmCallError> {
        let messages = build_messages(request);
        let options = CompletionOptions {
            temperature: request.temperature,
            ..Default::default()
        };

        let response = self
            .provider_for(&request.model)
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| LlmCallError::Api {
                status: None,
                message: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(LlmCallError::MalformedResponse(format!(
                "{} returned an empty message",
                self.label
            )));
        }
        Ok(response.content)
    }
}

/// System message (when present) then one user turn carrying the text parts
/// and every inline image.
fn build_messages(request: &GenerateRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(ref sys) = request.system_instruction {
        messages.push(ChatMessage::system(sys.as_str()));
    }

    let mut text = request.joined_text();
    if let Some(ref schema) = request.response_schema {
        text.push_str("\n\nRespond with JSON only, matching this schema:\n");
        text.push_str(&schema.to_string());
    }

    let images: Vec<ImageData> = request
        .images()
        .map(|img| ImageData::new(img.data.clone(), img.mime_type.clone()))
        .collect();

    messages.push(ChatMessage::user_with_images(text, images));
    messages
}

#[async_trait]
impl LlmBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<PlainTextResponse, LlmCallError> {
        let text = self.chat(request).await?;
        Ok(PlainTextResponse { text })
    }

    async fn generate_grounded(
        &self,
        request: &GenerateRequest,
    ) -> Result<GroundedTextResponse, LlmCallError> {
        debug!("{}: no web search available, answering without it", self.label);
        let text = self.chat(request).await?;
        Ok(GroundedTextResponse {
            text,
            sources: Vec::new(),
        })
    }

    async fn generate_image(&self, _request: &ImageRequest) -> Result<ImageResponse, LlmCallError> {
        Err(LlmCallError::Unsupported {
            backend: self.label.clone(),
            operation: "image generation",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PromptPart;
    use crate::document::ImagePart;
    use edgequake_llm::MockProvider;

    async fn mock(reply: &str) -> Arc<dyn LLMProvider> {
        let provider = MockProvider::new();
        provider.add_response(reply).await;
        Arc::new(provider)
    }

    #[tokio::test]
    async fn requests_use_the_provider_for_their_model() {
        let backend = ProviderBackend::new(mock("from default").await, "test")
            .with_model("small-model", mock("from small").await);

        let small = GenerateRequest::new("small-model", vec![PromptPart::text("hi")]);
        let other = GenerateRequest::new("unknown-model", vec![PromptPart::text("hi")]);

        assert_eq!(backend.generate(&small).await.unwrap().text, "from small");
        assert_eq!(backend.generate(&other).await.unwrap().text, "from default");
    }

    #[test]
    fn messages_carry_system_and_images() {
        let req = GenerateRequest::new(
            "ignored",
            vec![
                PromptPart::text("notes"),
                PromptPart::Image(ImagePart::new("AAAA", "image/png")),
                PromptPart::text("question"),
            ],
        )
        .with_system_instruction("sys");

        let messages = build_messages(&req);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn messages_without_system_instruction() {
        let req = GenerateRequest::new("m", vec![PromptPart::text("hi")]);
        assert_eq!(build_messages(&req).len(), 1);
    }
}
