//! The retrying, time-bounded LLM client every pipeline stage calls through.
//!
//! [`LlmClient`] owns the resolved backend plus the run's [`RetryPolicy`].
//! Each attempt is wrapped in `tokio::time::timeout`; a timed-out attempt
//! surfaces as [`LlmCallError::Timeout`] and is not retried, since only
//! rate-limit signals are.

use crate::backend::gemini::GeminiBackend;
use crate::backend::provider::ProviderBackend;
use crate::backend::{
    GenerateRequest, GroundedTextResponse, ImageRequest, ImageResponse, LlmBackend,
};
use crate::config::AnswerConfig;
use crate::error::{AnswerKitError, LlmCallError};
use crate::retry::RetryPolicy;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Model handed to chat providers in place of a configured Gemini model
/// name they would not recognise.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-mini";

#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn LlmBackend>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            backend,
            policy,
            timeout,
        }
    }

    /// Resolve the backend named by `config` and attach its retry policy.
    pub fn from_config(config: &AnswerConfig) -> Result<Self, AnswerKitError> {
        let backend = resolve_backend(config)?;
        info!("Using LLM backend '{}'", backend.name());
        Ok(Self::new(
            backend,
            config.retry_policy(),
            Duration::from_secs(config.api_timeout_secs),
        ))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LlmCallError>>,
    ) -> Result<T, LlmCallError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| LlmCallError::Timeout {
                secs: self.timeout.as_secs(),
            })?
    }

    /// Plain generation; returns the response text.
    pub async fn generate_text(
        &self,
        label: &str,
        request: &GenerateRequest,
    ) -> Result<String, LlmCallError> {
        let response = self
            .policy
            .execute(label, || self.bounded(self.backend.generate(request)))
            .await?;
        Ok(response.text)
    }

    /// Generation with web search enabled.
    pub async fn generate_grounded(
        &self,
        label: &str,
        request: &GenerateRequest,
    ) -> Result<GroundedTextResponse, LlmCallError> {
        self.policy
            .execute(label, || self.bounded(self.backend.generate_grounded(request)))
            .await
    }

    pub async fn generate_image(
        &self,
        label: &str,
        request: &ImageRequest,
    ) -> Result<ImageResponse, LlmCallError> {
        self.policy
            .execute(label, || self.bounded(self.backend.generate_image(request)))
            .await
    }
}

/// Resolve the backend, from most-specific to least-specific:
///
/// 1. `config.backend`, used as-is.
/// 2. `config.provider_name`: `"gemini"` selects the Gemini REST backend,
///    anything else goes through [`ProviderFactory::create_llm_provider`].
/// 3. A Gemini key in the config or in `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 5. `OPENAI_API_KEY`.
/// 6. [`ProviderFactory::from_env`] auto-detection.
pub fn resolve_backend(config: &AnswerConfig) -> Result<Arc<dyn LlmBackend>, AnswerKitError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let gemini_key = config
        .gemini_api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(GeminiBackend::api_key_from_env);

    if let Some(ref name) = config.provider_name {
        let name = name.to_ascii_lowercase();
        if name == "gemini" || name == "google" {
            let key = gemini_key.ok_or_else(|| AnswerKitError::ProviderNotConfigured {
                provider: name.clone(),
                hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY) or pass an API key.".into(),
            })?;
            return gemini_backend(key);
        }
        return chat_backend(&name, config);
    }

    if let Some(key) = gemini_key {
        return gemini_backend(key);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return single_model_backend(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return chat_backend("openai", config);
    }

    let (llm, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnswerKitError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (recommended: enables web search and image generation),\n\
                OPENAI_API_KEY or ANTHROPIC_API_KEY.\n\
                Error: {e}"
            ),
        })?;
    Ok(Arc::new(ProviderBackend::new(llm, "auto")))
}

fn gemini_backend(key: String) -> Result<Arc<dyn LlmBackend>, AnswerKitError> {
    let mut backend = GeminiBackend::new(key).map_err(|e| AnswerKitError::ProviderNotConfigured {
        provider: "gemini".into(),
        hint: e.to_string(),
    })?;
    if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
        if !url.trim().is_empty() {
            backend = backend.with_base_url(url);
        }
    }
    Ok(Arc::new(backend))
}

fn create_provider(provider: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AnswerKitError> {
    ProviderFactory::create_llm_provider(provider, model).map_err(|e| {
        AnswerKitError::ProviderNotConfigured {
            provider: provider.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn single_model_backend(provider: &str, model: &str) -> Result<Arc<dyn LlmBackend>, AnswerKitError> {
    let llm = create_provider(provider, model)?;
    Ok(Arc::new(ProviderBackend::new(llm, provider)))
}

/// One provider per distinct configured text model, keyed by the name the
/// pipeline puts in its requests.
fn chat_backend(provider: &str, config: &AnswerConfig) -> Result<Arc<dyn LlmBackend>, AnswerKitError> {
    let default = create_provider(provider, &provider_model(&config.answer_model))?;
    let mut backend = ProviderBackend::new(Arc::clone(&default), provider);

    let mut built: HashMap<String, Arc<dyn LLMProvider>> = HashMap::new();
    built.insert(provider_model(&config.answer_model), default);
    for model in [&config.answer_model, &config.probe_model, &config.extraction_model] {
        let resolved = provider_model(model);
        let llm = match built.get(&resolved) {
            Some(llm) => Arc::clone(llm),
            None => {
                let llm = create_provider(provider, &resolved)?;
                built.insert(resolved.clone(), Arc::clone(&llm));
                llm
            }
        };
        debug!("{provider}: requests for {model} use {resolved}");
        backend = backend.with_model(model.as_str(), llm);
    }
    Ok(Arc::new(backend))
}

/// Gemini model names mean nothing to other providers; they map to
/// [`DEFAULT_PROVIDER_MODEL`].
fn provider_model(model: &str) -> String {
    if model.starts_with("gemini") {
        DEFAULT_PROVIDER_MODEL.to_string()
    } else {
        model.to_string()
    }
}
