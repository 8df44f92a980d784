//! Configuration types for answer generation.
//!
//! All run behaviour is controlled through [`AnswerConfig`], built via its
//! [`AnswerConfigBuilder`]. The config is resolved once at startup and passed
//! explicitly to every stage; nothing reads model names or API keys from
//! global state afterwards.

use crate::backend::LlmBackend;
use crate::error::AnswerKitError;
use crate::normalize::NormalizeOptions;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Concurrent questions in flight. Two keeps well inside free-tier quotas.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Pages whose text layer is shorter than this are treated as scanned.
pub const SCAN_TEXT_THRESHOLD: usize = 100;

/// Scale factor used when rasterising a scanned page.
pub const RENDER_SCALE: f32 = 1.5;

/// Leading base64 characters compared when de-duplicating images.
pub const DEDUP_PREFIX_LEN: usize = 100;

/// Characters of notes text sent to the relevance probe.
pub const PROBE_NOTES_CHARS: usize = 8000;

pub const DEFAULT_PROBE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ANSWER_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";

/// Configuration for one generation run.
///
/// Built via [`AnswerConfig::builder()`] or using [`AnswerConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_notes2answers::AnswerConfig;
///
/// let config = AnswerConfig::builder()
///     .concurrency(3)
///     .answer_model("gemini-2.5-flash")
///     .custom_instructions("Use British spelling.")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnswerConfig {
    /// Number of questions answered concurrently. Default: 2.
    ///
    /// This bound exists for upstream rate limits, not CPU: each question
    /// holds at most one LLM call in flight at a time.
    pub concurrency: usize,

    /// Retries for a rate-limited call before giving up. Default: 3.
    pub max_retries: u32,

    /// Initial backoff in milliseconds, doubled per retry. Default: 1000.
    pub retry_initial_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff. Default: 1000.
    pub retry_max_jitter_ms: u64,

    /// Per-attempt timeout for a single LLM call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Notes characters given to the relevance probe. Default: 8000.
    pub probe_notes_chars: usize,

    /// Scanned-page detection threshold in characters. Default: 100.
    pub scan_text_threshold: usize,

    /// Rasterisation scale for scanned pages. Default: 1.5.
    pub render_scale: f32,

    /// Base64 prefix length used as the image de-duplication key. Default: 100.
    pub dedup_prefix_len: usize,

    /// Lightweight model for the yes/no relevance probe.
    pub probe_model: String,

    /// Model that writes the answers.
    pub answer_model: String,

    /// Model that segments the question bank.
    pub extraction_model: String,

    /// Image-generation model.
    pub image_model: String,

    /// Provider name ("gemini", "openai", "anthropic", "ollama", …).
    /// If None, auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn LlmBackend>>,

    /// Gemini API key. If None, read from `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
    pub gemini_api_key: Option<String>,

    /// Extra instructions appended to every synthesis prompt.
    pub custom_instructions: Option<String>,

    /// Sampling temperature for synthesis. None uses the model default.
    pub temperature: Option<f32>,

    /// Receives per-question progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Set to `true` to stop workers from taking further questions.
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: 3,
            retry_initial_delay_ms: 1000,
            retry_max_jitter_ms: 1000,
            api_timeout_secs: 120,
            probe_notes_chars: PROBE_NOTES_CHARS,
            scan_text_threshold: SCAN_TEXT_THRESHOLD,
            render_scale: RENDER_SCALE,
            dedup_prefix_len: DEDUP_PREFIX_LEN,
            probe_model: DEFAULT_PROBE_MODEL.to_string(),
            answer_model: DEFAULT_ANSWER_MODEL.to_string(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            provider_name: None,
            backend: None,
            gemini_api_key: None,
            custom_instructions: None,
            temperature: None,
            progress_callback: None,
            cancel_flag: None,
        }
    }
}

impl fmt::Debug for AnswerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerConfig")
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_initial_delay_ms", &self.retry_initial_delay_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("probe_notes_chars", &self.probe_notes_chars)
            .field("scan_text_threshold", &self.scan_text_threshold)
            .field("render_scale", &self.render_scale)
            .field("probe_model", &self.probe_model)
            .field("answer_model", &self.answer_model)
            .field("extraction_model", &self.extraction_model)
            .field("image_model", &self.image_model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("custom_instructions", &self.custom_instructions.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl AnswerConfig {
    /// Create a new builder for `AnswerConfig`.
    pub fn builder() -> AnswerConfigBuilder {
        AnswerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy applied to every LLM call of the run.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_jitter: Duration::from_millis(self.retry_max_jitter_ms),
        }
    }

    /// Normaliser settings for notes (`extract_images = true`) or for the
    /// question bank (`false`).
    pub fn normalize_options(&self, extract_images: bool) -> NormalizeOptions {
        NormalizeOptions {
            extract_images,
            scan_text_threshold: self.scan_text_threshold,
            render_scale: self.render_scale,
            dedup_prefix_len: self.dedup_prefix_len,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|f| f.load(std::sync::atomic::Ordering::SeqCst))
    }
}

/// Builder for [`AnswerConfig`].
#[derive(Debug)]
pub struct AnswerConfigBuilder {
    config: AnswerConfig,
}

impl AnswerConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_initial_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_initial_delay_ms = ms;
        self
    }

    pub fn retry_max_jitter_ms(mut self, ms: u64) -> Self {
        self.config.retry_max_jitter_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn probe_notes_chars(mut self, n: usize) -> Self {
        self.config.probe_notes_chars = n;
        self
    }

    pub fn scan_text_threshold(mut self, n: usize) -> Self {
        self.config.scan_text_threshold = n;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 4.0);
        self
    }

    pub fn dedup_prefix_len(mut self, n: usize) -> Self {
        self.config.dedup_prefix_len = n.max(1);
        self
    }

    pub fn probe_model(mut self, model: impl Into<String>) -> Self {
        self.config.probe_model = model.into();
        self
    }

    pub fn answer_model(mut self, model: impl Into<String>) -> Self {
        self.config.answer_model = model.into();
        self
    }

    pub fn extraction_model(mut self, model: impl Into<String>) -> Self {
        self.config.extraction_model = model.into();
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.config.image_model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn LlmBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini_api_key = Some(key.into());
        self
    }

    pub fn custom_instructions(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.config.custom_instructions = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.config.cancel_flag = Some(flag);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnswerConfig, AnswerKitError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(AnswerKitError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        for (name, model) in [
            ("probe", &c.probe_model),
            ("answer", &c.answer_model),
            ("extraction", &c.extraction_model),
            ("image", &c.image_model),
        ] {
            if model.trim().is_empty() {
                return Err(AnswerKitError::InvalidConfig(format!(
                    "{name} model name must not be empty"
                )));
            }
        }
        Ok(self.config)
    }
}
