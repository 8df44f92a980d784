//! Error types for the edgequake-notes2answers library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`AnswerKitError`] (**fatal**): the run cannot proceed at all (a notes
//!   file is corrupt, the question bank yields no questions, no provider is
//!   configured). Returned as `Err(AnswerKitError)` from the top-level
//!   `generate*` functions; no results are produced.
//!
//! * [`LlmCallError`]: a single backend call failed. Rate-limit failures are
//!   retried by [`crate::retry::RetryPolicy`]; everything else propagates to
//!   whoever issued the call.
//!
//! * [`QuestionError`] (**non-fatal**): one question could not be answered.
//!   Stored inside [`crate::output::AnswerResult`] next to a fallback answer
//!   so every other question is unaffected.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-notes2answers library.
///
/// Question-level failures use [`QuestionError`] and are stored in
/// [`crate::output::AnswerResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum AnswerKitError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is neither text, markdown, PDF nor a Word document.
    #[error("Unsupported file type for '{file}': {detail}\nAccepted: .txt, .md, .pdf, .docx")]
    UnsupportedFileType { file: String, detail: String },

    /// A notes or question-bank file could not be normalised.
    #[error("Failed to read '{file}': {detail}")]
    DocumentParse { file: String, detail: String },

    /// No notes files were supplied.
    #[error("No notes files supplied; at least one notes document is required")]
    NoNotes,

    // ── Question bank ─────────────────────────────────────────────────────
    /// The question bank produced zero or malformed questions.
    #[error("Could not extract questions from the question bank: {0}")]
    Extraction(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF notes need the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Install libpdfium system-wide (it is looked up on the library path).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed call to an LLM backend.
#[derive(Debug, Error)]
pub enum LlmCallError {
    /// The backend answered with an error (HTTP status if known).
    #[error("LLM API error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Api { status: Option<u16>, message: String },

    /// The request never produced a response (DNS, TLS, connection reset…).
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// A single attempt exceeded the per-call timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A required field was missing from the backend response.
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    /// The backend cannot perform this kind of call at all.
    #[error("Backend '{backend}' does not support {operation}")]
    Unsupported {
        backend: String,
        operation: &'static str,
    },

    /// The rate-limit retry budget was exhausted.
    #[error("Rate limit exceeded after {attempts} attempts: {source}")]
    RateLimitExceeded {
        attempts: u32,
        #[source]
        source: Box<LlmCallError>,
    },
}

/// Markers that identify a quota / throughput refusal in error text.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "resource_exhausted",
    "resource exhausted",
    "429",
    "rate limit",
    "rate-limit",
    "too many requests",
    "quota",
];

impl LlmCallError {
    /// True when this error is a temporary refusal worth backing off for.
    ///
    /// The check is on the status code and on the error text, so errors
    /// surfaced by third-party providers as plain strings still qualify.
    pub fn is_rate_limit_signal(&self) -> bool {
        match self {
            LlmCallError::Api { status, message } => {
                *status == Some(429) || contains_rate_limit_marker(message)
            }
            LlmCallError::Transport(message) => contains_rate_limit_marker(message),
            _ => false,
        }
    }

    /// True when the retry budget for a rate-limited call ran out.
    pub fn is_rate_limit_exhausted(&self) -> bool {
        matches!(self, LlmCallError::RateLimitExceeded { .. })
    }
}

fn contains_rate_limit_marker(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

/// A non-fatal error for a single question.
///
/// Stored alongside the fallback answer in [`crate::output::AnswerResult`].
/// The run continues for every other question.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum QuestionError {
    /// A call for this question kept hitting the rate limit.
    #[error("Question {index}: rate limit retries exhausted: {detail}")]
    RateLimitExhausted { index: usize, detail: String },

    /// Any other failure in the probe or synthesis stage.
    #[error("Question {index}: {stage} failed: {detail}")]
    Failed {
        index: usize,
        stage: String,
        detail: String,
    },

    /// The run was cancelled before this question was started.
    #[error("Question {index}: cancelled before it was started")]
    Cancelled { index: usize },
}

impl QuestionError {
    /// Build the question-level error for a failed LLM call.
    pub fn from_call(index: usize, stage: &str, err: &LlmCallError) -> Self {
        if err.is_rate_limit_exhausted() {
            QuestionError::RateLimitExhausted {
                index,
                detail: err.to_string(),
            }
        } else {
            QuestionError::Failed {
                index,
                stage: stage.to_string(),
                detail: err.to_string(),
            }
        }
    }
}
