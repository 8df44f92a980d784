//! Progress-callback trait for per-question answer events.
//!
//! Inject an [`Arc<dyn AnswerProgressCallback>`] via
//! [`crate::config::AnswerConfigBuilder::progress_callback`] to follow a run
//! as workers finish questions.
//!
//! # Ordering
//!
//! The scheduler invokes [`AnswerProgressCallback::on_question_complete`]
//! while holding the lock that guards its completion counter, so `completed`
//! arrives strictly increasing from 1 to `total` even though questions finish
//! in arbitrary order. Keep implementations quick and non-blocking.
//!
//! # Example
//!
//! ```rust
//! use edgequake_notes2answers::{AnswerConfig, FnProgress, ProgressCallback};
//! use std::sync::Arc;
//!
//! let progress: ProgressCallback = Arc::new(FnProgress(|done: usize, total: usize| {
//!     eprintln!("{done}/{total} answered");
//! }));
//!
//! let config = AnswerConfig::builder()
//!     .progress_callback(progress)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the answer pipeline as it works through the question queue.
///
/// Implementations must be `Send + Sync`: several workers report through the
/// same callback. Every method except `on_question_complete` has a no-op
/// default.
pub trait AnswerProgressCallback: Send + Sync {
    /// Called once before any worker starts.
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called exactly once per finished question, answered or degraded.
    ///
    /// # Arguments
    /// * `completed`: questions finished so far, including this one
    /// * `total`    : questions in the run
    fn on_question_complete(&self, completed: usize, total: usize);

    /// Called before `on_question_complete` when a question degraded to a
    /// fallback answer.
    ///
    /// # Arguments
    /// * `index`: 0-based position of the question in the input
    /// * `error`: human-readable failure description
    fn on_question_failed(&self, index: usize, error: &str) {
        let _ = (index, error);
    }

    /// Called once after every worker has drained the queue.
    fn on_run_complete(&self, total: usize, answered: usize) {
        let _ = (total, answered);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnswerProgressCallback for NoopProgressCallback {
    fn on_question_complete(&self, _completed: usize, _total: usize) {}
}

/// Adapts a plain `(completed, total)` closure into a progress callback.
pub struct FnProgress<F>(pub F);

impl<F> AnswerProgressCallback for FnProgress<F>
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_question_complete(&self, completed: usize, total: usize) {
        (self.0)(completed, total)
    }
}

/// Convenience alias matching the type stored in [`crate::config::AnswerConfig`].
pub type ProgressCallback = Arc<dyn AnswerProgressCallback>;
