//! Output types produced by a generation run.
//!
//! Everything here is `Serialize + Deserialize` so a run can be written as
//! JSON and re-loaded by whatever renders or exports it.

use crate::error::QuestionError;
use serde::{Deserialize, Serialize};

/// A web citation attached to an answer. `uri` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

/// The answer to one question.
///
/// Exactly one `AnswerResult` exists per input question. Degraded results
/// carry a fallback `answer`, no image, no sources and `error: Some(..)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question: String,
    pub marks: Option<String>,
    /// Markdown answer body with any image directive stripped.
    pub answer: String,
    /// Self-contained `data:` URI, if an image was attached.
    pub image_url: Option<String>,
    pub sources: Vec<Source>,
    /// Whether the synthesis call had web search enabled.
    #[serde(default)]
    pub used_web_search: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<QuestionError>,
}

impl AnswerResult {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate numbers for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_questions: usize,
    pub answered: usize,
    pub failed: usize,
    pub web_searched: usize,
    pub images_attached: usize,
    /// Images available in the normalised notes.
    pub notes_images: usize,
    pub duration_ms: u64,
}

impl RunStats {
    /// Tally the per-question outcomes of a finished run.
    pub fn from_results(results: &[AnswerResult], notes_images: usize, duration_ms: u64) -> Self {
        let failed = results.iter().filter(|r| r.is_degraded()).count();
        Self {
            total_questions: results.len(),
            answered: results.len() - failed,
            failed,
            web_searched: results.iter().filter(|r| r.used_web_search).count(),
            images_attached: results.iter().filter(|r| r.image_url.is_some()).count(),
            notes_images,
            duration_ms,
        }
    }
}

/// Everything a run produces: results in question order plus stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOutput {
    pub results: Vec<AnswerResult>,
    pub stats: RunStats,
}
