//! Answer pipeline: one [`AnswerResult`] per question.
//!
//! ## Per-question protocol
//!
//! ```text
//! probe ──▶ synthesize ──▶ image
//! (yes/no)  (answer +      (reuse notes image
//!            directive)     or generate one)
//! ```
//!
//! 1. [`probe`]: do the notes cover the question? "no" enables web search
//! 2. [`synthesize`]: write the answer; [`directive`] splits off the image
//!    directive and [`postprocess`] cleans the body
//! 3. [`image`]: resolve the directive to a data URI; failure only costs
//!    the illustration
//!
//! ## Scheduling
//!
//! `concurrency` workers share a queue of `(index, &Question)`. Each worker
//! pops a question, runs the protocol, stores the result at its original
//! index and reports progress. A failure in stage 1 or 2 becomes a degraded
//! result for that question alone. The completion counter and the progress
//! callback sit under one lock, so observers see `completed` rise strictly
//! from 1 to N however the questions interleave.

pub mod directive;
pub mod image;
pub mod postprocess;
pub mod probe;
pub mod synthesize;

use crate::client::LlmClient;
use crate::config::AnswerConfig;
use crate::document::NormalizedDocument;
use crate::error::QuestionError;
use crate::extract::Question;
use crate::output::AnswerResult;
use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Fallback answer when rate-limit retries ran out.
pub const RATE_LIMIT_FALLBACK: &str = "_This answer could not be generated because the AI \
service's rate limit was reached. Please wait a minute and try again._";

/// Fallback answer for any other failure.
pub const FAILURE_FALLBACK: &str =
    "_An error occurred while generating this answer. Please try again._";

/// Fallback answer for questions a cancelled run never started.
pub const CANCELLED_FALLBACK: &str = "_Not answered: the run was cancelled._";

/// Answer every question against the notes.
///
/// Never fails: the returned vector has exactly `questions.len()` entries,
/// in input order, with per-question failures recorded in
/// [`AnswerResult::error`].
pub async fn answer_questions(
    client: &LlmClient,
    notes: &NormalizedDocument,
    questions: &[Question],
    config: &AnswerConfig,
) -> Vec<AnswerResult> {
    let total = questions.len();
    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_run_start(total);
    }

    let queue: Mutex<VecDeque<(usize, &Question)>> =
        Mutex::new(questions.iter().enumerate().collect());
    let slots: Mutex<Vec<Option<AnswerResult>>> = Mutex::new((0..total).map(|_| None).collect());
    let completed = Mutex::new(0usize);

    let workers = config.concurrency.max(1).min(total);
    info!(
        "Answering {} questions with {} workers via '{}'",
        total,
        workers,
        client.backend_name()
    );

    let (queue, slots_ref, completed) = (&queue, &slots, &completed);
    join_all((0..workers).map(|_| async move {
        loop {
            if config.is_cancelled() {
                break;
            }
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some((index, question)) = next else {
                break;
            };

            let result = answer_question(client, notes, question, index, total, config).await;

            if let (Some(cb), Some(err)) = (progress, result.error.as_ref()) {
                cb.on_question_failed(index, &err.to_string());
            }
            slots_ref.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(result);

            let mut done = completed.lock().unwrap_or_else(PoisonError::into_inner);
            *done += 1;
            if let Some(cb) = progress {
                cb.on_question_complete(*done, total);
            }
        }
    }))
    .await;

    let results: Vec<AnswerResult> = slots
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .into_iter()
        .zip(questions)
        .enumerate()
        .map(|(index, (slot, question))| {
            slot.unwrap_or_else(|| {
                degraded(question, QuestionError::Cancelled { index }, CANCELLED_FALLBACK)
            })
        })
        .collect();

    let answered = results.iter().filter(|r| !r.is_degraded()).count();
    if answered < total {
        warn!("{} of {} questions degraded", total - answered, total);
    }
    if let Some(cb) = progress {
        cb.on_run_complete(total, answered);
    }
    results
}

/// Run the three stages for one question.
async fn answer_question(
    client: &LlmClient,
    notes: &NormalizedDocument,
    question: &Question,
    index: usize,
    total: usize,
    config: &AnswerConfig,
) -> AnswerResult {
    let label = format!("Question {}/{}", index + 1, total);

    let web_search =
        match probe::needs_web_search(client, question, &notes.text, config, &label).await {
            Ok(needed) => needed,
            Err(e) => return failed(question, index, "relevance probe", &e, &label),
        };

    let synthesis =
        match synthesize::synthesize_answer(client, question, notes, web_search, config, &label)
            .await
        {
            Ok(s) => s,
            Err(e) => return failed(question, index, "synthesis", &e, &label),
        };

    let image_url =
        image::resolve_image(client, synthesis.directive.as_ref(), notes, config, &label).await;

    AnswerResult {
        question: question.text.clone(),
        marks: question.marks.clone(),
        answer: synthesis.body,
        image_url,
        sources: synthesis.sources,
        used_web_search: web_search,
        error: None,
    }
}

fn failed(
    question: &Question,
    index: usize,
    stage: &str,
    err: &crate::error::LlmCallError,
    label: &str,
) -> AnswerResult {
    warn!("{label}: {stage} failed: {err}");
    let error = QuestionError::from_call(index, stage, err);
    let fallback = match error {
        QuestionError::RateLimitExhausted { .. } => RATE_LIMIT_FALLBACK,
        _ => FAILURE_FALLBACK,
    };
    degraded(question, error, fallback)
}

fn degraded(question: &Question, error: QuestionError, fallback: &str) -> AnswerResult {
    AnswerResult {
        question: question.text.clone(),
        marks: question.marks.clone(),
        answer: fallback.to_string(),
        image_url: None,
        sources: Vec::new(),
        used_web_search: false,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmCallError;

    #[test]
    fn rate_limit_failures_get_their_own_fallback() {
        let err = LlmCallError::RateLimitExceeded {
            attempts: 4,
            source: Box::new(LlmCallError::Api {
                status: Some(429),
                message: "quota".into(),
            }),
        };
        let r = failed(&Question::new("Q", Some("2")), 0, "synthesis", &err, "Question 1/1");
        assert_eq!(r.answer, RATE_LIMIT_FALLBACK);
        assert_eq!(r.marks.as_deref(), Some("2"));
        assert!(r.sources.is_empty());
        assert!(r.image_url.is_none());
    }

    #[test]
    fn other_failures_get_generic_fallback() {
        let err = LlmCallError::Transport("connection reset".into());
        let r = failed(&Question::new("Q", None), 3, "relevance probe", &err, "Question 4/5");
        assert_eq!(r.answer, FAILURE_FALLBACK);
        match r.error {
            Some(QuestionError::Failed { index, stage, .. }) => {
                assert_eq!(index, 3);
                assert_eq!(stage, "relevance probe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
