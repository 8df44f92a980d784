//! Stage 1: do the notes cover the question?
//!
//! A cheap yes/no call on a truncated notes excerpt. Any standalone "no" in
//! the reply means web search is needed, so hedged replies ("no, only
//! partly") lean towards searching.

use crate::backend::{GenerateRequest, PromptPart};
use crate::client::LlmClient;
use crate::config::AnswerConfig;
use crate::error::LlmCallError;
use crate::extract::Question;
use crate::prompts::{probe_prompt, PROBE_SYSTEM_PROMPT};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_NO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bno\b").unwrap());

/// True when the reply contains the word "no".
pub fn reply_says_no(reply: &str) -> bool {
    RE_NO.is_match(reply)
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn build_probe_request(question: &Question, notes_text: &str, config: &AnswerConfig) -> GenerateRequest {
    let excerpt = truncate_chars(notes_text, config.probe_notes_chars);
    GenerateRequest::new(
        config.probe_model.clone(),
        vec![PromptPart::text(probe_prompt(&question.text, excerpt))],
    )
    .with_system_instruction(PROBE_SYSTEM_PROMPT)
    .with_temperature(Some(0.0))
}

/// Returns whether the answer needs web search.
pub async fn needs_web_search(
    client: &LlmClient,
    question: &Question,
    notes_text: &str,
    config: &AnswerConfig,
    label: &str,
) -> Result<bool, LlmCallError> {
    let request = build_probe_request(question, notes_text, config);
    let reply = client.generate_text(label, &request).await?;
    let needed = reply_says_no(&reply);
    debug!("{label}: probe replied {:?} → web search {}", reply.trim(), needed);
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_no_triggers_search() {
        assert!(reply_says_no("No"));
        assert!(reply_says_no("no."));
        assert!(reply_says_no("Partially, no."));
        assert!(!reply_says_no("Yes"));
        assert!(!reply_says_no("Not entirely sure, yes"));
        assert!(!reply_says_no("The notes are thorough, yes."));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn probe_request_uses_excerpt_and_probe_model() {
        let config = AnswerConfig::builder()
            .probe_notes_chars(5)
            .probe_model("flash")
            .build()
            .unwrap();
        let req = build_probe_request(&Question::new("Q?", None), "0123456789", &config);
        assert_eq!(req.model, "flash");
        let text = req.joined_text();
        assert!(text.contains("01234"));
        assert!(!text.contains("56789"));
    }
}
