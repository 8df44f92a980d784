//! Stage 2: write the answer.
//!
//! The prompt is multimodal: the notes text, then each notes image preceded
//! by its `[Image N]` label, then the per-question instructions. With web
//! search the call is grounded and its citations become the answer's
//! sources; otherwise the model is told to stay within the notes.

use super::directive::{parse_reply, ImageDirective};
use super::postprocess::clean_answer;
use crate::backend::{GenerateRequest, PromptPart};
use crate::client::LlmClient;
use crate::config::AnswerConfig;
use crate::document::NormalizedDocument;
use crate::error::LlmCallError;
use crate::extract::Question;
use crate::output::Source;
use crate::prompts::{image_label, synthesis_instructions, SYNTHESIS_SYSTEM_PROMPT};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// Cleaned Markdown answer, directive lines removed.
    pub body: String,
    pub directive: Option<ImageDirective>,
    pub sources: Vec<Source>,
}

pub fn build_synthesis_request(
    question: &Question,
    notes: &NormalizedDocument,
    web_search: bool,
    config: &AnswerConfig,
) -> GenerateRequest {
    let mut parts = Vec::with_capacity(2 + notes.images.len() * 2);
    parts.push(PromptPart::text(format!(
        "NOTES:\n\"\"\"\n{}\n\"\"\"",
        notes.text
    )));
    for (i, image) in notes.images.iter().enumerate() {
        parts.push(PromptPart::text(image_label(i + 1)));
        parts.push(PromptPart::Image(image.clone()));
    }
    parts.push(PromptPart::text(synthesis_instructions(
        &question.text,
        question.marks.as_deref(),
        web_search,
        config.custom_instructions.as_deref(),
    )));

    GenerateRequest::new(config.answer_model.clone(), parts)
        .with_system_instruction(SYNTHESIS_SYSTEM_PROMPT)
        .with_temperature(config.temperature)
}

pub async fn synthesize_answer(
    client: &LlmClient,
    question: &Question,
    notes: &NormalizedDocument,
    web_search: bool,
    config: &AnswerConfig,
    label: &str,
) -> Result<Synthesis, LlmCallError> {
    let request = build_synthesis_request(question, notes, web_search, config);

    let (raw, sources) = if web_search {
        let grounded = client.generate_grounded(label, &request).await?;
        (grounded.text, grounded.sources)
    } else {
        (client.generate_text(label, &request).await?, Vec::new())
    };

    let parsed = parse_reply(&raw);
    let body = clean_answer(&parsed.body);
    if body.is_empty() {
        return Err(LlmCallError::MalformedResponse(
            "answer is empty once directives are removed".into(),
        ));
    }

    debug!(
        "{label}: {} chars, directive {:?}, {} sources",
        body.len(),
        parsed.directive,
        sources.len()
    );

    Ok(Synthesis {
        body,
        directive: parsed.directive,
        sources,
    })
}
