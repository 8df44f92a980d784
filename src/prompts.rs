//! Prompts for question extraction, the relevance probe and answer synthesis.
//!
//! Every prompt lives here so wording can change without touching the
//! pipeline, and so tests can inspect the exact text that reaches a model.
//! The directive keywords in [`SYNTHESIS_SYSTEM_PROMPT`] must stay in sync
//! with [`crate::pipeline::directive`].

/// System prompt for segmenting a question bank.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract exam questions from a question bank.

Rules:
1. Return every distinct question, in the order it appears.
2. Copy each question VERBATIM. Do not paraphrase, merge, split or invent questions.
3. Keep sub-parts that belong to one question together with it.
4. If a mark allocation is shown (e.g. "(10 marks)", "[5]", "5 pts"), put it in "marks"
   exactly as written and remove it from the question text. Otherwise omit "marks".
5. Ignore headings, instructions to candidates and page furniture."#;

/// User prompt for question extraction.
pub fn extraction_prompt(bank_text: &str) -> String {
    format!("Extract the questions from this question bank:\n\n\"\"\"\n{bank_text}\n\"\"\"")
}

/// System prompt for the yes/no relevance probe.
pub const PROBE_SYSTEM_PROMPT: &str = "You decide whether study notes contain enough \
information to answer a question. Reply with a single word: yes or no.";

/// User prompt for the relevance probe; `notes_excerpt` is already truncated.
pub fn probe_prompt(question: &str, notes_excerpt: &str) -> String {
    format!(
        "NOTES:\n\"\"\"\n{notes_excerpt}\n\"\"\"\n\nQUESTION: {question}\n\n\
         Do the notes contain enough information to answer this question fully? Answer yes or no."
    )
}

/// System prompt for answer synthesis.
pub const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are an expert tutor writing model exam answers from a student's study notes.

Rules:
1. Base the answer on the notes. Be accurate, clear and well structured.
2. Format the answer in Markdown. Use headings, lists and tables where they help.
3. Do not wrap the answer in code fences and do not restate the question.
4. Images from the notes are labelled [Image 1], [Image 2], ... in the order given.

Illustration (optional, at most one, on its own line at the very end):
- If one of the notes images illustrates the answer well, write:
  USE_IMAGE: [Image N]
- Otherwise, if a diagram would genuinely help, write:
  GENERATE_IMAGE_PROMPT: <one-sentence description of the diagram>
- If no illustration helps, write neither line."#;

/// Label of the `number`-th (1-based) notes image.
pub fn image_label(number: usize) -> String {
    format!("[Image {number}]")
}

/// Length and depth guidance derived from the mark allocation.
pub fn marks_guidance(marks: Option<&str>) -> String {
    match marks.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => format!(
            "This question is worth {m}. Match the length and depth of the answer to the marks: \
             make roughly one well-supported point per mark."
        ),
        None => "No mark allocation is given. Write a concise but complete answer.".to_string(),
    }
}

/// Instruction block appended after the notes, before the question.
pub fn synthesis_instructions(
    question: &str,
    marks: Option<&str>,
    web_search: bool,
    custom_instructions: Option<&str>,
) -> String {
    let mut out = String::new();
    if web_search {
        out.push_str(
            "The notes may not cover this question fully. Use web search to fill the gaps, \
             preferring the notes wherever they apply.\n\n",
        );
    } else {
        out.push_str("Answer using ONLY the notes above. Do not add outside facts.\n\n");
    }
    out.push_str(&marks_guidance(marks));
    out.push_str("\n\n");
    if let Some(extra) = custom_instructions {
        out.push_str("Additional instructions from the student:\n");
        out.push_str(extra.trim());
        out.push_str("\n\n");
    }
    out.push_str("QUESTION: ");
    out.push_str(question);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_prompt_names_both_directives() {
        assert!(SYNTHESIS_SYSTEM_PROMPT.contains("USE_IMAGE: [Image N]"));
        assert!(SYNTHESIS_SYSTEM_PROMPT.contains("GENERATE_IMAGE_PROMPT:"));
    }

    #[test]
    fn marks_guidance_mentions_marks() {
        assert!(marks_guidance(Some("10 marks")).contains("10 marks"));
        assert!(marks_guidance(Some("  ")).contains("No mark allocation"));
        assert!(marks_guidance(None).contains("No mark allocation"));
    }

    #[test]
    fn notes_only_instructions_forbid_outside_facts() {
        let text = synthesis_instructions("Define osmosis.", None, false, None);
        assert!(text.contains("ONLY the notes"));
        assert!(text.ends_with("QUESTION: Define osmosis."));
    }

    #[test]
    fn web_instructions_include_custom_text() {
        let text = synthesis_instructions("Q", Some("5"), true, Some("Use British spelling."));
        assert!(text.contains("web search"));
        assert!(text.contains("Use British spelling."));
    }

    #[test]
    fn image_labels_are_one_based() {
        assert_eq!(image_label(1), "[Image 1]");
    }
}
