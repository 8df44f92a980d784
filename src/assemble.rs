//! Markdown rendering of a finished run.
//!
//! Layout per question:
//!
//! ```text
//! ## Question 1 (10 marks)
//!
//! > question text
//!
//! answer body
//!
//! ![Illustration for question 1](data:...)
//!
//! **Sources**
//! - [title](uri)
//! ```
//!
//! Questions are separated by a horizontal rule. Richer exporters (HTML,
//! PDF, DOCX) are left to consumers of the JSON output.

use crate::output::AnswerResult;

pub fn assemble_markdown(results: &[AnswerResult]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(results.len());

    for (i, result) in results.iter().enumerate() {
        parts.push(format_answer(i + 1, result));
    }

    let mut doc = parts.join("\n---\n\n");
    if !doc.is_empty() && !doc.ends_with('\n') {
        doc.push('\n');
    }
    doc
}

fn format_answer(number: usize, result: &AnswerResult) -> String {
    let mut out = match result.marks.as_deref().map(str::trim) {
        Some(m) if !m.is_empty() => format!("## Question {number} ({m})\n\n"),
        _ => format!("## Question {number}\n\n"),
    };

    for line in result.question.trim().lines() {
        out.push_str("> ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');

    out.push_str(result.answer.trim());
    out.push_str("\n\n");

    if let Some(ref url) = result.image_url {
        out.push_str(&format!("![Illustration for question {number}]({url})\n\n"));
    }

    if !result.sources.is_empty() {
        out.push_str("**Sources**\n\n");
        for source in &result.sources {
            let title = if source.title.trim().is_empty() {
                source.uri.as_str()
            } else {
                source.title.trim()
            };
            out.push_str(&format!("- [{}]({})\n", title, source.uri));
        }
        out.push('\n');
    }

    out
}
