//! Image directives in synthesis replies.
//!
//! A reply may carry one directive line, anywhere in the text:
//!
//! ```text
//! USE_IMAGE: [Image 2]
//! GENERATE_IMAGE_PROMPT: a labelled diagram of a plant cell
//! ```
//!
//! Directive lines are removed from the body whether or not they are usable;
//! placeholders such as `none` count as unusable. When several appear, the
//! first usable one wins. Markdown emphasis around the keyword
//! (`**USE_IMAGE**:`) is tolerated.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageDirective {
    /// Reuse the notes image with this 1-based number.
    UseExisting(usize),
    /// Generate an image from this prompt.
    Generate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Reply text with directive lines removed, trimmed.
    pub body: String,
    pub directive: Option<ImageDirective>,
}

static RE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*[*_`]*(USE_IMAGE|GENERATE_IMAGE_PROMPT)[*_`]*\s*:\s*(.*?)\s*$").unwrap()
});

static RE_IMAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[*_`\s]*\[?\s*(?:Image\s*#?\s*)?(\d+)").unwrap()
});

/// Placeholder arguments models write when they have nothing to offer.
const EMPTY_ARGUMENTS: &[&str] = &["", "none", "n/a", "na", "null", "no image", "-"];

fn is_empty_argument(arg: &str) -> bool {
    let arg = arg.trim_end_matches('.').trim();
    EMPTY_ARGUMENTS.iter().any(|e| arg.eq_ignore_ascii_case(e))
}

/// Recognise a directive on one line. `Some(None)` means the line is a
/// directive line but carries nothing usable.
fn match_line(line: &str) -> Option<Option<ImageDirective>> {
    let caps = RE_DIRECTIVE.captures(line)?;
    let arg = caps[2].trim_matches(|c| c == '"' || c == '\'' || c == '*' || c == '_' || c == '`');
    let arg = arg.trim();
    if is_empty_argument(arg) {
        return Some(None);
    }

    if caps[1].eq_ignore_ascii_case("USE_IMAGE") {
        let number = RE_IMAGE_NUMBER
            .captures(arg)
            .and_then(|n| n[1].parse().ok())
            .map(ImageDirective::UseExisting);
        Some(number)
    } else {
        Some(Some(ImageDirective::Generate(arg.to_string())))
    }
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let mut directive = None;
    let mut kept = Vec::new();

    for line in raw.lines() {
        match match_line(line) {
            Some(found) => {
                if directive.is_none() {
                    directive = found;
                }
            }
            None => kept.push(line),
        }
    }

    ParsedReply {
        body: kept.join("\n").trim().to_string(),
        directive,
    }
}
