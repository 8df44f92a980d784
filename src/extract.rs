//! Question-bank segmentation.
//!
//! One structured-output call turns the bank text into a list of
//! [`Question`]s. The reply is parsed leniently: code fences are stripped,
//! a `{"questions": [...]}` wrapper is accepted, and `marks` may arrive as a
//! string or a number.

use crate::backend::{GenerateRequest, PromptPart};
use crate::client::LlmClient;
use crate::config::AnswerConfig;
use crate::error::AnswerKitError;
use crate::prompts::{extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// One question from the bank, with its mark allocation if shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, marks: Option<&str>) -> Self {
        Self {
            text: text.into(),
            marks: marks.map(str::to_string),
        }
    }
}

/// Response schema for the extraction call.
pub fn question_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING" },
                "marks": { "type": "STRING" }
            },
            "required": ["question"]
        }
    })
}

/// Extract the questions of a bank.
///
/// # Errors
/// [`AnswerKitError::Extraction`] when the bank is empty, the call fails, or
/// the reply holds no usable question.
pub async fn extract_questions(
    client: &LlmClient,
    bank_text: &str,
    config: &AnswerConfig,
) -> Result<Vec<Question>, AnswerKitError> {
    if bank_text.trim().is_empty() {
        return Err(AnswerKitError::Extraction(
            "the question bank contains no text".into(),
        ));
    }

    let request = GenerateRequest::new(
        config.extraction_model.clone(),
        vec![PromptPart::text(extraction_prompt(bank_text))],
    )
    .with_system_instruction(EXTRACTION_SYSTEM_PROMPT)
    .with_response_schema(question_schema())
    .with_temperature(Some(0.0));

    let raw = client
        .generate_text("question extraction", &request)
        .await
        .map_err(|e| AnswerKitError::Extraction(e.to_string()))?;

    let questions = parse_questions(&raw)?;
    info!("Extracted {} questions", questions.len());
    Ok(questions)
}

static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Parse an extraction reply into questions.
pub fn parse_questions(raw: &str) -> Result<Vec<Question>, AnswerKitError> {
    let trimmed = raw.trim();
    let body = RE_FENCED_JSON
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    let value: Value = serde_json::from_str(body)
        .or_else(|_| {
            // Tolerate prose around the array.
            match (body.find('['), body.rfind(']')) {
                (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end]),
                _ => serde_json::from_str::<Value>(body),
            }
        })
        .map_err(|e| AnswerKitError::Extraction(format!("reply is not valid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AnswerKitError::Extraction(
                    "reply is a JSON object without a 'questions' array".into(),
                ))
            }
        },
        _ => {
            return Err(AnswerKitError::Extraction(
                "reply is not a JSON array".into(),
            ))
        }
    };

    let questions: Vec<Question> = items.iter().filter_map(question_from_value).collect();
    debug!("Parsed {} of {} extracted items", questions.len(), items.len());

    if questions.is_empty() {
        return Err(AnswerKitError::Extraction(
            "no questions found in the question bank".into(),
        ));
    }
    Ok(questions)
}

fn question_from_value(item: &Value) -> Option<Question> {
    let (text, marks) = match item {
        Value::String(s) => (s.as_str(), None),
        Value::Object(obj) => {
            let text = obj
                .get("question")
                .or_else(|| obj.get("text"))
                .and_then(Value::as_str)?;
            let marks = match obj.get("marks") {
                Some(Value::String(s)) => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            (text, marks.filter(|m| !m.is_empty()))
        }
        _ => return None,
    };

    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(Question {
        text: text.to_string(),
        marks,
    })
}
