//! # edgequake-notes2answers
//!
//! Answer a question bank from your own study notes with an LLM.
//!
//! ## Why this crate?
//!
//! Generic chatbots answer from whatever they happen to know. Exam answers
//! should come from the course material. This crate reads the notes
//! (text, Markdown, PDF including scanned pages, Word), pulls the questions
//! and their mark allocations out of a question bank, and writes one answer
//! per question that stays with the notes. It only reaches for web search
//! when a quick check says the notes fall short. Answers can carry an
//! illustration, either reused from the notes or generated.
//!
//! ## Pipeline Overview
//!
//! ```text
//! notes + question bank
//!  │
//!  ├─ 1. Normalise  text / markdown / docx / pdf → text + images
//!  ├─ 2. Extract    question bank → questions with marks (structured output)
//!  ├─ 3. Probe      per question: do the notes cover it? (yes / no)
//!  ├─ 4. Answer     notes-only or web-grounded synthesis, with citations
//!  ├─ 5. Image      reuse [Image N] from the notes or generate one
//!  └─ 6. Output     results in question order + run stats
//! ```
//!
//! Steps 3–5 run per question on a bounded worker pool; a failing question
//! gets a fallback answer and never affects the others.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_notes2answers::{generate_answers, AnswerConfig};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend auto-detected: GEMINI_API_KEY first, then OPENAI_API_KEY, …
//!     let config = AnswerConfig::default();
//!     let notes = vec![PathBuf::from("lecture1.pdf"), PathBuf::from("summary.md")];
//!     let output = generate_answers(&notes, "past_paper.docx", &config).await?;
//!     for r in &output.results {
//!         println!("## {}\n\n{}\n", r.question, r.answer);
//!     }
//!     eprintln!("{}/{} answered", output.stats.answered, output.stats.total_questions);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notes2answers` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-notes2answers = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Web search | Image generation |
//! |---------|-----------|------------------|
//! | Gemini (`GEMINI_API_KEY`) | yes, with citations | yes (Imagen) |
//! | any `edgequake-llm` provider | no (answers from notes) | no |
//!
//! PDF notes need the pdfium shared library, found through
//! `PDFIUM_LIB_PATH` or the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod backend;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod generate;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::assemble_markdown;
pub use backend::LlmBackend;
pub use client::LlmClient;
pub use config::{AnswerConfig, AnswerConfigBuilder};
pub use document::{ImagePart, NormalizedDocument, SourceFile};
pub use error::{AnswerKitError, LlmCallError, QuestionError};
pub use extract::{extract_questions, Question};
pub use generate::{
    generate_answers, generate_answers_from_sources, generate_answers_sync, generate_to_file,
    write_output,
};
pub use normalize::{normalize_batch, normalize_file, normalize_paths, NormalizeOptions};
pub use output::{AnswerOutput, AnswerResult, RunStats, Source};
pub use pipeline::answer_questions;
pub use progress::{AnswerProgressCallback, FnProgress, NoopProgressCallback, ProgressCallback};
pub use retry::RetryPolicy;
