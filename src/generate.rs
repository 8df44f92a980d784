//! Top-level entry points: notes + question bank → answers.
//!
//! Only run-level problems are errors here (unreadable files, no questions,
//! no provider). Once questions exist the run always completes; individual
//! failures are recorded on the affected [`crate::output::AnswerResult`].

use crate::assemble::assemble_markdown;
use crate::client::LlmClient;
use crate::config::AnswerConfig;
use crate::document::SourceFile;
use crate::error::AnswerKitError;
use crate::extract::extract_questions;
use crate::normalize::{normalize_batch, normalize_file, read_source_file};
use crate::output::{AnswerOutput, RunStats};
use crate::pipeline::answer_questions;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Answer the questions in `bank` from the notes files on disk.
///
/// # Errors
/// Returns `Err(AnswerKitError)` only for fatal errors:
/// - no notes, or a file not found / unreadable / unsupported / corrupt
/// - no provider configured
/// - the bank yields no questions
pub async fn generate_answers(
    notes: &[PathBuf],
    bank: impl AsRef<Path>,
    config: &AnswerConfig,
) -> Result<AnswerOutput, AnswerKitError> {
    if notes.is_empty() {
        return Err(AnswerKitError::NoNotes);
    }

    let mut notes_files = Vec::with_capacity(notes.len());
    for path in notes {
        notes_files.push(read_source_file(path).await?);
    }
    let bank_file = read_source_file(bank.as_ref()).await?;

    generate_answers_from_sources(&notes_files, &bank_file, config).await
}

/// Same as [`generate_answers`] for files already in memory.
pub async fn generate_answers_from_sources(
    notes: &[SourceFile],
    bank: &SourceFile,
    config: &AnswerConfig,
) -> Result<AnswerOutput, AnswerKitError> {
    let start = Instant::now();
    if notes.is_empty() {
        return Err(AnswerKitError::NoNotes);
    }
    info!(
        "Starting run: {} notes file(s), question bank '{}'",
        notes.len(),
        bank.name
    );

    // ── Step 1: Resolve backend ──────────────────────────────────────────
    let client = LlmClient::from_config(config)?;

    // ── Step 2: Normalise notes (with images) ────────────────────────────
    let notes_doc = normalize_batch(notes, &config.normalize_options(true)).await?;

    // ── Step 3: Normalise question bank (text only) ──────────────────────
    let bank_doc = normalize_file(bank, &config.normalize_options(false)).await?;
    debug!("Question bank: {} chars", bank_doc.text.len());

    // ── Step 4: Extract questions ────────────────────────────────────────
    let questions = extract_questions(&client, &bank_doc.text, config).await?;

    // ── Step 5: Answer ───────────────────────────────────────────────────
    let results = answer_questions(&client, &notes_doc, &questions, config).await;

    // ── Step 6: Stats ────────────────────────────────────────────────────
    let stats = RunStats::from_results(
        &results,
        notes_doc.images.len(),
        start.elapsed().as_millis() as u64,
    );
    info!(
        "Run complete: {}/{} answered, {} with web search, {} images, {}ms",
        stats.answered,
        stats.total_questions,
        stats.web_searched,
        stats.images_attached,
        stats.duration_ms
    );

    Ok(AnswerOutput { results, stats })
}

/// Run and write the result to `output_path`: JSON when the extension is
/// `.json`, Markdown otherwise.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    notes: &[PathBuf],
    bank: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &AnswerConfig,
) -> Result<RunStats, AnswerKitError> {
    let output = generate_answers(notes, bank, config).await?;
    let path = output_path.as_ref();
    write_output(&output, path).await?;
    Ok(output.stats)
}

/// Serialise `output` to `path` atomically.
pub async fn write_output(output: &AnswerOutput, path: &Path) -> Result<(), AnswerKitError> {
    let write_err = |e: std::io::Error| AnswerKitError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let content = if is_json {
        serde_json::to_string_pretty(output)
            .map_err(|e| AnswerKitError::Internal(format!("JSON serialisation: {e}")))?
    } else {
        assemble_markdown(&output.results)
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, content).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`generate_answers`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_answers_sync(
    notes: &[PathBuf],
    bank: impl AsRef<Path>,
    config: &AnswerConfig,
) -> Result<AnswerOutput, AnswerKitError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnswerKitError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(generate_answers(notes, bank, config))
}
