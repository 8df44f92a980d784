//! CLI binary for edgequake-notes2answers.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnswerConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_notes2answers::{
    assemble_markdown, generate_answers, write_output, AnswerConfig, AnswerProgressCallback,
    ProgressCallback, RunStats,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while notes are read and questions extracted, then a bar that
/// advances as questions finish (in any order).
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading notes and extracting questions…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} questions  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Answering");
        self.bar.reset_eta();
    }
}

impl AnswerProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Answering {total} questions…"))
        ));
    }

    fn on_question_complete(&self, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
    }

    fn on_question_failed(&self, index: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} Question {:>3}  {}", red("✗"), index + 1, red(&msg)));
    }

    fn on_run_complete(&self, _total: usize, _answered: usize) {
        self.bar.finish_and_clear();
    }
}

/// One-line run summary: counts, degraded questions and where output went.
fn summary_line(stats: &RunStats, target: &str) -> String {
    let mark = if stats.failed == 0 {
        green("✔")
    } else if stats.answered == 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    let degraded = if stats.failed == 0 {
        String::new()
    } else {
        format!("  ({} degraded)", red(&stats.failed.to_string()))
    };
    format!(
        "{mark}  {}/{} answered{degraded}  {}ms{target}",
        bold(&stats.answered.to_string()),
        stats.total_questions,
        stats.duration_ms,
    )
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Answer a past paper from two sets of notes (Markdown to stdout)
  notes2answers --notes lecture1.pdf --notes summary.md --questions paper.docx

  # Write to a file; the extension picks the format (.md or .json)
  notes2answers -n notes.pdf -Q bank.txt -o answers.md
  notes2answers -n notes.pdf -Q bank.txt -o answers.json

  # Faster, cheaper answers
  notes2answers -n notes.md -Q bank.md --answer-model gemini-2.5-flash

  # Extra instructions for every answer
  notes2answers -n notes.md -Q bank.md --instructions style.txt

  # Any edgequake-llm provider (no web search, no image generation)
  notes2answers -n notes.md -Q bank.md --provider openai --answer-model gpt-4.1-mini

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (enables web search and images)
  GOOGLE_API_KEY          Alternative name for the Gemini key
  GEMINI_BASE_URL         Override the Gemini REST endpoint
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider for edgequake-llm auto-detection
  EDGEQUAKE_MODEL         Model for edgequake-llm auto-detection
  PDFIUM_LIB_PATH         pdfium shared library (file or directory), for PDF notes

Press Ctrl-C once to stop after the questions in flight; unstarted questions
are reported as cancelled.
"#;

/// Answer a question bank from your study notes.
#[derive(Parser, Debug)]
#[command(
    name = "notes2answers",
    version,
    about = "Answer a question bank from your study notes using an LLM",
    long_about = "Reads study notes (txt, md, pdf, docx), extracts the questions and mark \
allocations from a question bank, and writes one answer per question grounded in the notes. \
Falls back to web search when the notes do not cover a question (Gemini backend) and can \
attach an illustration taken from the notes or generated.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Notes file (txt, md, pdf, docx). Repeat for several files.
    #[arg(short, long = "notes", required = true, num_args = 1..)]
    notes: Vec<PathBuf>,

    /// Question bank file (txt, md, pdf, docx).
    #[arg(short = 'Q', long = "questions")]
    questions: PathBuf,

    /// Write output to this file instead of stdout (.json → JSON, else Markdown).
    #[arg(short, long, env = "NOTES2ANSWERS_OUTPUT")]
    output: Option<PathBuf>,

    /// Print structured JSON instead of Markdown on stdout.
    #[arg(long, env = "NOTES2ANSWERS_JSON")]
    json: bool,

    /// Provider: gemini, openai, anthropic, ollama, … (auto-detected if unset).
    #[arg(long, env = "NOTES2ANSWERS_PROVIDER")]
    provider: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model for the yes/no relevance probe.
    #[arg(long, env = "NOTES2ANSWERS_PROBE_MODEL")]
    probe_model: Option<String>,

    /// Model that writes the answers.
    #[arg(long, env = "NOTES2ANSWERS_ANSWER_MODEL")]
    answer_model: Option<String>,

    /// Model that extracts questions from the bank.
    #[arg(long, env = "NOTES2ANSWERS_EXTRACTION_MODEL")]
    extraction_model: Option<String>,

    /// Image-generation model.
    #[arg(long, env = "NOTES2ANSWERS_IMAGE_MODEL")]
    image_model: Option<String>,

    /// Questions answered concurrently.
    #[arg(short, long, env = "NOTES2ANSWERS_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Path to a text file with extra instructions for every answer.
    #[arg(long, env = "NOTES2ANSWERS_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Sampling temperature for answers (0.0–2.0).
    #[arg(long, env = "NOTES2ANSWERS_TEMPERATURE")]
    temperature: Option<f32>,

    /// Retries for a rate-limited call.
    #[arg(long, env = "NOTES2ANSWERS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "NOTES2ANSWERS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "NOTES2ANSWERS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTES2ANSWERS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTES2ANSWERS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn AnswerProgressCallback>)
    } else {
        None
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let config = build_config(&cli, progress_cb, Arc::clone(&cancel)).await?;

    // First Ctrl-C: finish in-flight questions, skip the rest.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} cancelling after questions in flight…", cyan("⚠"));
            cancel.store(true, Ordering::SeqCst);
        }
    });

    // ── Run ──────────────────────────────────────────────────────────────
    let output = generate_answers(&cli.notes, &cli.questions, &config)
        .await
        .context("Answer generation failed")?;

    if let Some(ref output_path) = cli.output {
        write_output(&output, output_path)
            .await
            .context("Failed to write output")?;
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let markdown = assemble_markdown(&output.results);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(markdown.as_bytes())
            .context("Failed to write to stdout")?;
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet {
        let stats = &output.stats;
        let target = cli
            .output
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!("{}", summary_line(stats, &target));
        eprintln!(
            "   {} with web search  /  {} images  /  {} images in notes",
            dim(&stats.web_searched.to_string()),
            dim(&stats.images_attached.to_string()),
            dim(&stats.notes_images.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `AnswerConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: Arc<AtomicBool>,
) -> Result<AnswerConfig> {
    let mut builder = AnswerConfig::builder()
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .cancel_flag(cancel);

    if let Some(ref path) = cli.instructions {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {path:?}"))?;
        builder = builder.custom_instructions(text);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref k) = cli.api_key {
        builder = builder.gemini_api_key(k);
    }
    if let Some(ref m) = cli.probe_model {
        builder = builder.probe_model(m);
    }
    if let Some(ref m) = cli.answer_model {
        builder = builder.answer_model(m);
    }
    if let Some(ref m) = cli.extraction_model {
        builder = builder.extraction_model(m);
    }
    if let Some(ref m) = cli.image_model {
        builder = builder.image_model(m);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
