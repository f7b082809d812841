//! CLI binary for veridoc.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, wires a terminal progress bar into the pipeline
//! callback, and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use veridoc::{
    analyze, AnalysisConfig, AnalysisProgressCallback, OpenAiVisionProvider, PipelineStatus,
    RunOutcome, VisionProvider,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar for the extraction fan-out, stage names as
/// the prefix. Designed to cope with documents completing out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage_change(&self, status: PipelineStatus) {
        self.bar.set_prefix(status.label().to_string());
    }

    fn on_extraction_start(&self, total_documents: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(progress_style);
        self.bar.reset_eta();
    }

    fn on_document_complete(&self, name: &str, quality_tier: &str) {
        self.bar.println(format!(
            "  {} {:<40} {}",
            green("✓"),
            name,
            dim(quality_tier)
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<40} {}", red("✗"), name, red(&msg)));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse an application folder (text report on stdout)
  veridoc applications/req-42

  # Structured JSON output
  veridoc --json applications/req-42 > report.json

  # Save analysis_report.txt / analysis_report.json into the folder
  veridoc --save applications/req-42

  # Against a local OpenAI-compatible gateway
  veridoc --base-url http://localhost:4000/v1 --model llava applications/req-42

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY    API key for the vision capability
  PDFIUM_LIB_PATH   Path to an existing libpdfium — skips system lookup

EXIT CODES:
  0  analysed (clean, empty, or with warnings — see the report)
  1  fatal error (missing folder, no API key, report write failure)
"#;

/// Cross-validate the scanned documents of one application folder.
#[derive(Parser, Debug)]
#[command(
    name = "veridoc",
    version,
    about = "Cross-validate scanned identity and financial documents using Vision LLMs",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Case folder containing the PDF scans of one applicant.
    folder: PathBuf,

    /// Vision model ID (e.g. gpt-4o).
    #[arg(long, env = "VERIDOC_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible endpoint base URL.
    #[arg(long, env = "VERIDOC_BASE_URL")]
    base_url: Option<String>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "VERIDOC_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Number of concurrent capability calls.
    #[arg(short, long, env = "VERIDOC_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-document capability call timeout in seconds.
    #[arg(long, env = "VERIDOC_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Per-PDF rasterisation timeout in seconds.
    #[arg(long, env = "VERIDOC_RENDER_TIMEOUT", default_value_t = 120)]
    render_timeout: u64,

    /// Output structured JSON (CaseReport) instead of the text report.
    #[arg(long, env = "VERIDOC_JSON")]
    json: bool,

    /// Write analysis_report.txt / analysis_report.json into the folder.
    #[arg(long)]
    save: bool,

    /// Disable the progress bar.
    #[arg(long, env = "VERIDOC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VERIDOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the report itself.
    #[arg(short, long, env = "VERIDOC_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Provider ─────────────────────────────────────────────────────────
    let mut provider = OpenAiVisionProvider::from_env()
        .context("No vision capability configured (set OPENAI_API_KEY)")?;
    if let Some(ref url) = cli.base_url {
        provider = provider.with_base_url(url);
    }
    if let Some(ref model) = cli.model {
        provider = provider.with_model(model);
    }
    let provider: Arc<dyn VisionProvider> = Arc::new(provider);

    // ── Config ───────────────────────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };

    let mut builder = AnalysisConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout)
        .render_timeout_secs(cli.render_timeout);
    if let Some(ref cb) = progress {
        builder = builder.progress_callback(Arc::clone(cb) as Arc<dyn AnalysisProgressCallback>);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let state = analyze(&cli.folder, provider, &config)
        .await
        .context("Analysis failed")?;

    if let Some(ref cb) = progress {
        cb.finish();
    }

    let report = state
        .report
        .as_ref()
        .context("pipeline finished without a report")?;

    if cli.save {
        report
            .save(&cli.folder)
            .await
            .context("Failed to save report files")?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(report.render_text().as_bytes())
            .context("Failed to write to stdout")?;
    }

    // ── Summary line ─────────────────────────────────────────────────────
    if !cli.quiet && !cli.json {
        let concordance = &report.concordance;
        match state.outcome() {
            RunOutcome::Empty => {
                eprintln!("{} nothing to process in {}", cyan("⚠"), cli.folder.display());
            }
            RunOutcome::Clean => {
                eprintln!(
                    "{} {} document(s) concordant  {}",
                    green("✔"),
                    bold(&state.counters.documents_analyzed.to_string()),
                    dim(&format!(
                        "score {:.0}/100, {}ms",
                        concordance.confidence_score, state.duration_ms
                    )),
                );
            }
            RunOutcome::WithWarnings => {
                eprintln!(
                    "{} {} document(s) analysed, {} problem(s), {} error(s)  {}",
                    if concordance.is_concordant {
                        cyan("⚠")
                    } else {
                        red("✘")
                    },
                    bold(&state.counters.documents_analyzed.to_string()),
                    concordance.discrepancies.len(),
                    state.errors.len(),
                    dim(&format!(
                        "score {:.0}/100, {}ms",
                        concordance.confidence_score, state.duration_ms
                    )),
                );
            }
        }
    }

    Ok(())
}
