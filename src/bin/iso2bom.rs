//! CLI binary for iso2bom.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use iso2bom::{
    extract, render_report, save_output, Backend, ExtractionConfig, ExtractionProgressCallback,
    FenceMode, Iso2BomError, ProgressCallback, VisionReply,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback ────────────────────────────────────────────────────

/// Prints the status lines and spins an [indicatif] spinner on stderr while
/// the vision request is in flight.
struct CliProgressCallback {
    /// Where status lines go: stdout normally, stderr when stdout carries JSON.
    to_stderr: bool,
    spinner_enabled: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new(to_stderr: bool, spinner_enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            to_stderr,
            spinner_enabled,
            spinner: Mutex::new(None),
        })
    }

    fn status(&self, line: &str) {
        if self.to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, name: &str) {
        self.status(&format!("\n🔍 Analyzing drawing: {name}"));
    }

    fn on_request_start(&self, backend: &str, model: &str) {
        self.status(&format!("⏳ Calling {backend} vision API ({model})..."));
        if !self.spinner_enabled {
            return;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_message("Waiting for the model…");
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut guard) = self.spinner.lock() {
            *guard = Some(bar);
        }
    }

    fn on_reply(&self, reply: &VisionReply) {
        self.stop_spinner();
        if reply.truncated {
            eprintln!(
                "⚠️  Reply stopped at the max-tokens limit ({} tokens); the JSON is probably incomplete. Try --max-tokens.",
                reply.output_tokens
            );
        }
    }

    fn on_extraction_complete(&self, _item_count: usize) {
        self.status("✅ Extraction complete!\n");
    }

    fn on_extraction_error(&self, _error: &str) {
        self.stop_spinner();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract and print the BOM report, saving P-001_extracted.json
  iso2bom sample_drawings/P-001.jpg

  # Print the parsed JSON instead of the report
  iso2bom --json P-001.png > bom.json

  # Write results to another directory
  iso2bom --output-dir results/ P-001.png

  # Use another vision provider through edgequake-llm
  iso2bom --provider openai --model gpt-4.1 P-001.png

  # Tolerate stray ``` inside the reply
  iso2bom --json-span P-001.png

SUPPORTED FORMATS:
  .jpg, .jpeg, .png, .gif, .webp (anything else is sent as image/jpeg
  unless --strict-ext is given)

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY   Anthropic API key (required for the default backend)
  ANTHROPIC_BASE_URL  Override the Anthropic API base URL
  ISO2BOM_MODEL       Override model ID
  ISO2BOM_PROVIDER    Use an edgequake-llm provider instead (openai, gemini, ollama, …)
  OPENAI_API_KEY      OpenAI API key (with --provider openai)
  GEMINI_API_KEY      Google Gemini API key (with --provider gemini)
  RUST_LOG            Override the log filter

  A .env file in the current directory is loaded first; variables already
  set in the environment win.
"#;

/// Extract a piping bill of materials from an isometric drawing.
#[derive(Parser, Debug)]
#[command(
    name = "iso2bom",
    version,
    about = "Extract a piping bill of materials from isometric drawings using Vision LLMs",
    long_about = "Send an isometric piping drawing (local file or URL) to a vision model and \
extract pipes, fittings, valves and flanges as structured JSON with per-item confidence. \
Prints a fixed-width report and saves <name>_extracted.json.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Drawing image path or HTTP/HTTPS URL.
    input: Option<String>,

    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true, hide = true)]
    api_key: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "ISO2BOM_MODEL", default_value = iso2bom::config::DEFAULT_MODEL)]
    model: String,

    /// Backend: anthropic (default), or any edgequake-llm provider (openai, gemini, ollama, …).
    #[arg(long, env = "ISO2BOM_PROVIDER", default_value = "anthropic")]
    provider: String,

    /// Max output tokens for the reply.
    #[arg(long, env = "ISO2BOM_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Sampling temperature, 0.0 to 2.0 (provider default when unset).
    #[arg(long, env = "ISO2BOM_TEMPERATURE")]
    temperature: Option<f32>,

    /// Anthropic API base URL.
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = iso2bom::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Vision API call timeout in seconds (transport default when unset).
    #[arg(long, env = "ISO2BOM_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "ISO2BOM_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Directory for the JSON result (default: current directory).
    #[arg(long, env = "ISO2BOM_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Suffix appended to the drawing's file stem.
    #[arg(long, env = "ISO2BOM_SUFFIX", default_value = iso2bom::config::DEFAULT_OUTPUT_SUFFIX)]
    suffix: String,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "ISO2BOM_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Reject image extensions other than jpg/jpeg/png/gif/webp.
    #[arg(long, env = "ISO2BOM_STRICT_EXT")]
    strict_ext: bool,

    /// Locate the JSON by its first balanced {…} object instead of fence markers.
    #[arg(long, env = "ISO2BOM_JSON_SPAN")]
    json_span: bool,

    /// Print the parsed JSON instead of the report.
    #[arg(long, env = "ISO2BOM_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "ISO2BOM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ISO2BOM_VERBOSE")]
    verbose: bool,

    /// Suppress status lines; print only the result and errors.
    #[arg(short, long, env = "ISO2BOM_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` first so clap's `env = …` fallbacks can see it.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Status lines print unless --quiet and already say what INFO would;
    // library logs stay at ERROR unless --verbose.
    let filter = if cli.verbose { "debug" } else { "error" };
    let quiet = cli.quiet;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let extraction = e.downcast_ref::<ExtractionFailed>();
            let lib_error = extraction
                .map(|failed| &failed.0)
                .or_else(|| e.downcast_ref::<Iso2BomError>());

            eprintln!("{} {e:#}", red("❌ Error:"));
            if let Some(raw) = lib_error.and_then(Iso2BomError::raw_response) {
                eprintln!("Raw response:\n{raw}");
            }
            if extraction.is_some() && !quiet {
                eprintln!("❌ Extraction failed");
            }
            ExitCode::FAILURE
        }
    }
}

/// An error raised by the extraction call itself, as opposed to setup.
#[derive(Debug)]
struct ExtractionFailed(Iso2BomError);

impl std::fmt::Display for ExtractionFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ExtractionFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.0)
    }
}

async fn run(cli: Cli) -> Result<()> {
    // ── Build config ─────────────────────────────────────────────────────
    // The key check happens here, before the image is touched.
    let progress_cb: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        let cb = CliProgressCallback::new(cli.json, !cli.no_progress);
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    };
    let mut config = build_config(&cli, progress_cb)?;

    let Some(input) = cli.input.as_deref() else {
        let mut cmd = Cli::command();
        eprintln!("{}", cmd.render_usage());
        eprintln!("\nSupported formats: .jpg, .jpeg, .png, .gif, .webp");
        eprintln!("\nExample:\n  iso2bom sample_drawings/P-001.jpg");
        anyhow::bail!(Iso2BomError::MissingInput);
    };

    if let Some(ref path) = cli.prompt_file {
        config.prompt = Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        );
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(input, &config).await.map_err(ExtractionFailed)?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&output.json).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print!("{}", render_report(&output.result));
    }

    let path = save_output(&output, &config).await?;
    if !cli.quiet {
        let line = format!("\n💾 Results saved to: {}", path.display());
        if cli.json {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
            output.stats.duration_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .backend(Backend::from_name(&cli.provider))
        .model(cli.model.clone())
        .max_tokens(cli.max_tokens)
        .base_url(cli.base_url.clone())
        .download_timeout_secs(cli.download_timeout)
        .output_suffix(cli.suffix.clone())
        .strict_extensions(cli.strict_ext)
        .fence_mode(if cli.json_span {
            FenceMode::JsonSpan
        } else {
            FenceMode::Markers
        });

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    Ok(builder.build()?)
}
