//! # iso2bom
//!
//! Extract a piping bill of materials from an isometric drawing image using
//! a Vision Language Model (VLM).
//!
//! ## Why this crate?
//!
//! Isometric piping drawings carry their BOM as annotations scattered over
//! the sheet: line numbers along pipe runs, valve tags next to symbols, a
//! title block in the corner. OCR returns the words without the structure.
//! This crate sends the whole image to a vision model with a fixed prompt and
//! schema, and gets back pipes, fittings, valves and flanges as JSON with a
//! per-item confidence.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (path or URL)
//!  │
//!  ├─ 1. Input      resolve file, pick media type from the extension
//!  ├─ 2. Encode     bytes → base64
//!  ├─ 3. VLM        one call to Claude (or any edgequake-llm provider)
//!  ├─ 4. Normalise  strip markdown fences, parse JSON
//!  └─ 5. Output     typed result + fixed-width report + saved JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iso2bom::{extract, render_report, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads ANTHROPIC_API_KEY (and ANTHROPIC_BASE_URL if set).
//!     let config = ExtractionConfig::from_env()?;
//!     let output = extract("P-001.png", &config).await?;
//!     print!("{}", render_report(&output.result));
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.input_tokens,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `iso2bom` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! iso2bom = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{AnthropicClient, ProviderClient, VisionClient, VisionReply, VisionRequest};
pub use config::{Backend, ExtractionConfig, ExtractionConfigBuilder, FenceMode};
pub use error::{ErrorCategory, Iso2BomError};
pub use extract::{extract, extract_sync, extract_to_file, extract_with_client, save_output};
pub use model::{
    BomItem, ConfidenceBand, DrawingInfo, ExtractionResult, FittingSpec, FlangeSpec, PipeSpec,
    ValveSpec,
};
pub use output::{ExtractionOutput, ExtractionStats};
pub use pipeline::input::MediaType;
pub use pipeline::report::render_report;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
