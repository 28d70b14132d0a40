//! Configuration types for drawing extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The API key lives here as an explicit
//! field: the library never reads credentials from the process environment
//! on its own (only [`ExtractionConfig::from_env`] does, when asked to), so
//! tests can hand in fake keys or a fake client without touching global state.

use crate::client::VisionClient;
use crate::error::Iso2BomError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Environment variable overriding the Anthropic API base URL.
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Anthropic API base URL (the `/messages` path is appended).
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Default suffix appended to the input stem for the JSON result file.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_extracted.json";

/// Configuration for one drawing extraction.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::from_env()`].
///
/// # Example
/// ```rust
/// use iso2bom::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_key("sk-ant-test")
///     .max_tokens(2048)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 2048);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Which backend serves the vision request. Default: [`Backend::Anthropic`].
    pub backend: Backend,

    /// API key for the Anthropic backend. Never printed by `Debug`.
    pub api_key: Option<String>,

    /// Model identifier. Default: `claude-sonnet-4-20250514`.
    pub model: String,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// A dense drawing with dozens of fittings can run past 2 000 output
    /// tokens. When the ceiling is hit the reply is cut mid-JSON and parsing
    /// fails downstream.
    pub max_tokens: usize,

    /// Sampling temperature. Default: None (provider default).
    pub temperature: Option<f32>,

    /// Anthropic API base URL. Default: `https://api.anthropic.com/v1`.
    pub base_url: String,

    /// Per-call timeout in seconds. Default: None (transport default).
    pub api_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Prompt override. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// How the JSON payload is located inside the reply. Default: [`FenceMode::Markers`].
    pub fence_mode: FenceMode,

    /// Reject unknown image extensions instead of sending them as JPEG. Default: false.
    pub strict_extensions: bool,

    /// Directory for the JSON result file. Default: None (current directory).
    pub output_dir: Option<PathBuf>,

    /// Suffix appended to the input stem. Default: `_extracted.json`.
    pub output_suffix: String,

    /// Pre-constructed client. Takes precedence over `backend`.
    pub client: Option<Arc<dyn VisionClient>>,

    /// Optional status callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_timeout_secs: None,
            download_timeout_secs: 120,
            prompt: None,
            fence_mode: FenceMode::default(),
            strict_extensions: false,
            output_dir: None,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            client: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("backend", &self.backend)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("fence_mode", &self.fence_mode)
            .field("strict_extensions", &self.strict_extensions)
            .field("output_dir", &self.output_dir)
            .field("output_suffix", &self.output_suffix)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config for the default backend from `ANTHROPIC_API_KEY` and
    /// `ANTHROPIC_BASE_URL`.
    ///
    /// # Errors
    /// [`Iso2BomError::MissingApiKey`] when the key is unset or empty.
    pub fn from_env() -> Result<Self, Iso2BomError> {
        let mut builder = Self::builder();
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            builder = builder.api_key(key);
        }
        if let Some(url) = non_empty_env(BASE_URL_ENV) {
            builder = builder.base_url(url);
        }
        builder.build()
    }

    /// The prompt sent with the image.
    pub fn prompt_text(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or(crate::prompts::EXTRACTION_PROMPT)
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn fence_mode(mut self, mode: FenceMode) -> Self {
        self.config.fence_mode = mode;
        self
    }

    pub fn strict_extensions(mut self, v: bool) -> Self {
        self.config.strict_extensions = v;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    pub fn client(mut self, client: Arc<dyn VisionClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The API key check happens here, before any file or network access.
    pub fn build(self) -> Result<ExtractionConfig, Iso2BomError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Iso2BomError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(t) = c.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Iso2BomError::InvalidConfig(format!(
                    "temperature must be between 0.0 and 2.0, got {t}"
                )));
            }
        }
        if c.model.trim().is_empty() {
            return Err(Iso2BomError::InvalidConfig("model must not be empty".into()));
        }
        if c.output_suffix.is_empty() {
            return Err(Iso2BomError::InvalidConfig(
                "output suffix must not be empty".into(),
            ));
        }
        if c.output_suffix.contains(['/', '\\']) {
            return Err(Iso2BomError::InvalidConfig(format!(
                "output suffix must not contain path separators, got '{}'",
                c.output_suffix
            )));
        }
        let has_key = c.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if c.client.is_none() && c.backend == Backend::Anthropic && !has_key {
            return Err(Iso2BomError::MissingApiKey {
                var: API_KEY_ENV.to_string(),
            });
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The service that answers the vision request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Anthropic Messages API, authenticated with [`ExtractionConfig::api_key`]. (default)
    #[default]
    Anthropic,
    /// Any edgequake-llm provider by name (`openai`, `gemini`, `ollama`, …).
    /// The provider reads its own credentials.
    Provider(String),
}

impl Backend {
    /// Map a CLI/provider name to a backend. `anthropic` and `claude` select
    /// the built-in client; everything else goes through edgequake-llm.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "" | "anthropic" | "claude" => Backend::Anthropic,
            other => Backend::Provider(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Backend::Anthropic => "anthropic",
            Backend::Provider(name) => name,
        }
    }
}

/// How the JSON payload is cut out of the model's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FenceMode {
    /// First "```json" (or "```") marker to the last "```" marker. (default)
    #[default]
    Markers,
    /// First balanced top-level `{…}` object, string-aware.
    JsonSpan,
}
