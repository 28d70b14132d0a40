//! Error types for the iso2bom library.
//!
//! Every run ends in exactly one of two outcomes: a parsed bill of materials,
//! or a single [`Iso2BomError`]. There is no partial result and no retry, so
//! one flat enum is enough. [`Iso2BomError::category`] groups the variants
//! into the five failure classes the CLI reports on:
//!
//! | Category | Raised when |
//! |----------|-------------|
//! | `Config`    | API key absent, provider cannot be built, invalid settings |
//! | `Input`     | path missing, unreadable, unsupported, download failed |
//! | `Transport` | the vision API call failed or returned nothing usable |
//! | `Parse`     | the reply was not valid JSON after fence stripping |
//! | `Output`    | the JSON result could not be written |

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the iso2bom library.
#[derive(Debug, Error)]
pub enum Iso2BomError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The API key environment variable is unset or empty.
    #[error("{var} not found in environment\nSet it in a .env file or export it:\n  export {var}=your_key_here")]
    MissingApiKey { var: String },

    /// A named edgequake-llm provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// No image path was supplied.
    #[error("No input image given")]
    MissingInput,

    /// Input file was not found at the given path.
    #[error("Image not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Extension is not one of the supported image types (strict mode only).
    #[error("Unsupported image type '{extension}' for '{path}'\nSupported formats: .jpg, .jpeg, .png, .gif, .webp")]
    UnsupportedImageType { path: PathBuf, extension: String },

    /// The input string is not a usable file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists but reading it failed part-way.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The API rejected the credentials (401/403). Retrying will not help.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The API answered with a non-success status.
    #[error("{provider} API error{}: {message}", status_suffix(.status))]
    ApiError {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The request never produced an HTTP response.
    #[error("Request to '{provider}' failed: {message}")]
    Transport { provider: String, message: String },

    /// The API call exceeded `api_timeout_secs`.
    #[error("API call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The API answered but carried no text content.
    #[error("Provider '{provider}' returned no text content")]
    EmptyResponse { provider: String },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// The reply is not valid JSON (or not a JSON object) after fence stripping.
    ///
    /// `raw` holds the unmodified reply so the caller can show it.
    #[error("Error parsing JSON response: {detail}")]
    ParseFailed { detail: String, raw: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the JSON result file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Coarse failure class of an [`Iso2BomError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Input,
    Transport,
    Parse,
    Output,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Config => "configuration",
            ErrorCategory::Input => "input",
            ErrorCategory::Transport => "transport",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Output => "output",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Iso2BomError {
    /// The failure class this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Iso2BomError::MissingApiKey { .. }
            | Iso2BomError::ProviderNotConfigured { .. }
            | Iso2BomError::InvalidConfig(_) => ErrorCategory::Config,

            Iso2BomError::MissingInput
            | Iso2BomError::FileNotFound { .. }
            | Iso2BomError::PermissionDenied { .. }
            | Iso2BomError::UnsupportedImageType { .. }
            | Iso2BomError::InvalidInput { .. }
            | Iso2BomError::DownloadFailed { .. }
            | Iso2BomError::DownloadTimeout { .. }
            | Iso2BomError::ReadFailed { .. } => ErrorCategory::Input,

            Iso2BomError::AuthError { .. }
            | Iso2BomError::ApiError { .. }
            | Iso2BomError::Transport { .. }
            | Iso2BomError::ApiTimeout { .. }
            | Iso2BomError::EmptyResponse { .. } => ErrorCategory::Transport,

            Iso2BomError::ParseFailed { .. } => ErrorCategory::Parse,
            Iso2BomError::OutputWriteFailed { .. } => ErrorCategory::Output,
            Iso2BomError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// The raw model reply, when the error is a parse failure.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Iso2BomError::ParseFailed { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_display_names_variable() {
        let e = Iso2BomError::MissingApiKey {
            var: "ANTHROPIC_API_KEY".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("ANTHROPIC_API_KEY not found"), "got: {msg}");
        assert!(msg.contains("export ANTHROPIC_API_KEY="));
        assert_eq!(e.category(), ErrorCategory::Config);
    }

    #[test]
    fn api_error_display_with_status() {
        let e = Iso2BomError::ApiError {
            provider: "anthropic".into(),
            status: Some(529),
            message: "Overloaded".into(),
        };
        assert_eq!(e.to_string(), "anthropic API error (HTTP 529): Overloaded");
        assert_eq!(e.category(), ErrorCategory::Transport);
    }

    #[test]
    fn api_error_display_without_status() {
        let e = Iso2BomError::ApiError {
            provider: "openai".into(),
            status: None,
            message: "bad request".into(),
        };
        assert_eq!(e.to_string(), "openai API error: bad request");
    }

    #[test]
    fn parse_failure_keeps_raw_text() {
        let e = Iso2BomError::ParseFailed {
            detail: "expected value at line 1 column 6".into(),
            raw: "{\"a\":}".into(),
        };
        assert_eq!(e.raw_response(), Some("{\"a\":}"));
        assert_eq!(e.category(), ErrorCategory::Parse);
        assert!(e.to_string().starts_with("Error parsing JSON response"));
    }

    #[test]
    fn non_parse_errors_have_no_raw_text() {
        let e = Iso2BomError::FileNotFound {
            path: PathBuf::from("missing.png"),
        };
        assert!(e.raw_response().is_none());
        assert_eq!(e.category(), ErrorCategory::Input);
        assert!(e.to_string().contains("missing.png"));
    }

    #[test]
    fn category_display() {
        assert_eq!(ErrorCategory::Transport.to_string(), "transport");
        assert_eq!(ErrorCategory::Config.to_string(), "configuration");
    }
}
