//! Output types and JSON persistence.

use crate::error::Iso2BomError;
use crate::model::ExtractionResult;
use crate::pipeline::input::MediaType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything one extraction produced.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// Typed view of the reply, used by the report.
    pub result: ExtractionResult,
    /// The parsed reply exactly as the model returned it. This is what gets
    /// persisted, so keys the typed view does not know about survive.
    pub json: Value,
    /// Unmodified reply text.
    pub raw_response: String,
    pub media_type: MediaType,
    /// File name of the drawing (`P-001.png`).
    pub source_name: String,
    pub stats: ExtractionStats,
}

/// Usage accounting for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    /// The reply hit `max_tokens`.
    pub truncated: bool,
    /// Size of the image file before base64.
    pub image_bytes: usize,
}

/// `<dir>/<input-stem><suffix>`; `dir` defaults to the current directory.
///
/// ```rust
/// use iso2bom::output::output_path_for;
/// use std::path::Path;
///
/// let p = output_path_for(Path::new("/scans/P-001.png"), None, "_extracted.json");
/// assert_eq!(p, Path::new("P-001_extracted.json"));
/// ```
pub fn output_path_for(input: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "drawing".to_string());
    let file_name = format!("{stem}{suffix}");
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Write `value` as 2-space indented JSON, replacing any existing file.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// half-written result behind.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Iso2BomError> {
    let write_err = |source: std::io::Error| Iso2BomError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut body = serde_json::to_string_pretty(value)
        .map_err(|e| write_err(std::io::Error::other(e)))?;
    body.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, body.as_bytes())
        .await
        .map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }

    debug!("Wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}
