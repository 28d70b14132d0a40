//! Input resolution: turn the user-supplied path or URL into a local image
//! file plus the media type label sent to the vision API.
//!
//! URLs are downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`], so the file is cleaned up on every exit path.

use crate::error::Iso2BomError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Image media types the vision API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
        }
    }

    /// Map a file extension (without the dot, any case) to a media type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            "gif" => Some(MediaType::Gif),
            "webp" => Some(MediaType::Webp),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the media type for `path` from its extension.
///
/// Unknown or missing extensions fall back to `image/jpeg` unless `strict`
/// is set, in which case they are rejected.
pub fn media_type_for(path: &Path, strict: bool) -> Result<MediaType, Iso2BomError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    match MediaType::from_extension(ext) {
        Some(mt) => Ok(mt),
        None if strict => Err(Iso2BomError::UnsupportedImageType {
            path: path.to_path_buf(),
            extension: if ext.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{ext}")
            },
        }),
        None => {
            warn!(
                "Unrecognised extension '{}' for {}; sending as image/jpeg",
                ext,
                path.display()
            );
            Ok(MediaType::Jpeg)
        }
    }
}

/// The resolved input — either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, media_type: MediaType },
    /// Input was a URL; image downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until the run completes.
    Downloaded {
        path: PathBuf,
        media_type: MediaType,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Path to the image file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            ResolvedInput::Local { media_type, .. } => *media_type,
            ResolvedInput::Downloaded { media_type, .. } => *media_type,
        }
    }

    /// File name shown in status lines and used to name the output file.
    pub fn display_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path().display().to_string())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local image file and its media type.
///
/// Performs only an existence/readability check for local files; the bytes
/// are read later by [`crate::pipeline::encode`].
pub async fn resolve_input(
    input: &str,
    strict: bool,
    timeout_secs: u64,
) -> Result<ResolvedInput, Iso2BomError> {
    if input.trim().is_empty() {
        return Err(Iso2BomError::MissingInput);
    }
    if is_url(input) {
        download_url(input, strict, timeout_secs).await
    } else {
        resolve_local(input, strict)
    }
}

/// Resolve a local file path, validating existence and read permission.
fn resolve_local(path_str: &str, strict: bool) -> Result<ResolvedInput, Iso2BomError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Iso2BomError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(Iso2BomError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let media_type = media_type_for(&path, strict)?;

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Iso2BomError::PermissionDenied { path });
        }
        Err(source) => return Err(Iso2BomError::ReadFailed { path, source }),
    }

    debug!("Resolved local image: {} ({})", path.display(), media_type);
    Ok(ResolvedInput::Local { path, media_type })
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(
    url: &str,
    strict: bool,
    timeout_secs: u64,
) -> Result<ResolvedInput, Iso2BomError> {
    info!("Downloading drawing from: {}", url);

    let filename = extract_filename(url).ok_or_else(|| Iso2BomError::InvalidInput {
        input: url.to_string(),
    })?;
    let media_type = media_type_for(Path::new(&filename), strict)?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Iso2BomError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Iso2BomError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Iso2BomError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Iso2BomError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Iso2BomError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let temp_dir = TempDir::new().map_err(|e| Iso2BomError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Iso2BomError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        media_type,
        _temp_dir: temp_dir,
    })
}

/// Last non-empty path segment of the URL, or `drawing.jpg` when the URL
/// has no usable file name. None when the URL does not parse.
fn extract_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "drawing.jpg".to_string());
    Some(name)
}
