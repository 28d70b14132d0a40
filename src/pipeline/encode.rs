//! Image encoding: file bytes → base64 text for the JSON request body.
//!
//! The whole file is buffered in memory. No re-encoding happens: the API
//! receives exactly the bytes on disk, labelled with the media type the
//! resolver picked from the extension.

use crate::error::Iso2BomError;
use crate::pipeline::input::MediaType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::path::Path;
use tracing::{debug, warn};

/// A drawing ready to embed in a vision request.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub media_type: MediaType,
    /// Standard-alphabet base64 of the file contents.
    pub data: String,
    /// Size of the file before encoding.
    pub byte_len: usize,
}

/// Read `path` and base64-encode it.
///
/// # Errors
/// [`Iso2BomError::FileNotFound`], [`Iso2BomError::PermissionDenied`] or
/// [`Iso2BomError::ReadFailed`] depending on the I/O error kind.
pub async fn encode_file(path: &Path, media_type: MediaType) -> Result<EncodedImage, Iso2BomError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Iso2BomError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Iso2BomError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Iso2BomError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    if let Some(sniffed) = sniff_media_type(&bytes) {
        if sniffed != media_type {
            warn!(
                "{} looks like {} but will be sent as {} (from its extension)",
                path.display(),
                sniffed,
                media_type
            );
        }
    }

    Ok(encode_bytes(&bytes, media_type))
}

/// Base64-encode an in-memory image.
pub fn encode_bytes(bytes: &[u8], media_type: MediaType) -> EncodedImage {
    let data = STANDARD.encode(bytes);
    debug!("Encoded image {} bytes → {} bytes base64", bytes.len(), data.len());
    EncodedImage {
        media_type,
        data,
        byte_len: bytes.len(),
    }
}

/// Media type from the file's magic bytes, when recognisable.
pub fn sniff_media_type(bytes: &[u8]) -> Option<MediaType> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some(MediaType::Jpeg),
        ImageFormat::Png => Some(MediaType::Png),
        ImageFormat::Gif => Some(MediaType::Gif),
        ImageFormat::WebP => Some(MediaType::Webp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn encode_bytes_is_standard_base64() {
        let data = encode_bytes(b"hello", MediaType::Png);
        assert_eq!(data.data, "aGVsbG8=");
        assert_eq!(data.byte_len, 5);
        assert_eq!(data.media_type, MediaType::Png);
    }

    #[tokio::test]
    async fn encode_real_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P-001.png");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        img.save(&path).expect("save png");

        let encoded = encode_file(&path, MediaType::Png).await.expect("encode");
        let decoded = STANDARD.decode(&encoded.data).expect("valid base64");
        assert_eq!(decoded, std::fs::read(&path).unwrap());
        assert_eq!(sniff_media_type(&decoded), Some(MediaType::Png));
    }

    #[tokio::test]
    async fn missing_file_maps_to_not_found() {
        let err = encode_file(Path::new("no/such/file.png"), MediaType::Png)
            .await
            .unwrap_err();
        assert!(matches!(err, Iso2BomError::FileNotFound { .. }));
    }

    #[test]
    fn sniff_recognises_magic_bytes() {
        assert_eq!(sniff_media_type(b"GIF89a......"), Some(MediaType::Gif));
        assert_eq!(
            sniff_media_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]),
            Some(MediaType::Jpeg)
        );
        assert_eq!(sniff_media_type(b"not an image"), None);
    }
}
