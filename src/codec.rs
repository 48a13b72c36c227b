//! Image payload encoding for the model backend.
//!
//! Image bytes travel as bare standard base-64. Any `data:<mime>;base64,`
//! prefix is stripped so only the payload remains.

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use crate::error::{RecipeMuseError, Result};

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Image types the vision backend accepts.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_MIME_TYPES.contains(&self.mime_type.as_str())
    }
}

/// Read a whole image file and encode it. The MIME type comes from the
/// extension, or from the leading bytes when the extension names no image type.
pub async fn encode_file(path: impl AsRef<Path>) -> Result<EncodedImage> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| RecipeMuseError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .filter(|mime| mime.starts_with("image/"))
        .or_else(|| sniff_mime(&bytes))
        .unwrap_or(FALLBACK_MIME_TYPE);

    tracing::debug!(
        "Encoded {} ({} bytes, {})",
        path.display(),
        bytes.len(),
        mime_type
    );

    Ok(encode_bytes(&bytes, mime_type))
}

pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> EncodedImage {
    EncodedImage {
        mime_type: mime_type.to_string(),
        data: general_purpose::STANDARD.encode(bytes),
    }
}

/// Recognize the supported image formats by their magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Drop a leading `data:...,` header, leaving only the payload.
pub fn strip_data_uri_prefix(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        if let Some((_, payload)) = encoded.split_once(',') {
            return payload;
        }
    }
    encoded
}

/// MIME type named in a `data:` URI header, if any.
pub fn mime_from_data_uri(encoded: &str) -> Option<&str> {
    let header = encoded.strip_prefix("data:")?.split_once(',')?.0;
    let mime = header.split(';').next()?;
    (!mime.is_empty()).then_some(mime)
}
