//! Encoded image blobs carried between the wizard steps.
//!
//! Both the imported photo and the generated sketchnote travel as data URIs
//! (`data:<mime>;base64,<payload>`), the form a browser can display directly.

use std::fmt;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::SketchError;

/// A base64 data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    payload: String,
}

impl DataUri {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            payload: STANDARD.encode(bytes),
        }
    }

    /// Wrap an already-encoded base64 payload.
    pub fn from_base64(payload: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            payload: payload.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64_data(&self) -> &str {
        &self.payload
    }

    pub fn decode(&self) -> Result<Vec<u8>, SketchError> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| SketchError::InvalidImage(e.to_string()))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload)
    }
}

/// The photographed note, as imported by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage(DataUri);

impl SourceImage {
    /// Encode raw file bytes. No type or size validation happens here; an
    /// unreadable image is reported by the analysis call instead.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self(DataUri::from_bytes(bytes, mime_type))
    }

    pub fn data_uri(&self) -> &DataUri {
        &self.0
    }

    /// Size of the decoded image, computed from the padded base64 payload.
    pub fn byte_len(&self) -> usize {
        let payload = self.0.payload.as_bytes();
        let padding = payload.iter().rev().take_while(|b| **b == b'=').count();
        (payload.len() / 4 * 3).saturating_sub(padding)
    }
}

impl From<DataUri> for SourceImage {
    fn from(uri: DataUri) -> Self {
        Self(uri)
    }
}

/// The rendered sketchnote returned by the generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage(DataUri);

impl GeneratedImage {
    pub fn data_uri(&self) -> &DataUri {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SketchError> {
        self.0.decode()
    }
}

impl From<DataUri> for GeneratedImage {
    fn from(uri: DataUri) -> Self {
        Self(uri)
    }
}

/// Detect an image MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        "heic"         => "image/heic",
        "heif"         => "image/heif",
        "bmp"          => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        _              => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn data_uri_display_and_decode() {
        let uri = DataUri::from_bytes(b"\x89PNG", "image/png");
        assert_eq!(uri.to_string(), "data:image/png;base64,iVBORw==");
        assert_eq!(uri.decode().unwrap(), b"\x89PNG");
    }

    #[test]
    fn rejects_invalid_payload() {
        let uri = DataUri::from_base64("not base64!", "image/png");
        assert!(matches!(uri.decode(), Err(SketchError::InvalidImage(_))));
    }

    #[test]
    fn source_byte_len_accounts_for_padding() {
        assert_eq!(SourceImage::from_bytes(b"abc", "image/png").byte_len(), 3);
        assert_eq!(SourceImage::from_bytes(b"hello", "image/png").byte_len(), 5);
        assert_eq!(SourceImage::from_bytes(b"hi", "image/png").byte_len(), 2);
        assert_eq!(SourceImage::from_bytes(b"", "image/png").byte_len(), 0);
    }

    #[test]
    fn generated_image_decodes_payload() {
        let image = GeneratedImage::from(DataUri::from_base64("aGVsbG8=", "image/png"));
        assert_eq!(image.to_bytes().unwrap(), b"hello");
    }

    #[test]
    fn detects_jpeg() {
        assert_eq!(detect_mime_type(&PathBuf::from("note.JPG")), "image/jpeg");
    }

    #[test]
    fn unknown_extension_fallback() {
        assert_eq!(detect_mime_type(&PathBuf::from("note.xyz")), "application/octet-stream");
    }
}
