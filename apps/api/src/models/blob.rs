use bytes::Bytes;

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";
pub const OCTET_STREAM_MIME: &str = "application/octet-stream";

/// Immutable binary payload with its MIME type.
/// Cloning is cheap: the bytes are reference counted.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub bytes: Bytes,
    pub content_type: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Guesses a MIME type from a path's extension.
pub fn mime_for_path(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        PDF_MIME
    } else if lower.ends_with(".png") {
        PNG_MIME
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        JPEG_MIME
    } else {
        OCTET_STREAM_MIME
    }
}
