use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Progress of a single conversion call.
///
/// `Idle -> EngineReady -> Parsed -> PageFetched -> Rendered -> Encoded -> Done`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStage {
    Idle,
    EngineReady,
    Parsed,
    PageFetched,
    Rendered,
    Encoded,
    Done,
    Failed,
}

impl ConversionStage {
    pub fn trace(self) {
        debug!(stage = ?self, "conversion advanced");
    }
}

/// Errors that can occur while converting a PDF page to a raster image.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to load PDF engine: {0}")]
    EngineLoad(String),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Page {requested} not found (document has {available} pages)")]
    PageNotFound { requested: u16, available: u16 },

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

impl ConversionError {
    /// Human-readable reason for the failure, naming the stage that failed.
    pub fn reason(&self) -> String {
        format!("Failed to convert PDF: {self}")
    }

    /// Last stage the conversion reached before this error.
    pub fn stage(&self) -> ConversionStage {
        match self {
            ConversionError::InvalidInput(_) | ConversionError::EngineLoad(_) => {
                ConversionStage::Idle
            }
            ConversionError::Parse(_) => ConversionStage::EngineReady,
            ConversionError::PageNotFound { .. } => ConversionStage::Parsed,
            ConversionError::Render(_) => ConversionStage::PageFetched,
            ConversionError::Encode(_) => ConversionStage::Rendered,
        }
    }

    /// Whether repeating the same call may succeed. The core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConversionError::EngineLoad(_) | ConversionError::Render(_) | ConversionError::Encode(_)
        )
    }
}
