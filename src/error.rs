use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for ROI analysis operations.
pub type RoiResult<T> = Result<T, RoiError>;

/// The error type for all ROI analysis, matching and template operations.
#[derive(Debug, Error)]
pub enum RoiError {
    #[error("Failed to load image {path:?}: {source}")]
    ImageLoad {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to save image {path:?}: {source}")]
    ImageSave {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Invalid image: {description}")]
    InvalidImage { description: String },

    #[error("Needle image is empty ({width}x{height})")]
    EmptyNeedle { width: u32, height: u32 },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to encode JSON: {source}")]
    JsonEncode {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid template: {description}")]
    InvalidTemplate { description: String },

    #[error(
        "Template '{name}' has template-matched ROIs but no reference regions. Add at least one reference region."
    )]
    MissingReferenceRegions { name: String },

    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("A target image named '{filename}' is already loaded")]
    DuplicateTarget { filename: String },

    #[error("Target image not found: {filename}")]
    TargetNotFound { filename: String },

    #[error("ROI {roi_num} not found")]
    RoiNotFound { roi_num: usize },

    #[error("OCR failed ({engine}): {description}")]
    Ocr { engine: String, description: String },

    #[error("ROI snapshot v{snapshot} is stale (session is at v{current})")]
    StaleSnapshot { snapshot: u64, current: u64 },

    #[error("Invalid argument: {description}")]
    InvalidArgument { description: String },

    #[error("Monitor channel closed")]
    ChannelClosed,

    #[error("Background task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl RoiError {
    pub fn invalid_image(description: impl Into<String>) -> Self {
        RoiError::InvalidImage {
            description: description.into(),
        }
    }

    pub fn invalid_argument(description: impl Into<String>) -> Self {
        RoiError::InvalidArgument {
            description: description.into(),
        }
    }

    /// Errors caused by bad input images abort an apply or analyze call outright
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            RoiError::ImageLoad { .. } | RoiError::InvalidImage { .. }
        )
    }
}
