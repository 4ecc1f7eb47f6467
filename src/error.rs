//! Error types for the ball detection library

use thiserror::Error;

/// Result type alias for the detection library
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Errors that can occur during detection and pipeline operations
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Failed to open frame source: {0}")]
    SourceOpen(String),

    #[error("Failed to open frame sink: {0}")]
    SinkOpen(String),

    #[error("Frame write failed: {0}")]
    FrameWrite(String),

    #[error("Image preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("Frame dimensions changed mid-stream: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl DetectionError {
    pub fn source_open<S: Into<String>>(msg: S) -> Self {
        Self::SourceOpen(msg.into())
    }

    pub fn sink_open<S: Into<String>>(msg: S) -> Self {
        Self::SinkOpen(msg.into())
    }

    pub fn frame_write<S: Into<String>>(msg: S) -> Self {
        Self::FrameWrite(msg.into())
    }

    pub fn preprocessing<S: Into<String>>(msg: S) -> Self {
        Self::PreprocessingError(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
