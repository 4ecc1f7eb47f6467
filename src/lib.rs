//! Pink Ball Detection Library
//!
//! Detects and highlights a pink ball in video footage of a cat at play,
//! frame by frame. The core is a pure, stateless per-frame transform
//! ([`FrameAnnotator`]) driven by a sequential pipeline
//! ([`StreamPipeline`]) over caller-supplied frame sources and sinks.
//! Video container I/O lives behind the optional `opencv` feature; no
//! state is carried between frames and no tracking is performed.

pub mod annotator;
pub mod contours;
pub mod error;
pub mod pipeline;
pub mod preprocessing;
pub mod types;

#[cfg(feature = "opencv")]
pub mod video;

pub use annotator::FrameAnnotator;
pub use error::{DetectionError, Result};
pub use pipeline::{
    CallbackSink, FrameBuffer, FrameSink, FrameSource, ImageSequenceSource, StreamPipeline,
};
pub use types::{Detection, DetectorConfig, PipelineProgress, PipelineStats};

#[cfg(feature = "opencv")]
pub use video::{VideoFileSink, VideoFileSource};

/// Initialize the detection library
///
/// Optional; emits a startup log line for callers that want one.
pub fn init() -> Result<()> {
    log::info!("Ball detection library initialized");
    Ok(())
}

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
