//! Sequential frame pipeline: source -> annotator -> sink, with progress
//!
//! The pipeline pulls frames one at a time, annotates each and forwards
//! it to the sink in source order. Exactly one frame is in flight, so
//! memory use is constant regardless of stream length. The four
//! historical presentation variants (batch render, live preview, demo
//! fallback, lock-safe writer) all reduce to a choice of source and sink
//! around this single loop.

use image::RgbImage;
use std::time::Instant;

use crate::annotator::FrameAnnotator;
use crate::error::{DetectionError, Result};
use crate::types::{PipelineProgress, PipelineStats};

/// Ordered, finite producer of decoded frames
///
/// Implementations must keep dimensions stable across the whole sequence;
/// the pipeline enforces this and fails distinguishably if violated.
pub trait FrameSource {
    /// Produce the next decoded frame, or `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Best-effort total frame count; `None` when the source cannot know
    fn total_frames(&self) -> Option<u64> {
        None
    }

    /// Source frame rate, used only for sink construction
    fn frame_rate(&self) -> Option<f64> {
        None
    }
}

/// Consumer of annotated frames, in delivery order
pub trait FrameSink {
    /// Accept one annotated frame
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and release any held resources
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory source over a pre-decoded frame sequence
pub struct ImageSequenceSource {
    frames: std::vec::IntoIter<RgbImage>,
    total: u64,
    frame_rate: Option<f64>,
    report_total: bool,
}

impl ImageSequenceSource {
    /// Create new source from decoded frames
    pub fn new(frames: Vec<RgbImage>) -> Self {
        let total = frames.len() as u64;
        Self {
            frames: frames.into_iter(),
            total,
            frame_rate: None,
            report_total: true,
        }
    }

    /// Attach a nominal frame rate
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    /// Stop reporting a total frame count, mimicking containers that
    /// cannot count their frames up front
    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.next())
    }

    fn total_frames(&self) -> Option<u64> {
        self.report_total.then_some(self.total)
    }

    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }
}

/// Sink that hands every annotated frame to a closure
///
/// This is the live-preview shape: the caller renders each frame however
/// it likes and the pipeline stays unaware of any presentation layer.
pub struct CallbackSink<F: FnMut(&RgbImage)> {
    callback: F,
}

impl<F: FnMut(&RgbImage)> CallbackSink<F> {
    /// Create new callback sink
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(&RgbImage)> FrameSink for CallbackSink<F> {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        (self.callback)(frame);
        Ok(())
    }
}

/// Sink that accumulates annotated frames in memory
#[derive(Default)]
pub struct FrameBuffer {
    frames: Vec<RgbImage>,
}

impl FrameBuffer {
    /// Create new empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered frames in delivery order
    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    /// Consume the buffer
    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }
}

impl FrameSink for FrameBuffer {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// Sequential driver pulling frames through a [`FrameAnnotator`]
pub struct StreamPipeline {
    annotator: FrameAnnotator,
}

impl StreamPipeline {
    /// Create new pipeline around an annotator
    pub fn new(annotator: FrameAnnotator) -> Self {
        Self { annotator }
    }

    /// Get the pipeline's annotator
    pub fn annotator(&self) -> &FrameAnnotator {
        &self.annotator
    }

    /// Drain the source, annotating every frame and forwarding it to the
    /// sink; `progress` is invoked once per frame consumed.
    ///
    /// A frame that fails to decode ends the stream cleanly: everything
    /// forwarded so far remains valid output. Sink failures and
    /// mid-stream dimension changes propagate as errors.
    pub fn run<S, K, P>(&self, source: &mut S, sink: &mut K, mut progress: P) -> Result<PipelineStats>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
        P: FnMut(&PipelineProgress),
    {
        let total = source.total_frames().filter(|t| *t > 0);
        let mut stats = PipelineStats::new();
        let mut expected_dims: Option<(u32, u32)> = None;
        let run_start = Instant::now();

        match total {
            Some(total) => log::info!("Starting pipeline run over {} frames", total),
            None => log::info!("Starting pipeline run, total frame count unknown"),
        }

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    log::warn!(
                        "Frame decode failed after {} frames, treating as end of stream: {}",
                        stats.total_frames,
                        e
                    );
                    break;
                }
            };

            let dims = frame.dimensions();
            match expected_dims {
                None => expected_dims = Some(dims),
                Some(expected) if expected != dims => {
                    return Err(DetectionError::DimensionMismatch {
                        expected,
                        actual: dims,
                    });
                }
                Some(_) => {}
            }

            let detection_start = Instant::now();
            let (annotated, detections) = self.annotator.annotate(&frame);
            stats.total_detection_time += detection_start.elapsed();
            stats.total_detections += detections.len();

            sink.write_frame(&annotated)?;

            stats.total_frames += 1;
            progress(&PipelineProgress::new(stats.total_frames, total));

            if stats.total_frames % 100 == 0 {
                log::debug!("Processed {} frames", stats.total_frames);
            }
        }

        sink.finish()?;

        stats.total_processing_time = run_start.elapsed();
        stats.calculate_averages();
        log::info!(
            "Pipeline run complete: {} frames, {} detections",
            stats.total_frames,
            stats.total_detections
        );
        Ok(stats)
    }
}

impl Default for StreamPipeline {
    fn default() -> Self {
        Self::new(FrameAnnotator::default())
    }
}
