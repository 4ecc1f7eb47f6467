//! Video container I/O behind the `opencv` feature
//!
//! The detection core never touches containers or codecs; these adapters
//! decode a file into RGB frames and encode annotated frames back out,
//! plugging into the pipeline as [`FrameSource`] and [`FrameSink`].

use image::RgbImage;
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter, CAP_ANY},
};
use std::path::Path;

use crate::error::{DetectionError, Result};
use crate::pipeline::{FrameSink, FrameSource};

/// Frame rate used when a container reports a non-positive FPS
const FALLBACK_FPS: f64 = 20.0;

/// Default output fourcc: VP9 in WebM, playable directly in browsers
const DEFAULT_FOURCC: (char, char, char, char) = ('V', 'P', '9', '0');

/// Frame source reading a video file through OpenCV
pub struct VideoFileSource {
    capture: VideoCapture,
    total_frames: Option<u64>,
    frame_rate: f64,
    dimensions: (u32, u32),
    buffer: Mat,
}

impl VideoFileSource {
    /// Open a video file for reading
    ///
    /// Fails fast with a descriptive error naming the source if the file
    /// cannot be opened or is not a readable video.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or_else(|| DetectionError::source_open("path is not valid UTF-8"))?;

        log::info!("Opening video source: {}", path_str);

        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|e| DetectionError::source_open(format!("{}: {}", path_str, e)))?;
        if !capture
            .is_opened()
            .map_err(|e| DetectionError::source_open(format!("{}: {}", path_str, e)))?
        {
            return Err(DetectionError::source_open(format!(
                "{} is not a readable video",
                path_str
            )));
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;

        let reported_total = capture.get(videoio::CAP_PROP_FRAME_COUNT).unwrap_or(0.0);
        let total_frames = (reported_total > 0.0).then_some(reported_total as u64);

        let mut frame_rate = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        if frame_rate <= 0.0 {
            log::warn!(
                "Video source reported invalid FPS ({}), defaulting to {}",
                frame_rate,
                FALLBACK_FPS
            );
            frame_rate = FALLBACK_FPS;
        }

        log::info!(
            "Video properties: {}x{} @ {:.2} FPS, {} frames",
            width,
            height,
            frame_rate,
            total_frames.map_or_else(|| "unknown".to_string(), |t| t.to_string())
        );

        Ok(Self {
            capture,
            total_frames,
            frame_rate,
            dimensions: (width, height),
            buffer: Mat::default(),
        })
    }

    /// Frame dimensions as reported by the container
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let read = self
            .capture
            .read(&mut self.buffer)
            .map_err(|e| DetectionError::other(format!("Frame read failed: {}", e)))?;

        if !read || self.buffer.empty() {
            return Ok(None);
        }

        bgr_mat_to_rgb(&self.buffer).map(Some)
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn frame_rate(&self) -> Option<f64> {
        Some(self.frame_rate)
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            log::warn!("Failed to release video capture: {}", e);
        }
    }
}

/// Frame sink encoding annotated frames to a video file
pub struct VideoFileSink {
    writer: VideoWriter,
    dimensions: (u32, u32),
}

impl VideoFileSink {
    /// Create a sink writing VP9/WebM at the given frame rate and size
    pub fn create<P: AsRef<Path>>(path: P, fps: f64, width: u32, height: u32) -> Result<Self> {
        Self::create_with_fourcc(path, fps, width, height, DEFAULT_FOURCC)
    }

    /// Create a sink with an explicit fourcc
    pub fn create_with_fourcc<P: AsRef<Path>>(
        path: P,
        fps: f64,
        width: u32,
        height: u32,
        fourcc: (char, char, char, char),
    ) -> Result<Self> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or_else(|| DetectionError::sink_open("path is not valid UTF-8"))?;

        let fourcc = VideoWriter::fourcc(fourcc.0, fourcc.1, fourcc.2, fourcc.3)
            .map_err(|e| DetectionError::sink_open(format!("bad fourcc: {}", e)))?;
        let writer = VideoWriter::new(
            path_str,
            fourcc,
            fps,
            Size::new(width as i32, height as i32),
            true,
        )
        .map_err(|e| DetectionError::sink_open(format!("{}: {}", path_str, e)))?;

        if !writer
            .is_opened()
            .map_err(|e| DetectionError::sink_open(format!("{}: {}", path_str, e)))?
        {
            return Err(DetectionError::sink_open(format!(
                "could not open {} for encoding",
                path_str
            )));
        }

        log::info!(
            "Opened video sink: {} ({}x{} @ {:.2} FPS)",
            path_str,
            width,
            height,
            fps
        );

        Ok(Self {
            writer,
            dimensions: (width, height),
        })
    }
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != self.dimensions {
            return Err(DetectionError::DimensionMismatch {
                expected: self.dimensions,
                actual: frame.dimensions(),
            });
        }

        let bgr = rgb_to_bgr_bytes(frame);
        let mat = Mat::from_slice(&bgr)
            .map_err(|e| DetectionError::frame_write(e.to_string()))?;
        let mat = mat
            .reshape(3, frame.height() as i32)
            .map_err(|e| DetectionError::frame_write(e.to_string()))?;

        self.writer
            .write(&mat)
            .map_err(|e| DetectionError::frame_write(e.to_string()))
    }

    fn finish(&mut self) -> Result<()> {
        // Release failure must never mask the outcome of the run
        if let Err(e) = self.writer.release() {
            log::warn!("Failed to release video writer: {}", e);
        }
        Ok(())
    }
}

/// Convert a decoded BGR Mat to an `RgbImage` by swapping channels
fn bgr_mat_to_rgb(mat: &Mat) -> Result<RgbImage> {
    let width = mat.cols() as u32;
    let height = mat.rows() as u32;

    let data = mat
        .data_bytes()
        .map_err(|e| DetectionError::other(format!("Mat data extraction failed: {}", e)))?;

    let mut rgb = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(3) {
        rgb.push(chunk[2]);
        rgb.push(chunk[1]);
        rgb.push(chunk[0]);
    }

    RgbImage::from_vec(width, height, rgb)
        .ok_or_else(|| DetectionError::other("Failed to create RgbImage from frame".to_string()))
}

fn rgb_to_bgr_bytes(frame: &RgbImage) -> Vec<u8> {
    let data = frame.as_raw();
    let mut bgr = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(3) {
        bgr.push(chunk[2]);
        bgr.push(chunk[1]);
        bgr.push(chunk[0]);
    }
    bgr
}
