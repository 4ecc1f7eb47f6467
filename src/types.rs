//! Type definitions for ball detection and pipeline progress

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Single ball detection in one frame
///
/// Detections are computed fresh per frame and never linked across frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Center x coordinate in pixels
    pub center_x: f32,
    /// Center y coordinate in pixels
    pub center_y: f32,
    /// Radius of the minimal enclosing circle in pixels
    pub radius: f32,
    /// Isoperimetric circularity score, 1.0 for a perfect circle
    pub circularity: f32,
}

impl Detection {
    /// Create new detection
    pub fn new(center_x: f32, center_y: f32, radius: f32, circularity: f32) -> Self {
        Self {
            center_x,
            center_y,
            radius,
            circularity,
        }
    }

    /// Get center point coordinates
    pub fn center(&self) -> (f32, f32) {
        (self.center_x, self.center_y)
    }
}

/// Configuration for the ball detector
///
/// The hue band and circularity threshold are empirically tuned for a
/// saturated pink ball; they are exposed here rather than hard-coded so
/// callers can retarget the detector without touching the algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Gaussian blur kernel size (odd, in pixels); sigma is derived from it
    pub blur_kernel: u32,

    /// Inclusive hue band on the 0-179 OpenCV scale
    pub hue_range: (u8, u8),

    /// Inclusive saturation band (0-255)
    pub saturation_range: (u8, u8),

    /// Inclusive value band (0-255)
    pub value_range: (u8, u8),

    /// Structuring element size for the morphological close
    pub close_kernel: u8,

    /// Number of close iterations
    pub close_iterations: u8,

    /// Structuring element size for the trailing erode
    pub erode_kernel: u8,

    /// Number of erode iterations
    pub erode_iterations: u8,

    /// Minimum contour area in pixels; smaller blobs are noise
    pub min_area: f64,

    /// Minimum circularity (4*pi*area / perimeter^2) to accept a contour
    pub min_circularity: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 11,
            hue_range: (130, 175),
            saturation_range: (50, 255),
            value_range: (50, 255),
            close_kernel: 5,
            close_iterations: 2,
            erode_kernel: 3,
            erode_iterations: 1,
            min_area: 100.0,
            min_circularity: 0.6,
        }
    }
}

impl DetectorConfig {
    /// Set the hue band (0-179 scale)
    pub fn with_hue_range(mut self, lo: u8, hi: u8) -> Self {
        self.hue_range = (lo, hi);
        self
    }

    /// Set the minimum accepted contour area
    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    /// Set the minimum accepted circularity
    pub fn with_min_circularity(mut self, min_circularity: f64) -> Self {
        self.min_circularity = min_circularity;
        self
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize configuration to a JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-frame pipeline progress
///
/// `total_frames` is `None` when the source cannot report a count, in
/// which case progress is indeterminate rather than a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineProgress {
    /// Frames consumed so far (monotonically increasing)
    pub frames_done: u64,
    /// Best-effort total frame count, if the source knows one
    pub total_frames: Option<u64>,
}

impl PipelineProgress {
    /// Create new progress marker
    pub fn new(frames_done: u64, total_frames: Option<u64>) -> Self {
        Self {
            frames_done,
            total_frames,
        }
    }

    /// Completed fraction in [0, 1], or `None` when the total is unknown
    ///
    /// Clamped at 1.0: containers routinely under-report their frame count.
    pub fn fraction(&self) -> Option<f32> {
        match self.total_frames {
            Some(total) if total > 0 => {
                Some((self.frames_done as f32 / total as f32).min(1.0))
            }
            _ => None,
        }
    }

    /// True when the source could not report a total frame count
    pub fn is_indeterminate(&self) -> bool {
        !matches!(self.total_frames, Some(t) if t > 0)
    }
}

/// Statistics accumulated over one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Total frames read from the source
    pub total_frames: u64,
    /// Total detections across all frames
    pub total_detections: usize,
    /// Wall time spent inside the pipeline loop
    pub total_processing_time: Duration,
    /// Time spent inside the annotator
    pub total_detection_time: Duration,
    /// Average frames per second over the run
    pub average_fps: f64,
    /// Average annotation time per frame in milliseconds
    pub average_detection_time_ms: f64,
}

impl PipelineStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calculate_averages(&mut self) {
        if self.total_frames > 0 && self.total_processing_time > Duration::ZERO {
            self.average_fps =
                self.total_frames as f64 / self.total_processing_time.as_secs_f64();
            self.average_detection_time_ms =
                self.total_detection_time.as_secs_f64() * 1000.0 / self.total_frames as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_tuned_constants() {
        let config = DetectorConfig::default();
        assert_eq!(config.blur_kernel, 11);
        assert_eq!(config.hue_range, (130, 175));
        assert_eq!(config.saturation_range, (50, 255));
        assert_eq!(config.value_range, (50, 255));
        assert_eq!(config.min_area, 100.0);
        assert_eq!(config.min_circularity, 0.6);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = DetectorConfig::default()
            .with_hue_range(100, 140)
            .with_min_area(250.0);
        let json = config.to_json().unwrap();
        let restored = DetectorConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_progress_fraction_known_total() {
        let progress = PipelineProgress::new(5, Some(10));
        assert_eq!(progress.fraction(), Some(0.5));
        assert!(!progress.is_indeterminate());
    }

    #[test]
    fn test_progress_fraction_clamps_at_one() {
        // Containers can under-report their frame count
        let progress = PipelineProgress::new(12, Some(10));
        assert_eq!(progress.fraction(), Some(1.0));
    }

    #[test]
    fn test_progress_unknown_total_never_divides() {
        let progress = PipelineProgress::new(7, None);
        assert_eq!(progress.fraction(), None);
        assert!(progress.is_indeterminate());

        let zero_total = PipelineProgress::new(7, Some(0));
        assert_eq!(zero_total.fraction(), None);
        assert!(zero_total.is_indeterminate());
    }
}
