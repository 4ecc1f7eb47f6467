//! Per-frame ball detection and overlay drawing

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_text_mut};
use std::sync::OnceLock;

use crate::contours;
use crate::preprocessing;
use crate::types::{Detection, DetectorConfig};

static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Overlay color for circles and labels
const ANNOTATION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Label height in pixels
const LABEL_SCALE: f32 = 16.0;

/// Vertical offset of the label above the detection center
const LABEL_OFFSET_Y: i32 = 20;

fn label_font() -> &'static FontRef<'static> {
    static FONT: OnceLock<FontRef<'static>> = OnceLock::new();
    FONT.get_or_init(|| {
        // Compile-time asset, parse failure is a build defect
        FontRef::try_from_slice(FONT_BYTES).expect("embedded label font is valid")
    })
}

/// Stateless per-frame ball detector and annotator
///
/// `annotate` never fails on well-formed input and carries no state
/// between calls: two calls with identical input produce identical
/// detections and identical annotated pixels.
pub struct FrameAnnotator {
    config: DetectorConfig,
}

impl FrameAnnotator {
    /// Create new annotator from configuration
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Get annotator configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect balls in one frame and draw the annotations
    ///
    /// Returns the annotated copy of the frame plus the detections in
    /// contour discovery order. An empty or degenerate frame comes back
    /// unchanged with no detections; absence of detections is a normal
    /// outcome, not an error.
    pub fn annotate(&self, frame: &RgbImage) -> (RgbImage, Vec<Detection>) {
        let mut annotated = frame.clone();
        if frame.width() == 0 || frame.height() == 0 {
            return (annotated, Vec::new());
        }

        let mask = preprocessing::candidate_mask(frame, &self.config);
        let detections = contours::detect_in_mask(&mask, &self.config);

        for detection in &detections {
            self.draw_detection(&mut annotated, detection);
        }

        (annotated, detections)
    }

    /// Draw one detection: circle outline plus circularity label
    ///
    /// Drawn on the original (unblurred) frame so the output stays sharp.
    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        let cx = detection.center_x.round() as i32;
        let cy = detection.center_y.round() as i32;
        let radius = detection.radius.round() as i32;

        draw_hollow_circle_mut(canvas, (cx, cy), radius, ANNOTATION_COLOR);
        if radius > 1 {
            // Second ring for a 2px outline
            draw_hollow_circle_mut(canvas, (cx, cy), radius - 1, ANNOTATION_COLOR);
        }

        let label = format!("Ball: {:.2}", detection.circularity);
        let x = cx.max(0);
        let y = (cy - LABEL_OFFSET_Y).max(0);
        draw_text_mut(
            canvas,
            ANNOTATION_COLOR,
            x,
            y,
            PxScale::from(LABEL_SCALE),
            label_font(),
            &label,
        );
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_circle_mut;

    const PINK: Rgb<u8> = Rgb([255, 0, 255]);

    fn frame_with_disk(width: u32, height: u32, cx: i32, cy: i32, radius: i32) -> RgbImage {
        let mut frame = RgbImage::new(width, height);
        draw_filled_circle_mut(&mut frame, (cx, cy), radius, PINK);
        frame
    }

    fn frame_with_ellipse(width: u32, height: u32, cx: f32, cy: f32, a: f32, b: f32) -> RgbImage {
        let mut frame = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let dx = (x as f32 - cx) / a;
                let dy = (y as f32 - cy) / b;
                if dx * dx + dy * dy <= 1.0 {
                    frame.put_pixel(x, y, PINK);
                }
            }
        }
        frame
    }

    #[test]
    fn test_black_frame_yields_no_detections() {
        let annotator = FrameAnnotator::default();
        let frame = RgbImage::new(160, 120);
        let (annotated, detections) = annotator.annotate(&frame);
        assert!(detections.is_empty());
        assert_eq!(annotated.as_raw(), frame.as_raw());
    }

    #[test]
    fn test_empty_frame_is_returned_unchanged() {
        let annotator = FrameAnnotator::default();
        let frame = RgbImage::new(0, 0);
        let (annotated, detections) = annotator.annotate(&frame);
        assert!(detections.is_empty());
        assert_eq!(annotated.dimensions(), (0, 0));
    }

    #[test]
    fn test_pink_disk_is_detected_near_center() {
        let annotator = FrameAnnotator::default();
        let frame = frame_with_disk(200, 200, 100, 100, 30);
        let (annotated, detections) = annotator.annotate(&frame);

        assert_eq!(detections.len(), 1);
        let det = detections[0];
        assert!(det.circularity > 0.9, "circularity was {}", det.circularity);
        assert!((det.center_x - 100.0).abs() < 2.0);
        assert!((det.center_y - 100.0).abs() < 2.0);
        assert!((det.radius - 30.0).abs() < 4.0);

        // The overlay must actually touch the frame
        assert_ne!(annotated.as_raw(), frame.as_raw());
        assert_eq!(annotated.dimensions(), frame.dimensions());
    }

    #[test]
    fn test_elongated_ellipse_is_rejected() {
        let annotator = FrameAnnotator::default();
        // 4:1 aspect ratio, same area as the radius-30 disk
        let frame = frame_with_ellipse(240, 120, 120.0, 60.0, 60.0, 15.0);
        let (_, detections) = annotator.annotate(&frame);
        assert!(detections.is_empty());
    }

    #[test]
    fn test_annotate_is_deterministic() {
        let annotator = FrameAnnotator::default();
        let frame = frame_with_disk(160, 160, 70, 90, 25);
        let (annotated_a, detections_a) = annotator.annotate(&frame);
        let (annotated_b, detections_b) = annotator.annotate(&frame);
        assert_eq!(detections_a, detections_b);
        assert_eq!(annotated_a.as_raw(), annotated_b.as_raw());
    }

    #[test]
    fn test_two_disks_yield_two_independent_detections() {
        let annotator = FrameAnnotator::default();
        let mut frame = frame_with_disk(320, 160, 70, 80, 25);
        draw_filled_circle_mut(&mut frame, (230, 80), 30, PINK);
        let (_, detections) = annotator.annotate(&frame);
        assert_eq!(detections.len(), 2);
    }
}
