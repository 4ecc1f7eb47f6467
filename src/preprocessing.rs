//! Frame preprocessing: smoothing, HSV conversion and candidate-mask extraction
//!
//! This is the front half of the detection algorithm: suppress sensor and
//! compression noise with a Gaussian blur, move to HSV so the color test is
//! robust to lighting, threshold into a binary mask, then clean the mask up
//! with binary morphology before contour extraction.

use image::{GrayImage, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, erode};
use rayon::prelude::*;

use crate::types::DetectorConfig;

/// Candidate pixel value in the binary mask
pub const MASK_FOREGROUND: u8 = 255;

/// Convert one RGB pixel to HSV on the OpenCV 8-bit scale
///
/// Hue lands in 0-179 (degrees halved), saturation and value in 0-255.
/// Hue thresholding on this scale is illumination-invariant in a way raw
/// channel thresholding is not.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (v - min) as f32;

    let s = if v == 0 {
        0
    } else {
        ((delta * 255.0) / v as f32).round() as u8
    };

    let hue_degrees = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g as f32 - b as f32) / delta
    } else if v == g {
        120.0 + 60.0 * (b as f32 - r as f32) / delta
    } else {
        240.0 + 60.0 * (r as f32 - g as f32) / delta
    };
    let hue_degrees = if hue_degrees < 0.0 {
        hue_degrees + 360.0
    } else {
        hue_degrees
    };

    (((hue_degrees / 2.0).round() as u16 % 180) as u8, s, v)
}

/// Blur sigma derived from an odd kernel size, matching the usual
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8` convention for auto-sigma
fn sigma_for_kernel(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Threshold a frame into a binary candidate mask
///
/// A pixel is foreground iff its HSV triple lies inside the inclusive
/// H/S/V bands of `config`. Rows are thresholded in parallel; the result
/// is deterministic regardless of thread count.
pub fn threshold_hsv(frame: &RgbImage, config: &DetectorConfig) -> GrayImage {
    let (width, height) = frame.dimensions();
    let mut mask = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    let (h_lo, h_hi) = config.hue_range;
    let (s_lo, s_hi) = config.saturation_range;
    let (v_lo, v_hi) = config.value_range;

    mask.par_chunks_exact_mut(width as usize)
        .zip(frame.as_raw().par_chunks_exact(width as usize * 3))
        .for_each(|(mask_row, pixel_row)| {
            for (out, px) in mask_row.iter_mut().zip(pixel_row.chunks_exact(3)) {
                let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
                if (h_lo..=h_hi).contains(&h)
                    && (s_lo..=s_hi).contains(&s)
                    && (v_lo..=v_hi).contains(&v)
                {
                    *out = MASK_FOREGROUND;
                }
            }
        });

    mask
}

/// Build the cleaned binary candidate mask for one frame
///
/// Applies, in order: Gaussian blur, HSV thresholding, morphological close
/// (fills specular-highlight holes inside the ball blob) and a trailing
/// erode (counteracts the close's dilation bias and separates touching
/// blobs).
pub fn candidate_mask(frame: &RgbImage, config: &DetectorConfig) -> GrayImage {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    let smoothed = if config.blur_kernel >= 3 {
        gaussian_blur_f32(frame, sigma_for_kernel(config.blur_kernel))
    } else {
        frame.clone()
    };

    let mut mask = threshold_hsv(&smoothed, config);

    // A k x k structuring element applied n times equals one pass with
    // an LInf ball of radius n * (k / 2).
    let close_radius = config.close_iterations * (config.close_kernel / 2);
    if close_radius > 0 {
        mask = close(&mask, Norm::LInf, close_radius);
    }

    let erode_radius = config.erode_iterations * (config.erode_kernel / 2);
    if erode_radius > 0 {
        mask = erode(&mask, Norm::LInf, erode_radius);
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
        // Magenta sits at 300 degrees, i.e. 150 on the halved scale
        assert_eq!(rgb_to_hsv(255, 0, 255), (150, 255, 255));
    }

    #[test]
    fn test_rgb_to_hsv_achromatic() {
        assert_eq!(rgb_to_hsv(0, 0, 0), (0, 0, 0));
        assert_eq!(rgb_to_hsv(128, 128, 128), (0, 0, 128));
        assert_eq!(rgb_to_hsv(255, 255, 255), (0, 0, 255));
    }

    #[test]
    fn test_threshold_selects_pink_only() {
        let config = DetectorConfig::default();
        let mut frame = RgbImage::new(4, 1);
        frame.put_pixel(0, 0, Rgb([255, 0, 255])); // magenta, in band
        frame.put_pixel(1, 0, Rgb([0, 255, 0])); // green, wrong hue
        frame.put_pixel(2, 0, Rgb([200, 190, 200])); // washed out, low saturation
        frame.put_pixel(3, 0, Rgb([20, 0, 20])); // too dark, low value

        let mask = threshold_hsv(&frame, &config);
        assert_eq!(mask.get_pixel(0, 0).0[0], MASK_FOREGROUND);
        assert_eq!(mask.get_pixel(1, 0).0[0], 0);
        assert_eq!(mask.get_pixel(2, 0).0[0], 0);
        assert_eq!(mask.get_pixel(3, 0).0[0], 0);
    }

    #[test]
    fn test_candidate_mask_fills_specular_hole() {
        let config = DetectorConfig::default();
        let mut frame = RgbImage::new(64, 64);
        for y in 16..48 {
            for x in 16..48 {
                frame.put_pixel(x, y, Rgb([255, 0, 255]));
            }
        }
        // Bright desaturated highlight inside the blob, large enough to
        // survive the blur and punch a hole in the raw threshold
        for y in 30..35 {
            for x in 30..35 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let mask = candidate_mask(&frame, &config);
        assert_eq!(mask.get_pixel(32, 32).0[0], MASK_FOREGROUND);
    }

    #[test]
    fn test_candidate_mask_is_deterministic() {
        let config = DetectorConfig::default();
        let mut frame = RgbImage::new(48, 48);
        for y in 10..30 {
            for x in 10..30 {
                frame.put_pixel(x, y, Rgb([230, 40, 200]));
            }
        }
        let a = candidate_mask(&frame, &config);
        let b = candidate_mask(&frame, &config);
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
