//! Contour extraction and circularity-based shape classification
//!
//! Works on the cleaned binary mask produced by [`crate::preprocessing`]:
//! extracts external contours, simplifies their boundaries, and keeps the
//! blobs whose area and isoperimetric ratio look like a ball rather than
//! paws, fabric or other pink-ish clutter.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use std::f64::consts::PI;

use crate::types::{Detection, DetectorConfig};

/// Douglas-Peucker tolerance used to strip staircase redundancy from the
/// pixel-boundary chain before measuring perimeter
const SIMPLIFY_EPSILON: f64 = 1.0;

/// Extract external contours from a binary mask
///
/// Nested contours (hole boundaries and anything inside a hole) are
/// discarded; each returned polyline is the outer boundary of one
/// connected candidate region.
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Enclosed area of a closed polygon via the shoelace formula
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice_area as f64 / 2.0).abs()
}

/// Isoperimetric circularity: `4 * pi * area / perimeter^2`
///
/// Equals 1.0 for a perfect circle at any scale and decreases for
/// elongated or irregular shapes.
pub fn circularity(area: f64, perimeter: f64) -> f64 {
    4.0 * PI * area / (perimeter * perimeter)
}

/// Area and circularity acceptance test for one contour's measurements
///
/// A zero perimeter cannot yield a circularity score; such degenerate
/// contours are an expected outcome of noisy input and are skipped, never
/// surfaced as errors.
pub(crate) fn passes_filters(area: f64, perimeter: f64, config: &DetectorConfig) -> bool {
    if area < config.min_area {
        return false;
    }
    if perimeter <= 0.0 {
        return false;
    }
    circularity(area, perimeter) > config.min_circularity
}

/// Classify one contour, returning a detection if it passes the filters
pub fn classify_contour(points: &[Point<i32>], config: &DetectorConfig) -> Option<Detection> {
    if points.len() < 3 {
        return None;
    }
    let polygon = approximate_polygon_dp(points, SIMPLIFY_EPSILON, true);
    if polygon.len() < 3 {
        return None;
    }

    let area = polygon_area(&polygon);
    if area < config.min_area {
        return None;
    }
    let perimeter = arc_length(&polygon, true);
    if perimeter <= 0.0 {
        return None;
    }
    let circularity = circularity(area, perimeter);
    if circularity <= config.min_circularity {
        return None;
    }

    let ((center_x, center_y), radius) = min_enclosing_circle(&polygon);
    Some(Detection::new(center_x, center_y, radius, circularity as f32))
}

/// Run contour extraction and classification over a cleaned mask
///
/// Detections come back in contour discovery order; overlapping blobs are
/// reported independently with no suppression.
pub fn detect_in_mask(mask: &GrayImage, config: &DetectorConfig) -> Vec<Detection> {
    external_contours(mask)
        .iter()
        .filter_map(|contour| classify_contour(contour, config))
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Circle {
    cx: f64,
    cy: f64,
    r: f64,
}

impl Circle {
    const CONTAINS_EPS: f64 = 1e-7;

    fn from_point(p: (f64, f64)) -> Self {
        Self {
            cx: p.0,
            cy: p.1,
            r: 0.0,
        }
    }

    fn from_diameter(a: (f64, f64), b: (f64, f64)) -> Self {
        let cx = (a.0 + b.0) / 2.0;
        let cy = (a.1 + b.1) / 2.0;
        let r = ((a.0 - cx).powi(2) + (a.1 - cy).powi(2)).sqrt();
        Self { cx, cy, r }
    }

    /// Circumcircle of three points; `None` when they are collinear
    fn circumscribing(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Option<Self> {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < 1e-9 {
            return None;
        }
        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let cx = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let cy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        let r = ((a.0 - cx).powi(2) + (a.1 - cy).powi(2)).sqrt();
        Some(Self { cx, cy, r })
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        let dx = p.0 - self.cx;
        let dy = p.1 - self.cy;
        (dx * dx + dy * dy).sqrt() <= self.r + Self::CONTAINS_EPS
    }
}

/// Minimal enclosing circle of a point set
///
/// Incremental Welzl construction with a fixed insertion order, so the
/// result is deterministic for identical input.
pub fn min_enclosing_circle(points: &[Point<i32>]) -> ((f32, f32), f32) {
    let pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    if pts.is_empty() {
        return ((0.0, 0.0), 0.0);
    }

    let mut circle = Circle::from_point(pts[0]);
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle::from_point(pts[i]);
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_diameter(pts[i], pts[j]);
            for k in 0..j {
                if circle.contains(pts[k]) {
                    continue;
                }
                circle = circle_from_boundary_triple(pts[i], pts[j], pts[k]);
            }
        }
    }

    ((circle.cx as f32, circle.cy as f32), circle.r as f32)
}

/// Smallest circle with three boundary candidates, falling back to the
/// widest diameter circle when the points are collinear
fn circle_from_boundary_triple(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Circle {
    if let Some(circle) = Circle::circumscribing(a, b, c) {
        return circle;
    }
    // Collinear points: the farthest pair spans the circle
    let pairs = [(a, b), (a, c), (b, c)];
    let (p, q) = pairs
        .into_iter()
        .max_by(|(p1, q1), (p2, q2)| {
            let d1 = (p1.0 - q1.0).powi(2) + (p1.1 - q1.1).powi(2);
            let d2 = (p2.0 - q2.0).powi(2) + (p2.1 - q2.1).powi(2);
            d1.total_cmp(&d2)
        })
        .unwrap_or((a, b));
    Circle::from_diameter(p, q)
}
