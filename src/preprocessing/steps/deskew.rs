use super::threshold;
use image::{imageops, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::geometric_transformations::{warp_with, Interpolation};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

/// Corrections smaller than this (degrees) are treated as already upright
const MIN_ROTATION_DEGREES: f32 = 1e-4;

/// Edge padding around the source, covers the bicubic support
const RESAMPLE_MARGIN: u32 = 3;

/// Result of the deskew step
#[derive(Debug, Clone)]
pub struct Deskewed {
    pub image: GrayImage,
    /// Applied counter-clockwise correction in degrees, `None` for a blank page
    pub angle: Option<f32>,
}

/// Deskew image by estimating the ink's minimum-area rectangle and
/// rotating it upright
///
/// The internal Otsu binarization only locates ink; returned pixels come
/// from the input image.
pub fn apply(image: &GrayImage) -> Deskewed {
    let Some(angle) = estimate_angle(image) else {
        tracing::debug!("Deskew skipped, no foreground pixels");
        return Deskewed {
            image: image.clone(),
            angle: None,
        };
    };

    tracing::debug!("Deskew correction: {:.3} degrees", angle);

    if angle.abs() < MIN_ROTATION_DEGREES {
        return Deskewed {
            image: image.clone(),
            angle: Some(angle),
        };
    }

    Deskewed {
        image: rotate(image, angle),
        angle: Some(angle),
    }
}

/// Estimate the counter-clockwise rotation (degrees) that makes the page
/// upright, or `None` when there is no ink
pub fn estimate_angle(image: &GrayImage) -> Option<f32> {
    let points = ink_points(image);
    if points.is_empty() {
        return None;
    }
    Some(normalize_angle(min_area_rect_angle(&points)))
}

/// Map a rectangle angle in (-90, 0] to the upright correction
///
/// A rectangle's angle is only defined modulo 90 degrees, so values below
/// -45 are read as "nearly on its side".
pub fn normalize_angle(raw: f32) -> f32 {
    if raw < -45.0 {
        -(90.0 + raw)
    } else {
        -raw
    }
}

/// Coordinates of ink pixels under an inverted Otsu threshold
///
/// A single-intensity image has no foreground/background split, so it
/// yields no ink at all.
fn ink_points(image: &GrayImage) -> Vec<Point<i32>> {
    let mut levels = image.pixels().map(|p| p.0[0]);
    let Some(first) = levels.next() else {
        return Vec::new();
    };
    if levels.all(|v| v == first) {
        return Vec::new();
    }

    let level = otsu_level(image);
    let ink = threshold::apply_inverted(image, level);
    ink.enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] == threshold::MAX_VALUE)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect()
}

/// Orientation of the minimum-area bounding rectangle, reported in
/// (-90, 0] degrees with counter-clockwise positive on screen
///
/// Rotating calipers over the convex hull: the optimal rectangle has one
/// side on a hull edge, so every edge direction is tried.
pub fn min_area_rect_angle(points: &[Point<i32>]) -> f32 {
    let hull = convex_hull(points);
    if hull.len() < 2 {
        return 0.0;
    }

    let mut best_area = f64::INFINITY;
    let mut best_direction = 0.0_f64;

    for (i, start) in hull.iter().enumerate() {
        let end = hull[(i + 1) % hull.len()];
        let dx = (end.x - start.x) as f64;
        let dy = (end.y - start.y) as f64;
        let length = dx.hypot(dy);
        if length == 0.0 {
            continue;
        }
        let (ux, uy) = (dx / length, dy / length);

        let mut min_u = f64::INFINITY;
        let mut max_u = f64::NEG_INFINITY;
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;
        for p in &hull {
            let (px, py) = (p.x as f64, p.y as f64);
            let u = px * ux + py * uy;
            let v = -px * uy + py * ux;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if area < best_area {
            best_area = area;
            // Image rows grow downward; flip dy so positive means counter-clockwise
            best_direction = (-dy).atan2(dx).to_degrees();
        }
    }

    rect_angle_from_direction(best_direction) as f32
}

/// Reduce an edge direction to the (-90, 0] rectangle-angle convention
fn rect_angle_from_direction(degrees: f64) -> f64 {
    let r = degrees.rem_euclid(90.0);
    if r == 0.0 {
        0.0
    } else {
        r - 90.0
    }
}

/// Rotate counter-clockwise by `degrees` about the image center, keeping
/// the canvas size
///
/// Bicubic resampling; samples falling outside the image take the value of
/// the nearest edge pixel. Source coordinates are clamped to the image and
/// read from a copy padded by the bicubic support, so the work stays
/// proportional to the pixel count.
pub fn rotate(image: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let pad = RESAMPLE_MARGIN;
    let padded = replicate_border(image, pad);

    let margin = pad as f32;
    let (max_x, max_y) = (margin + (width - 1) as f32, margin + (height - 1) as f32);
    let (cx, cy) = (
        margin + (width - 1) as f32 / 2.0,
        margin + (height - 1) as f32 / 2.0,
    );
    let (sin, cos) = degrees.to_radians().sin_cos();

    // Maps each output pixel back to its source; rows grow downward, so a
    // counter-clockwise turn on screen uses the flipped-y rotation
    let rotated = warp_with(
        &padded,
        move |x, y| {
            let dx = x - cx;
            let dy = y - cy;
            let sx = cx + dx * cos - dy * sin;
            let sy = cy + dx * sin + dy * cos;
            (sx.clamp(margin, max_x), sy.clamp(margin, max_y))
        },
        Interpolation::Bicubic,
        Luma([0u8]),
    );

    imageops::crop_imm(&rotated, pad, pad, width, height).to_image()
}

/// Grow the image by `pad` pixels on each side, repeating the edge pixels
fn replicate_border(image: &GrayImage, pad: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width + 2 * pad, height + 2 * pad, |x, y| {
        let sx = x.saturating_sub(pad).min(width - 1);
        let sy = y.saturating_sub(pad).min(height - 1);
        *image.get_pixel(sx, sy)
    })
}
