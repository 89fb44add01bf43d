//! Harris corner detection with non-maximum suppression and subpixel peaks.

use crate::filter::{gaussian_blur, sobel, FloatImage};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A detected interest point in pixel-center coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub position: Point2<f32>,
    pub response: f32,
    /// Dominant gradient direction in radians; 0 until described.
    pub orientation: f32,
    /// Descriptor support radius in base-image pixels.
    pub scale: f32,
    /// Pyramid level the keypoint was detected on; 0 is full resolution.
    pub level: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrisParams {
    /// Harris sensitivity `k` in `det(M) - k·trace(M)²`.
    pub k: f32,
    /// Pre-smoothing applied before differentiation.
    pub smoothing_sigma: f32,
    /// Gaussian window of the structure tensor.
    pub window_sigma: f32,
    /// Responses below `relative_threshold * max_response` are dropped.
    pub relative_threshold: f32,
    /// Absolute response floor, in squared-intensity² units.
    pub min_response: f32,
    pub nms_radius: usize,
    /// Pixels closer than this to the border are never reported.
    pub border: usize,
    /// Keep at most this many keypoints (strongest first).
    pub max_keypoints: usize,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            k: 0.04,
            smoothing_sigma: 1.0,
            window_sigma: 1.5,
            relative_threshold: 0.01,
            min_response: 1e-2,
            nms_radius: 3,
            border: 4,
            max_keypoints: 2000,
        }
    }
}

/// Harris response map of an already smoothed image.
pub fn harris_response(smoothed: &FloatImage, params: &HarrisParams) -> FloatImage {
    let (gx, gy) = sobel(smoothed);
    let (w, h) = (smoothed.width, smoothed.height);

    let mut ixx = FloatImage::new(w, h);
    let mut iyy = FloatImage::new(w, h);
    let mut ixy = FloatImage::new(w, h);
    for i in 0..w * h {
        let (a, b) = (gx.data[i], gy.data[i]);
        ixx.data[i] = a * a;
        iyy.data[i] = b * b;
        ixy.data[i] = a * b;
    }

    let sxx = gaussian_blur(&ixx, params.window_sigma);
    let syy = gaussian_blur(&iyy, params.window_sigma);
    let sxy = gaussian_blur(&ixy, params.window_sigma);

    let mut response = FloatImage::new(w, h);
    for i in 0..w * h {
        let (a, b, c) = (sxx.data[i], syy.data[i], sxy.data[i]);
        let det = a * b - c * c;
        let trace = a + b;
        response.data[i] = det - params.k * trace * trace;
    }
    response
}

/// Strict maximum over the window; equal values lose to earlier pixels in
/// raster order, so plateaus yield exactly one peak.
fn is_local_max(r: &FloatImage, x: usize, y: usize, radius: usize) -> bool {
    let v = r.get(x, y);
    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = (x + radius).min(r.width - 1);
    let y1 = (y + radius).min(r.height - 1);
    for ny in y0..=y1 {
        for nx in x0..=x1 {
            if nx == x && ny == y {
                continue;
            }
            let n = r.get(nx, ny);
            let earlier = (ny, nx) < (y, x);
            if n > v || (earlier && n == v) {
                return false;
            }
        }
    }
    true
}

/// Vertex offset of the parabola through three samples, clamped to ±0.5.
fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < f32::EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

/// Detect Harris corners, strongest first.
///
/// Positions follow the pixel-center convention: a peak at pixel `(x, y)`
/// is reported near `(x + 0.5, y + 0.5)`.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(w = img.width, h = img.height))
)]
pub fn detect_keypoints(img: &FloatImage, params: &HarrisParams) -> Vec<Keypoint> {
    let (w, h) = (img.width, img.height);
    let border = params.border.max(1);
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    let smoothed = gaussian_blur(img, params.smoothing_sigma);
    let r = harris_response(&smoothed, params);
    let max_r = r.max_value();
    if max_r.is_nan() || max_r <= params.min_response {
        return Vec::new();
    }
    let thr = (params.relative_threshold.max(0.0) * max_r).max(params.min_response);

    let mut out = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let v = r.get(x, y);
            if v <= thr || !is_local_max(&r, x, y, params.nms_radius) {
                continue;
            }
            let dx = parabolic_offset(r.get(x - 1, y), v, r.get(x + 1, y));
            let dy = parabolic_offset(r.get(x, y - 1), v, r.get(x, y + 1));
            out.push(Keypoint {
                position: Point2::new(x as f32 + 0.5 + dx, y as f32 + 0.5 + dy),
                response: v,
                orientation: 0.0,
                scale: 0.0,
                level: 0,
            });
        }
    }

    // Stable sort keeps raster order among equal responses.
    out.sort_by(|a, b| b.response.total_cmp(&a.response));
    out.truncate(params.max_keypoints);
    log::trace!("harris: {} keypoints (max response {max_r:.3e})", out.len());
    out
}
