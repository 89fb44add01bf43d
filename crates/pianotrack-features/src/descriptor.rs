//! Oriented 4×4×8 gradient-histogram descriptors.

use crate::detector::Keypoint;
use crate::filter::FloatImage;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

pub const DESCRIPTOR_LEN: usize = 128;
const GRID: usize = 4;
const ORI_BINS: usize = 8;
const SAMPLES_PER_CELL: usize = 4;

pub type Descriptor = [f32; DESCRIPTOR_LEN];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorParams {
    /// Half side of the square patch the descriptor covers, in pixels.
    pub support_radius: f32,
    /// Histogram bins used to estimate the dominant orientation.
    pub orientation_bins: usize,
    /// Assign a dominant orientation; with `false` every keypoint uses 0.
    pub oriented: bool,
    /// Per-component cap applied before the second normalization.
    pub clamp: f32,
}

impl Default for DescriptorParams {
    fn default() -> Self {
        Self {
            support_radius: 8.0,
            orientation_bins: 36,
            oriented: true,
            clamp: 0.2,
        }
    }
}

/// Gradient planes shared by all keypoints of one image.
pub struct GradientField {
    gx: FloatImage,
    gy: FloatImage,
}

impl GradientField {
    pub fn new(gx: FloatImage, gy: FloatImage) -> Self {
        Self { gx, gy }
    }

    /// Gradient at a pixel-center coordinate.
    #[inline]
    fn at(&self, x: f32, y: f32) -> (f32, f32) {
        (self.gx.sample(x - 0.5, y - 0.5), self.gy.sample(x - 0.5, y - 0.5))
    }
}

fn dominant_orientation(field: &GradientField, kp: &Keypoint, params: &DescriptorParams) -> f32 {
    let bins = params.orientation_bins.max(4);
    let mut hist = vec![0.0f32; bins];
    let radius = params.support_radius.round().max(1.0) as i32;
    let sigma = radius as f32 * 0.5;
    let denom = 2.0 * sigma * sigma;

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = (dx * dx + dy * dy) as f32;
            if d2 > (radius * radius) as f32 {
                continue;
            }
            let (gx, gy) = field.at(kp.position.x + dx as f32, kp.position.y + dy as f32);
            let mag = gx.hypot(gy);
            if mag <= 0.0 {
                continue;
            }
            let angle = gy.atan2(gx).rem_euclid(TAU);
            let b = ((angle / TAU) * bins as f32) as usize % bins;
            hist[b] += mag * (-d2 / denom).exp();
        }
    }

    let smoothed: Vec<f32> = (0..bins)
        .map(|i| {
            let prev = hist[(i + bins - 1) % bins];
            let next = hist[(i + 1) % bins];
            0.25 * prev + 0.5 * hist[i] + 0.25 * next
        })
        .collect();

    let mut best = 0usize;
    for (i, &v) in smoothed.iter().enumerate() {
        if v > smoothed[best] {
            best = i;
        }
    }
    let left = smoothed[(best + bins - 1) % bins];
    let right = smoothed[(best + 1) % bins];
    let c = smoothed[best];
    let denom = left - 2.0 * c + right;
    let offset = if denom.abs() > f32::EPSILON {
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };
    let angle = (best as f32 + 0.5 + offset) * TAU / bins as f32;
    if angle > PI {
        angle - TAU
    } else {
        angle
    }
}

fn normalize(v: &mut Descriptor) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 1e-6 || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Describe one keypoint. Returns the orientation used and the descriptor,
/// or `None` when the patch has no gradient energy.
pub fn describe_keypoint(
    field: &GradientField,
    kp: &Keypoint,
    params: &DescriptorParams,
) -> Option<(f32, Descriptor)> {
    let theta = if params.oriented {
        dominant_orientation(field, kp, params)
    } else {
        0.0
    };
    let (sin_t, cos_t) = theta.sin_cos();
    let radius = params.support_radius.max(1.0);
    let samples = GRID * SAMPLES_PER_CELL;
    let step = 2.0 * radius / samples as f32;
    let denom = 2.0 * radius * radius;

    let mut desc = [0.0f32; DESCRIPTOR_LEN];
    for i in 0..samples {
        let v = (i as f32 + 0.5) * step - radius;
        for j in 0..samples {
            let u = (j as f32 + 0.5) * step - radius;
            let x = kp.position.x + u * cos_t - v * sin_t;
            let y = kp.position.y + u * sin_t + v * cos_t;
            let (gx, gy) = field.at(x, y);
            let mag = gx.hypot(gy);
            if mag <= 0.0 {
                continue;
            }
            let weight = (-(u * u + v * v) / denom).exp();
            let rel = (gy.atan2(gx) - theta).rem_euclid(TAU);
            let fb = rel / TAU * ORI_BINS as f32;
            let b0 = fb.floor() as usize % ORI_BINS;
            let frac = fb - fb.floor();
            let b1 = (b0 + 1) % ORI_BINS;

            let cell = (i / SAMPLES_PER_CELL) * GRID + j / SAMPLES_PER_CELL;
            let base = cell * ORI_BINS;
            desc[base + b0] += weight * mag * (1.0 - frac);
            desc[base + b1] += weight * mag * frac;
        }
    }

    if !normalize(&mut desc) {
        return None;
    }
    for x in desc.iter_mut() {
        *x = x.min(params.clamp);
    }
    normalize(&mut desc).then_some((theta, desc))
}

/// Squared L2 distance between two descriptors.
#[inline]
pub fn distance_sq(a: &Descriptor, b: &Descriptor) -> f32 {
    a.iter().zip(b).map(|(p, q)| (p - q) * (p - q)).sum()
}
