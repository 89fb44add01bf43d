//! Gaussian scale pyramid with a fractional level-to-level factor.
//!
//! Every level is resampled directly from the base image: blur with an
//! anti-aliasing sigma matched to the level's downscale, then bilinear
//! decimation on pixel centers. Level `k` covers the base at
//! `scale_factor^k` base pixels per level pixel.

use crate::filter::{gaussian_blur, FloatImage};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidParams {
    /// Number of levels including the base; `1` disables the pyramid.
    pub levels: usize,
    /// Downscale between consecutive levels, `> 1`.
    pub scale_factor: f32,
    /// Levels whose shorter side would drop below this are not built.
    pub min_size: usize,
}

impl Default for PyramidParams {
    fn default() -> Self {
        Self {
            levels: 4,
            // Three levels per octave.
            scale_factor: 2f32.powf(1.0 / 3.0),
            min_size: 24,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PyramidLevel {
    pub image: FloatImage,
    /// Base pixels per level pixel.
    pub scale: f32,
}

impl PyramidLevel {
    /// Map a pixel-center coordinate on this level back to the base image.
    #[inline]
    pub fn to_base(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale, y * self.scale)
    }
}

#[derive(Clone, Debug)]
pub struct ScalePyramid {
    pub levels: Vec<PyramidLevel>,
}

impl ScalePyramid {
    pub fn build(base: FloatImage, params: &PyramidParams) -> Self {
        let factor = if params.scale_factor.is_finite() && params.scale_factor > 1.0 {
            params.scale_factor
        } else {
            2.0
        };
        let wanted = params.levels.max(1);
        let mut levels = Vec::with_capacity(wanted);

        for k in 1..wanted {
            let scale = factor.powi(k as i32);
            let w = (base.width as f32 / scale).floor() as usize;
            let h = (base.height as f32 / scale).floor() as usize;
            if w.min(h) < params.min_size {
                break;
            }
            levels.push(PyramidLevel {
                image: downsample(&base, scale, w, h),
                scale,
            });
        }
        levels.insert(
            0,
            PyramidLevel {
                image: base,
                scale: 1.0,
            },
        );
        log::trace!("pyramid: {} levels (factor {factor:.3})", levels.len());
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Blur `src` for a `scale`× reduction and resample it to `w × h`.
fn downsample(src: &FloatImage, scale: f32, w: usize, h: usize) -> FloatImage {
    // Assumes the base already carries about half a pixel of blur.
    let sigma = 0.5 * (scale * scale - 1.0).max(0.0).sqrt();
    let blurred = gaussian_blur(src, sigma);
    let mut out = FloatImage::new(w, h);
    for y in 0..h {
        let sy = (y as f32 + 0.5) * scale - 0.5;
        for x in 0..w {
            let sx = (x as f32 + 0.5) * scale - 0.5;
            out.set(x, y, blurred.sample(sx, sy));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(w: usize, h: usize) -> FloatImage {
        let mut img = FloatImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.set(x, y, x as f32 * 2.0);
            }
        }
        img
    }

    #[test]
    fn levels_shrink_by_the_scale_factor() {
        let params = PyramidParams {
            levels: 4,
            scale_factor: 2.0,
            min_size: 8,
        };
        let p = ScalePyramid::build(ramp(128, 64), &params);
        let sizes: Vec<_> = p
            .levels
            .iter()
            .map(|l| (l.image.width, l.image.height))
            .collect();
        assert_eq!(sizes, vec![(128, 64), (64, 32), (32, 16), (16, 8)]);
        assert_eq!(p.levels[2].scale, 4.0);
    }

    #[test]
    fn small_images_stop_early() {
        let params = PyramidParams {
            levels: 6,
            scale_factor: 2.0,
            min_size: 16,
        };
        let p = ScalePyramid::build(ramp(64, 40), &params);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn resampling_keeps_pixel_centers_aligned() {
        let params = PyramidParams {
            levels: 2,
            scale_factor: 1.5,
            min_size: 8,
        };
        let base = ramp(90, 30);
        let p = ScalePyramid::build(base.clone(), &params);
        let level = &p.levels[1];
        // Level pixel 20 has its center at base 30.75, i.e. tap 30.25.
        let (bx, _) = level.to_base(20.5, 0.5);
        assert_abs_diff_eq!(bx, 30.75, epsilon = 1e-5);
        assert_abs_diff_eq!(level.image.get(20, 5), base.sample(bx - 0.5, 5.0), epsilon = 1e-2);
    }
}
