//! Float image buffers, separable Gaussian smoothing and Sobel gradients.

use pianotrack_core::GrayImageView;

/// Row-major `f32` plane used for intermediate filter results.
#[derive(Clone, Debug)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_gray(src: &GrayImageView<'_>) -> Self {
        Self {
            width: src.width,
            height: src.height,
            data: src.data.iter().map(|&v| v as f32).collect(),
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Read with coordinates clamped to the border.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.get(cx, cy)
    }

    /// Bilinear read with taps on integer coordinates, clamped at the border.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        if self.width == 0 || self.height == 0 || !x.is_finite() || !y.is_finite() {
            return 0.0;
        }
        let x0 = x.floor();
        let y0 = y.floor();
        let (fx, fy) = (x - x0, y - y0);
        let (xi, yi) = (x0 as isize, y0 as isize);
        let p00 = self.get_clamped(xi, yi);
        let p10 = self.get_clamped(xi + 1, yi);
        let p01 = self.get_clamped(xi, yi + 1);
        let p11 = self.get_clamped(xi + 1, yi + 1);
        let a = p00 + fx * (p10 - p00);
        let b = p01 + fx * (p11 - p01);
        a + fy * (b - a)
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Normalized 1-D Gaussian with radius `ceil(3σ)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 || !sigma.is_finite() {
        return vec![1.0];
    }
    let radius = (3.0 * sigma).ceil() as isize;
    let denom = 2.0 * sigma * sigma;
    let mut k: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

fn convolve_rows(src: &FloatImage, kernel: &[f32]) -> FloatImage {
    let half = (kernel.len() / 2) as isize;
    let mut dst = FloatImage::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let mut acc = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = x as isize + ki as isize - half;
                acc += src.get_clamped(sx, y as isize) * kv;
            }
            dst.set(x, y, acc);
        }
    }
    dst
}

fn convolve_cols(src: &FloatImage, kernel: &[f32]) -> FloatImage {
    let half = (kernel.len() / 2) as isize;
    let mut dst = FloatImage::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let mut acc = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = y as isize + ki as isize - half;
                acc += src.get_clamped(x as isize, sy) * kv;
            }
            dst.set(x, y, acc);
        }
    }
    dst
}

/// Separable Gaussian blur; `sigma <= 0` returns a copy.
pub fn gaussian_blur(src: &FloatImage, sigma: f32) -> FloatImage {
    if src.width == 0 || src.height == 0 {
        return src.clone();
    }
    let k = gaussian_kernel(sigma);
    if k.len() == 1 {
        return src.clone();
    }
    convolve_cols(&convolve_rows(src, &k), &k)
}

/// 3×3 Sobel derivatives scaled by 1/8, so a unit ramp yields 1.0.
pub fn sobel(src: &FloatImage) -> (FloatImage, FloatImage) {
    let mut gx = FloatImage::new(src.width, src.height);
    let mut gy = FloatImage::new(src.width, src.height);
    if src.width == 0 || src.height == 0 {
        return (gx, gy);
    }
    for y in 0..src.height as isize {
        for x in 0..src.width as isize {
            let p = |dx: isize, dy: isize| src.get_clamped(x + dx, y + dy);
            let dx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let dy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            gx.set(x as usize, y as usize, dx / 8.0);
            gy.set(x as usize, y as usize, dy / 8.0);
        }
    }
    (gx, gy)
}
