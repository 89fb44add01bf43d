#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("buffer length {got} does not match {width}x{height}x{channels} (expected {expected})")]
    BufferSize {
        width: usize,
        height: usize,
        channels: usize,
        expected: usize,
        got: usize,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        check_len(width, height, 1, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }
}

/// Interleaved 8-bit RGB image, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>, // len = w*h*3
}

impl RgbImage {
    pub fn filled(width: usize, height: usize, color: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        check_len(width, height, 3, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&c);
    }

    /// Fill the inclusive pixel rectangle `[x0, x1] × [y0, y1]`, clipped to
    /// the image.
    pub fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        let Some((x0, y0, x1, y1)) = self.clip(x0, y0, x1, y1) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.set(x, y, color);
            }
        }
    }

    /// Draw the 1 px outline of the inclusive rectangle `[x0, x1] × [y0, y1]`.
    pub fn outline_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        let (lx, hx) = (x0.min(x1), x0.max(x1));
        let (ly, hy) = (y0.min(y1), y0.max(y1));
        self.fill_rect(lx, ly, hx, ly, color);
        self.fill_rect(lx, hy, hx, hy, color);
        self.fill_rect(lx, ly, lx, hy, color);
        self.fill_rect(hx, ly, hx, hy, color);
    }

    fn clip(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> Option<(usize, usize, usize, usize)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let (lx, hx) = (x0.min(x1).max(0), x0.max(x1).min(self.width as i64 - 1));
        let (ly, hy) = (y0.min(y1).max(0), y0.max(y1).min(self.height as i64 - 1));
        if lx > hx || ly > hy {
            return None;
        }
        Some((lx as usize, ly as usize, hx as usize, hy as usize))
    }

    /// BT.601 luma conversion.
    pub fn to_gray(&self) -> GrayImage {
        let data = self
            .data
            .chunks_exact(3)
            .map(|c| {
                let y = 0.299 * c[0] as f32 + 0.587 * c[1] as f32 + 0.114 * c[2] as f32;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

fn check_len(width: usize, height: usize, channels: usize, got: usize) -> Result<(), ImageError> {
    let expected = width * height * channels;
    if got != expected {
        return Err(ImageError::BufferSize {
            width,
            height,
            channels,
            expected,
            got,
        });
    }
    Ok(())
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample with taps on integer coordinates; outside reads as 0.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    if !x.is_finite() || !y.is_finite() {
        return 0.0;
    }
    // Every tap is outside; also keeps the integer casts below in range.
    if x <= -1.0 || y <= -1.0 || x >= src.width as f32 || y >= src.height as f32 {
        return 0.0;
    }
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}

/// Elementwise L2 norm of `a - b`; `None` if the dimensions differ.
pub fn l2_distance(a: &GrayImageView<'_>, b: &GrayImageView<'_>) -> Option<f64> {
    if a.width != b.width || a.height != b.height || a.data.len() != b.data.len() {
        return None;
    }
    let sum: u64 = a
        .data
        .iter()
        .zip(b.data)
        .map(|(&p, &q)| {
            let d = p as i64 - q as i64;
            (d * d) as u64
        })
        .sum();
    Some((sum as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_between_taps() {
        let data = [0u8, 100, 200, 100];
        let view = GrayImageView {
            width: 2,
            height: 2,
            data: &data,
        };
        assert_eq!(sample_bilinear(&view, 0.0, 0.0), 0.0);
        assert_eq!(sample_bilinear(&view, 0.5, 0.0), 50.0);
        assert_eq!(sample_bilinear(&view, 0.5, 0.5), 100.0);
        assert_eq!(sample_bilinear(&view, -5.0, 0.0), 0.0);
    }

    #[test]
    fn bilinear_far_outside_reads_zero() {
        let data = [255u8; 4];
        let view = GrayImageView {
            width: 2,
            height: 2,
            data: &data,
        };
        assert_eq!(sample_bilinear(&view, 3.0e9, 0.5), 0.0);
        assert_eq!(sample_bilinear(&view, 0.5, -3.0e9), 0.0);
        assert_eq!(sample_bilinear(&view, f32::MAX, f32::MAX), 0.0);
        assert_eq!(sample_bilinear(&view, 2.0, 0.0), 0.0);
        assert!(sample_bilinear(&view, 1.5, 0.0) > 0.0);
    }

    #[test]
    fn l2_distance_requires_equal_sizes() {
        let a = GrayImage::from_raw(2, 1, vec![3, 4]).expect("image");
        let b = GrayImage::new(2, 1);
        let c = GrayImage::new(1, 2);
        assert_eq!(l2_distance(&a.view(), &b.view()), Some(5.0));
        assert_eq!(l2_distance(&a.view(), &a.view()), Some(0.0));
        assert!(l2_distance(&a.view(), &c.view()).is_none());
    }

    #[test]
    fn rgb_rectangles_clip_and_convert() {
        let mut img = RgbImage::filled(4, 3, [10, 10, 10]);
        img.fill_rect(2, 1, 10, 10, [255, 255, 255]);
        img.outline_rect(0, 0, 1, 1, [0, 0, 0]);
        assert_eq!(img.get(3, 2), [255, 255, 255]);
        assert_eq!(img.get(2, 0), [10, 10, 10]);
        assert_eq!(img.get(1, 1), [0, 0, 0]);

        let gray = img.to_gray();
        assert_eq!(gray.get(3, 2), 255);
        assert_eq!(gray.get(2, 0), 10);
        assert_eq!(gray.get(0, 0), 0);
    }

    #[test]
    fn from_raw_checks_length() {
        assert!(GrayImage::from_raw(3, 3, vec![0; 8]).is_err());
        assert!(RgbImage::from_raw(2, 2, vec![0; 12]).is_ok());
    }
}
