#![allow(dead_code)]

use nalgebra::Point2;
use pianotrack_core::{homography_from_4pt, warp_into, GrayImage, Homography};
use pianotrack_template::{synthesize, KeyboardSpec};

/// Deterministic clutter of overlapping gray rectangles.
pub fn clutter(w: usize, h: usize, seed: u64) -> GrayImage {
    let mut state = seed;
    let mut next = |m: usize| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) as usize) % m
    };
    let mut img = GrayImage::new(w, h);
    img.data.fill(100);
    for _ in 0..60 {
        let x0 = next(w);
        let y0 = next(h);
        let rw = 6 + next(30);
        let rh = 6 + next(24);
        let v = (20 + next(215)) as u8;
        for y in y0..(y0 + rh).min(h) {
            for x in x0..(x0 + rw).min(w) {
                img.set(x, y, v);
            }
        }
    }
    img
}

/// Smooth two-frequency texture; photometric costs on it are well behaved.
pub fn smooth_texture(w: usize, h: usize) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = 128.0 + 55.0 * (x as f64 / 6.0).sin() + 55.0 * (y as f64 / 5.0).cos();
            img.set(x, y, v.round().clamp(0.0, 255.0) as u8);
        }
    }
    img
}

/// Copy of `src` moved by `(dx, dy)`; uncovered pixels are black.
pub fn shifted(src: &GrayImage, dx: usize, dy: usize) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    for y in dy..src.height {
        for x in dx..src.width {
            out.set(x, y, src.get(x - dx, y - dy));
        }
    }
    out
}

/// Full 88-key template (545 × 66) in grayscale.
pub fn keyboard_template() -> GrayImage {
    synthesize(&KeyboardSpec::default())
        .expect("default spec renders")
        .to_gray()
}

/// Project `template` into a `w × h` frame so that its corners land on
/// `quad` (TL, TR, BR, BL). Returns the frame and the frame-from-template map.
pub fn project(
    template: &GrayImage,
    quad: [Point2<f32>; 4],
    w: usize,
    h: usize,
) -> (GrayImage, Homography) {
    let corners = [
        Point2::new(0.0, 0.0),
        Point2::new(template.width as f32, 0.0),
        Point2::new(template.width as f32, template.height as f32),
        Point2::new(0.0, template.height as f32),
    ];
    let h_frame = homography_from_4pt(&corners, &quad).expect("quad is non-degenerate");
    let frame = warp_into(&template.view(), &h_frame, w, h).expect("warp");
    (frame, h_frame)
}

pub fn assert_maps_near(h: &Homography, from: Point2<f32>, to: Point2<f32>, tol: f32) {
    let p = h.apply(from);
    assert!(
        (p.x - to.x).abs() < tol && (p.y - to.y).abs() < tol,
        "({:.2}, {:.2}) mapped to ({:.2}, {:.2}), expected ({:.2}, {:.2})",
        from.x,
        from.y,
        p.x,
        p.y,
        to.x,
        to.y
    );
}
