//! Core types and utilities for keyboard tracking.
//!
//! This crate is intentionally small and purely geometric. It holds the
//! projective transform type, homography estimation (exact 4-point, DLT,
//! RANSAC), the lightweight image containers every other crate works on,
//! and perspective warping. It does *not* depend on any concrete image
//! decoding library.
//!
//! Pixel convention: pixel `(x, y)` covers `[x, x+1) × [y, y+1)`, so its
//! center is `(x + 0.5, y + 0.5)` and an image's geometric corners are
//! `(0, 0)`, `(w, 0)`, `(w, h)`, `(0, h)`.

mod homography;
mod image;
mod logger;
mod ransac;

pub use homography::{
    estimate_homography, homography_from_4pt, warp_into, warp_perspective_gray, Homography,
};
pub use image::{
    l2_distance, sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView, ImageError,
    RgbImage,
};
pub use ransac::{fit_homography_ransac, HomographyError, RansacFit, RansacParams};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
