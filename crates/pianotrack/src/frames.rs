//! Conversions between the `image` crate and the workspace's image types.

use crate::io::{IoError, TemplateSource};
use pianotrack_core::{GrayImage, GrayImageView, RgbImage};
use pianotrack_template::synthesize;
use std::path::Path;

/// Borrow an `image::GrayImage` as a core view.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn from_luma(img: ::image::GrayImage) -> Result<GrayImage, IoError> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    Ok(GrayImage::from_raw(w, h, img.into_raw())?)
}

pub fn to_luma(img: &GrayImage) -> Option<::image::GrayImage> {
    ::image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
}

pub fn to_rgb(img: &RgbImage) -> Option<::image::RgbImage> {
    ::image::RgbImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
}

/// Decode any supported image file to 8-bit grayscale.
pub fn load_gray(path: impl AsRef<Path>) -> Result<GrayImage, IoError> {
    let path = path.as_ref();
    let img = ::image::open(path).map_err(|source| IoError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    from_luma(img.to_luma8())
}

/// The grayscale template a config points at.
pub fn load_template(source: &TemplateSource) -> Result<GrayImage, IoError> {
    match source {
        TemplateSource::Synthesize(spec) => Ok(synthesize(spec)?.to_gray()),
        TemplateSource::File(path) => load_gray(path),
    }
}
