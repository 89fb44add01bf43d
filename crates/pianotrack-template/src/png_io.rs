use crate::TemplateError;
use pianotrack_core::RgbImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Encode an RGB image as an 8-bit PNG into `out`.
pub fn encode_png<W: Write>(img: &RgbImage, out: W) -> Result<(), TemplateError> {
    let too_large = || TemplateError::TooLarge {
        width: img.width,
        height: img.height,
    };
    let w = u32::try_from(img.width).map_err(|_| too_large())?;
    let h = u32::try_from(img.height).map_err(|_| too_large())?;

    let mut encoder = png::Encoder::new(out, w, h);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&img.data)?;
    writer.finish()?;
    Ok(())
}

/// Write a template to disk as PNG.
pub fn write_png(img: &RgbImage, path: impl AsRef<Path>) -> Result<(), TemplateError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    encode_png(img, &mut buf)?;
    buf.flush()?;
    log::info!("wrote {}x{} template to {}", img.width, img.height, path.display());
    Ok(())
}
