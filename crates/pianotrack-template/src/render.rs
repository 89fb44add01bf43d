use crate::layout::{KeyboardLayout, KeyboardSpec};
use crate::TemplateError;
use pianotrack_core::RgbImage;

/// Render a frontal keyboard template.
///
/// Deterministic for a given spec: background, felt strip across the top,
/// white keys, then black keys on top. Each key is filled and outlined with
/// a 1 px border.
pub fn synthesize(spec: &KeyboardSpec) -> Result<RgbImage, TemplateError> {
    let layout = KeyboardLayout::new(spec)?;
    Ok(render_layout(&layout, spec))
}

/// Paint an already resolved layout with the colors of `spec`.
pub fn render_layout(layout: &KeyboardLayout, spec: &KeyboardSpec) -> RgbImage {
    let colors = &spec.colors;
    let mut img = RgbImage::filled(layout.width, layout.height, colors.background);
    img.fill_rect(0, 0, layout.width as i64, layout.felt_bottom, colors.felt);

    for key in &layout.keys {
        let fill = if key.is_black {
            colors.black_key
        } else {
            colors.white_key
        };
        img.fill_rect(key.x0, key.y0, key.x1, key.y1, fill);
        img.outline_rect(key.x0, key.y0, key.x1, key.y1, colors.border);
    }
    log::debug!(
        "synthesized {}-key template at {} px/white key: {}x{}",
        spec.key_count,
        spec.pixels_per_white_key,
        img.width,
        img.height
    );
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateColors;

    #[test]
    fn synthesis_is_deterministic() {
        let spec = KeyboardSpec::default();
        let a = synthesize(&spec).expect("template");
        let b = synthesize(&spec).expect("template");
        assert_eq!(a, b);
        assert_eq!((a.width, a.height), (545, 66));
    }

    #[test]
    fn key_interiors_and_borders_use_their_colors() {
        let spec = KeyboardSpec::with_keys(12, 0, 22.5);
        let img = synthesize(&spec).expect("template");
        let colors = TemplateColors::default();
        // First white key spans x 0..=22, y 2..=148 (clipped to 147).
        assert_eq!(img.get(5, 120), colors.white_key);
        assert_eq!(img.get(0, 120), colors.border);
        // First black key spans x 13..=27, y 2..=100.
        assert_eq!(img.get(20, 50), colors.black_key);
        assert_eq!(img.get(13, 50), colors.border);
        // Felt strip rows 0..=1 above the keys.
        assert_eq!(img.get(80, 0), colors.felt);
        assert_eq!(img.get(80, 1), colors.felt);
    }

    #[test]
    fn custom_colors_are_honored() {
        let mut spec = KeyboardSpec::with_keys(3, 0, 30.0);
        spec.colors.white_key = [200, 190, 180];
        spec.colors.background = [9, 9, 9];
        let img = synthesize(&spec).expect("template");
        assert_eq!(img.get(10, 100), [200, 190, 180]);
        assert_eq!(img.get(img.width - 1, img.height - 1), [9, 9, 9]);
    }
}
