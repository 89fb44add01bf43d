//! Physical key geometry and its projection onto the template pixel grid.

use crate::TemplateError;
use serde::{Deserialize, Serialize};

// Dimensions in the keyboard's own units; only ratios matter.
const WHITE_KEY_WIDTH: f64 = 2.25;
const WHITE_KEY_HEIGHT: f64 = 14.6;
const BLACK_KEY_WIDTH: f64 = 1.40;
const BLACK_KEY_HEIGHT: f64 = 9.8;
const FELT_HEIGHT: f64 = 0.2;
const NARROW_GAP: f64 = 0.1;
const WIDE_GAP: f64 = 0.125;

/// Black pitch classes and their offset from the preceding white key's
/// left edge.
const BLACK_KEY_OFFSETS: [(u8, f64); 5] = [(1, 1.3), (3, 1.8), (6, 1.2), (8, 1.6), (10, 1.9)];

/// RGB colors used when rendering a template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateColors {
    pub white_key: [u8; 3],
    pub black_key: [u8; 3],
    pub felt: [u8; 3],
    pub border: [u8; 3],
    pub background: [u8; 3],
}

impl Default for TemplateColors {
    fn default() -> Self {
        Self {
            white_key: [255, 255, 255],
            black_key: [0, 0, 0],
            felt: [77, 0, 0],
            border: [128, 128, 128],
            background: [128, 128, 128],
        }
    }
}

/// What to draw: how many keys, where the keyboard starts, and how large.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardSpec {
    /// Horizontal pixels per white key; sets the template scale.
    pub pixels_per_white_key: f64,
    pub key_count: usize,
    /// Pitch class of the lowest key, 0 = C .. 11 = B. A standard piano
    /// starts on A (9).
    pub start_pitch_class: u8,
    pub colors: TemplateColors,
}

impl Default for KeyboardSpec {
    fn default() -> Self {
        Self {
            pixels_per_white_key: 10.0,
            key_count: 88,
            start_pitch_class: 9,
            colors: TemplateColors::default(),
        }
    }
}

impl KeyboardSpec {
    pub fn with_keys(key_count: usize, start_pitch_class: u8, pixels_per_white_key: f64) -> Self {
        Self {
            pixels_per_white_key,
            key_count,
            start_pitch_class,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        let px = self.pixels_per_white_key;
        if !px.is_finite() || px <= 0.0 {
            return Err(TemplateError::InvalidScale(px));
        }
        if self.start_pitch_class > 11 {
            return Err(TemplateError::InvalidPitchClass(self.start_pitch_class));
        }
        Ok(())
    }
}

/// `true` for the five sharps/flats of the chromatic scale.
pub fn is_black_pitch_class(pc: u8) -> bool {
    BLACK_KEY_OFFSETS.iter().any(|&(b, _)| b == pc)
}

/// One key in template pixels; the rectangle is inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRect {
    /// Position on the keyboard, 0 = lowest key.
    pub index: usize,
    pub pitch_class: u8,
    pub is_black: bool,
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl KeyRect {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x0 + self.x1 + 1) as f64 * 0.5,
            (self.y0 + self.y1 + 1) as f64 * 0.5,
        )
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.x0..=self.x1).contains(&x) && (self.y0..=self.y1).contains(&y)
    }
}

/// Resolved geometry of a keyboard template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyboardLayout {
    pub width: usize,
    pub height: usize,
    /// Pixels per keyboard unit.
    pub scale: f64,
    /// Last row (inclusive) of the felt strip.
    pub felt_bottom: i64,
    /// White keys first, then black keys, each in keyboard order. This is
    /// also the paint order.
    pub keys: Vec<KeyRect>,
}

struct KeyStart {
    index: usize,
    pitch_class: u8,
    left: f64,
}

impl KeyboardLayout {
    pub fn new(spec: &KeyboardSpec) -> Result<Self, TemplateError> {
        spec.validate()?;

        let mut whites: Vec<KeyStart> = Vec::new();
        let mut blacks: Vec<KeyStart> = Vec::new();
        let mut first_white_left = 0.0;

        for index in 0..spec.key_count {
            let pitch_class = ((spec.start_pitch_class as usize + index) % 12) as u8;
            match BLACK_KEY_OFFSETS.iter().find(|&&(pc, _)| pc == pitch_class) {
                Some(&(_, offset)) => {
                    let left = match whites.last() {
                        Some(prev) => prev.left + offset,
                        None => {
                            // Leading black key: shift the whites right by one key.
                            first_white_left = WHITE_KEY_WIDTH + NARROW_GAP;
                            offset
                        }
                    };
                    blacks.push(KeyStart {
                        index,
                        pitch_class,
                        left,
                    });
                }
                None => {
                    let gap = if pitch_class == 0 || pitch_class == 5 {
                        WIDE_GAP
                    } else {
                        NARROW_GAP
                    };
                    let left = match whites.last() {
                        Some(prev) => prev.left + WHITE_KEY_WIDTH + gap,
                        None => first_white_left,
                    };
                    whites.push(KeyStart {
                        index,
                        pitch_class,
                        left,
                    });
                }
            }
        }

        let mut extent: f64 = 0.0;
        if let Some(w) = whites.last() {
            extent = extent.max(w.left + WHITE_KEY_WIDTH);
        }
        if let Some(b) = blacks.last() {
            extent = extent.max(b.left + BLACK_KEY_WIDTH);
        }
        let total_height = WHITE_KEY_HEIGHT + FELT_HEIGHT;
        let scale = spec.pixels_per_white_key / WHITE_KEY_WIDTH;

        let width = ((scale * extent).ceil() as usize).max(1);
        let height = ((scale * total_height).ceil() as usize).max(1);

        let top = (scale * FELT_HEIGHT).floor() as i64;
        let rect = |k: &KeyStart, w: f64, h: f64, is_black: bool| {
            let x0 = (scale * k.left).floor() as i64;
            KeyRect {
                index: k.index,
                pitch_class: k.pitch_class,
                is_black,
                x0,
                y0: top,
                x1: x0 + (scale * w).floor() as i64,
                y1: top + (scale * h).floor() as i64,
            }
        };

        let keys = whites
            .iter()
            .map(|k| rect(k, WHITE_KEY_WIDTH, WHITE_KEY_HEIGHT, false))
            .chain(
                blacks
                    .iter()
                    .map(|k| rect(k, BLACK_KEY_WIDTH, BLACK_KEY_HEIGHT, true)),
            )
            .collect();

        Ok(Self {
            width,
            height,
            scale,
            felt_bottom: top,
            keys,
        })
    }

    pub fn white_keys(&self) -> impl Iterator<Item = &KeyRect> {
        self.keys.iter().filter(|k| !k.is_black)
    }

    pub fn black_keys(&self) -> impl Iterator<Item = &KeyRect> {
        self.keys.iter().filter(|k| k.is_black)
    }

    /// Key under a template pixel; black keys win where they overlap whites.
    pub fn key_at(&self, x: i64, y: i64) -> Option<&KeyRect> {
        self.keys.iter().rev().find(|k| k.contains(x, y))
    }
}
