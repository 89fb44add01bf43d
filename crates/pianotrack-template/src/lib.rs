//! Synthetic keyboard templates.
//!
//! A template is the frontal, axis-aligned view of a keyboard that live
//! frames are aligned against. Key proportions follow a standard piano; the
//! output scale is set by the number of pixels per white key.
//!
//! ```
//! use pianotrack_template::{synthesize, KeyboardLayout, KeyboardSpec};
//!
//! let spec = KeyboardSpec::default(); // 88 keys from A, 10 px per white key
//! let img = synthesize(&spec).unwrap();
//! let layout = KeyboardLayout::new(&spec).unwrap();
//! assert_eq!((img.width, img.height), (layout.width, layout.height));
//! assert_eq!(layout.white_keys().count(), 52);
//! ```

mod error;
mod layout;
mod png_io;
mod render;

pub use error::TemplateError;
pub use layout::{is_black_pitch_class, KeyRect, KeyboardLayout, KeyboardSpec, TemplateColors};
pub use png_io::{encode_png, write_png};
pub use render::{render_layout, synthesize};
