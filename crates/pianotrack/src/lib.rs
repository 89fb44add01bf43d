//! High-level facade for the `pianotrack-*` workspace.
//!
//! This crate provides:
//! - re-exports of the template, feature and alignment crates
//! - JSON configuration and per-frame reports ([`io`])
//! - a frame-by-frame [`Tracker`] combining motion estimation and refinement
//! - (feature `image`) conversions from and to the `image` crate ([`frames`])
//!
//! ## Quickstart
//!
//! ```no_run
//! use nalgebra::Point2;
//! use pianotrack::align::{find_homography, CornerSearchMode};
//! use pianotrack::frames::load_gray;
//! use pianotrack::template::{synthesize, KeyboardSpec};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = synthesize(&KeyboardSpec::default())?.to_gray();
//! let frame = load_gray("frame0001.png")?;
//! let marked = [
//!     Point2::new(112.0, 300.0),
//!     Point2::new(1180.0, 288.0),
//!     Point2::new(1195.0, 402.0),
//!     Point2::new(98.0, 415.0),
//! ];
//! let fit = find_homography(&frame.view(), &template.view(), &marked, CornerSearchMode::Rotations);
//! println!("frame -> template: {:?}", fit.homography());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `pianotrack::core`: homographies, RANSAC, image containers, warping.
//! - `pianotrack::features`: Harris keypoints, descriptors, ratio-test matching.
//! - `pianotrack::template`: keyboard layout and template rendering.
//! - `pianotrack::align`: matcher, stabilizer, corner search, refiner.

pub use pianotrack_align as align;
pub use pianotrack_core as core;
pub use pianotrack_features as features;
pub use pianotrack_template as template;

pub use pianotrack_align::{Alignment, UnavailableReason};
pub use pianotrack_core::Homography;

pub mod io;
mod track;

#[cfg(feature = "image")]
pub mod frames;

pub use track::Tracker;

/// Install process-wide logging at `level`.
///
/// With the `tracing` feature, `log` records are bridged into a `tracing`
/// subscriber and `RUST_LOG` takes precedence; otherwise the plain stderr
/// logger from `pianotrack-core` is used.
pub fn init_logging(level: log::LevelFilter) {
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!(
                "warn,pianotrack={}",
                level.as_str().to_ascii_lowercase()
            ))
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = pianotrack_core::init_with_level(level);
    }
}
