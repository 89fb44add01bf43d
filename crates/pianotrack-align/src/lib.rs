//! Homography estimation between a keyboard template and live frames.
//!
//! Four independent estimators, all producing an [`Alignment`]:
//!
//! - [`FeatureMatcher`] aligns a frame to a fixed reference image through
//!   local features and RANSAC.
//! - [`VideoStabilizer`] relates each frame to the previous one.
//! - [`find_homography`] recovers the frame-to-template transform from four
//!   marked corners given in unknown order.
//! - [`HomographyRefiner`] polishes a transform by minimizing the photometric
//!   warp error with Nelder–Mead.
//!
//! Per-frame failures are values ([`UnavailableReason`]), never errors.
//! Sessions are plain values threaded through each call by the caller.
//!
//! ```no_run
//! use nalgebra::Point2;
//! use pianotrack_align::{find_homography, CornerSearchMode, HomographyRefiner, RefinerSession};
//! use pianotrack_core::GrayImage;
//!
//! let frame = GrayImage::new(640, 480);
//! let template = GrayImage::new(545, 66);
//! let marked = [
//!     Point2::new(40.0, 300.0),
//!     Point2::new(600.0, 310.0),
//!     Point2::new(610.0, 380.0),
//!     Point2::new(30.0, 372.0),
//! ];
//! let coarse = find_homography(&frame.view(), &template.view(), &marked, CornerSearchMode::Rotations);
//! if let Some(fit) = coarse.fit() {
//!     let session = RefinerSession::new(fit.homography);
//!     let (_session, refined) =
//!         HomographyRefiner::default().refine(session, &frame.view(), &[template.view()]);
//!     println!("{:?}", refined.homography());
//! }
//! ```

mod alignment;
mod corner_search;
mod error;
mod matcher;
pub mod nelder_mead;
mod refiner;
mod stabilizer;

pub use alignment::{AlignedFit, Alignment, HasHomography, UnavailableReason};
pub use corner_search::{
    candidate_orderings, find_homography, find_homography_confirmed, template_corners,
    AlignmentConfirmer, CornerFit, CornerOrdering, CornerSearchMode, CornerSearchOutcome,
};
pub use error::CalibrationError;
pub use matcher::{FeatureMatcher, MatchReport, MatcherParams};
pub use nelder_mead::NelderMeadParams;
pub use refiner::{warp_cost, HomographyRefiner, RefineOutcome, RefinerParams, RefinerSession};
pub use stabilizer::{StabilizerParams, StabilizerSession, StabilizerStep, VideoStabilizer};
