//! Coarse alignment from four marked corners in unknown order.
//!
//! The four marked frame points are assigned to the template's geometric
//! corners under every candidate labeling; each labeling gives an exact
//! homography, the frame is warped into the template and the labeling with
//! the smallest L2 image distance wins.

use crate::alignment::{Alignment, HasHomography, UnavailableReason};
use crate::CalibrationError;
use nalgebra::Point2;
use pianotrack_core::{homography_from_4pt, l2_distance, warp_into, GrayImage, GrayImageView, Homography};
use serde::{Deserialize, Serialize};

/// Which corner labelings to try.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerSearchMode {
    /// The 4 cyclic rotations; assumes the points were marked in winding
    /// order.
    #[default]
    Rotations,
    /// All 24 orderings, lexicographic.
    Permutations,
}

/// `marked[i]` was matched to template corner `ordering[i]`
/// (0 = top-left, 1 = top-right, 2 = bottom-right, 3 = bottom-left).
pub type CornerOrdering = [usize; 4];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerFit {
    /// Maps frame pixels to template pixels.
    pub homography: Homography,
    /// L2 distance between the warped frame and the template.
    pub distance: f64,
    pub ordering: CornerOrdering,
}

impl HasHomography for CornerFit {
    fn homography(&self) -> &Homography {
        &self.homography
    }
}

pub type CornerSearchOutcome = Alignment<CornerFit>;

/// Decides whether a candidate alignment is acceptable, typically by
/// showing the warped frame to a person.
pub trait AlignmentConfirmer {
    fn confirm(&mut self, warped: &GrayImage, homography: &Homography) -> bool;
}

impl<F> AlignmentConfirmer for F
where
    F: FnMut(&GrayImage, &Homography) -> bool,
{
    fn confirm(&mut self, warped: &GrayImage, homography: &Homography) -> bool {
        self(warped, homography)
    }
}

/// Geometric corners of a `w × h` image: TL, TR, BR, BL.
pub fn template_corners(width: usize, height: usize) -> [Point2<f32>; 4] {
    let (w, h) = (width as f32, height as f32);
    [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ]
}

/// Candidate labelings in enumeration order.
pub fn candidate_orderings(mode: CornerSearchMode) -> Vec<CornerOrdering> {
    match mode {
        // Same as rolling the corner list right by `shift`.
        CornerSearchMode::Rotations => (0..4)
            .map(|shift| std::array::from_fn(|i| (i + 4 - shift) % 4))
            .collect(),
        CornerSearchMode::Permutations => {
            let mut out = Vec::with_capacity(24);
            let mut p = [0usize, 1, 2, 3];
            out.push(p);
            while next_permutation(&mut p) {
                out.push(p);
            }
            out
        }
    }
}

fn next_permutation(p: &mut [usize; 4]) -> bool {
    let Some(i) = (0..3).rev().find(|&i| p[i] < p[i + 1]) else {
        return false;
    };
    let j = (i + 1..4).rev().find(|&j| p[j] > p[i]).unwrap_or(i + 1);
    p.swap(i, j);
    p[i + 1..].reverse();
    true
}

/// Exact fit for one labeling. Pairs are sorted by frame point first, so a
/// given set of pairs yields the same matrix whatever order it came in.
fn fit_labeling(
    marked: &[Point2<f32>; 4],
    corners: &[Point2<f32>; 4],
    ordering: &CornerOrdering,
) -> Option<Homography> {
    let mut pairs: [(Point2<f32>, Point2<f32>); 4] =
        std::array::from_fn(|i| (marked[i], corners[ordering[i]]));
    pairs.sort_by(|a, b| a.0.x.total_cmp(&b.0.x).then(a.0.y.total_cmp(&b.0.y)));
    let src = pairs.map(|p| p.0);
    let dst = pairs.map(|p| p.1);
    homography_from_4pt(&src, &dst)
}

fn check_points(points: &[Point2<f32>]) -> Result<[Point2<f32>; 4], UnavailableReason> {
    match points.len() {
        n if n < 4 => Err(UnavailableReason::InsufficientCorrespondences {
            found: n,
            needed: 4,
        }),
        4 => Ok([points[0], points[1], points[2], points[3]]),
        n => Err(UnavailableReason::UnexpectedPointCount { got: n }),
    }
}

struct Candidate {
    ordering: CornerOrdering,
    homography: Homography,
    warped: GrayImage,
}

/// Non-degenerate candidates in enumeration order, lazily.
fn candidates<'a>(
    frame: &'a GrayImageView<'a>,
    template: &'a GrayImageView<'a>,
    marked: [Point2<f32>; 4],
    mode: CornerSearchMode,
) -> impl Iterator<Item = Candidate> + 'a {
    let corners = template_corners(template.width, template.height);
    candidate_orderings(mode)
        .into_iter()
        .filter_map(move |ordering| {
            let Some(homography) = fit_labeling(&marked, &corners, &ordering) else {
                log::debug!("corner search: ordering {ordering:?} is degenerate");
                return None;
            };
            let warped = warp_into(frame, &homography, template.width, template.height)?;
            Some(Candidate {
                ordering,
                homography,
                warped,
            })
        })
}

/// Pick the corner labeling whose warp best reproduces `template`.
///
/// Ties keep the earliest candidate. Fewer than four points,
/// more than four, or only degenerate candidates give `Unavailable`.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "info", skip_all, fields(mode = ?mode, points = marked.len()))
)]
pub fn find_homography(
    frame: &GrayImageView<'_>,
    template: &GrayImageView<'_>,
    marked: &[Point2<f32>],
    mode: CornerSearchMode,
) -> CornerSearchOutcome {
    let marked = match check_points(marked) {
        Ok(m) => m,
        Err(reason) => return Alignment::Unavailable(reason),
    };

    let mut best: Option<CornerFit> = None;
    for c in candidates(frame, template, marked, mode) {
        let Some(distance) = l2_distance(&c.warped.view(), template) else {
            continue;
        };
        log::debug!("corner search: ordering {:?} distance {distance:.1}", c.ordering);
        if best.as_ref().is_none_or(|b| distance < b.distance) {
            best = Some(CornerFit {
                homography: c.homography,
                distance,
                ordering: c.ordering,
            });
        }
    }

    match best {
        Some(fit) => {
            log::info!(
                "corner search: best ordering {:?} at distance {:.1}",
                fit.ordering,
                fit.distance
            );
            Alignment::Aligned(fit)
        }
        None => Alignment::Unavailable(UnavailableReason::DegenerateFit),
    }
}

/// Offer candidates in enumeration order and return the first one the
/// confirmer accepts.
pub fn find_homography_confirmed<C: AlignmentConfirmer + ?Sized>(
    frame: &GrayImageView<'_>,
    template: &GrayImageView<'_>,
    marked: &[Point2<f32>],
    mode: CornerSearchMode,
    confirmer: &mut C,
) -> Result<CornerFit, CalibrationError> {
    let marked = check_points(marked).map_err(|_| CalibrationError::InvalidPointCount {
        got: marked.len(),
    })?;

    let mut offered = 0usize;
    for c in candidates(frame, template, marked, mode) {
        offered += 1;
        if confirmer.confirm(&c.warped, &c.homography) {
            let distance = l2_distance(&c.warped.view(), template).unwrap_or(f64::INFINITY);
            log::info!("corner search: ordering {:?} confirmed", c.ordering);
            return Ok(CornerFit {
                homography: c.homography,
                distance,
                ordering: c.ordering,
            });
        }
    }
    Err(CalibrationError::ExhaustedSearch {
        candidates: offered,
    })
}
