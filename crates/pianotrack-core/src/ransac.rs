use crate::homography::{estimate_homography, homography_from_4pt, Homography};
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const SAMPLE_SIZE: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HomographyError {
    #[error("need at least {needed} correspondences, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("source has {src} points but destination has {dst}")]
    LengthMismatch { src: usize, dst: usize },
    #[error("no minimal sample produced a usable model")]
    NoConsensus,
    #[error("refit on the consensus set is degenerate")]
    Degenerate,
}

/// Robust fit settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum reprojection error in pixels for a correspondence to count
    /// as an inlier.
    pub threshold: f64,
    /// Hard cap on sampled hypotheses.
    pub max_iters: usize,
    /// Probability that at least one all-inlier sample was drawn; used to
    /// shrink the iteration budget as the inlier ratio improves.
    pub confidence: f64,
    pub seed: u64,
    /// Re-estimate from every inlier of the best hypothesis.
    pub refit_on_inliers: bool,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            max_iters: 2000,
            confidence: 0.995,
            seed: 0,
            refit_on_inliers: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RansacFit {
    /// Maps `src` points onto `dst` points.
    pub homography: Homography,
    pub inlier_mask: Vec<bool>,
    pub inliers: usize,
}

#[inline]
fn reprojection_error(h: &Homography, s: Point2<f32>, d: Point2<f32>) -> f64 {
    let p = h.apply(s);
    let (dx, dy) = ((p.x - d.x) as f64, (p.y - d.y) as f64);
    let e = dx.hypot(dy);
    if e.is_finite() {
        e
    } else {
        f64::INFINITY
    }
}

fn nearly_collinear(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> bool {
    let (ux, uy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let (vx, vy) = ((c.x - a.x) as f64, (c.y - a.y) as f64);
    let cross = (ux * vy - uy * vx).abs();
    let scale = (ux.hypot(uy) * vx.hypot(vy)).max(1e-12);
    cross / scale < 1e-6
}

fn sample_is_degenerate(pts: &[Point2<f32>; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES
        .iter()
        .any(|t| nearly_collinear(pts[t[0]], pts[t[1]], pts[t[2]]))
}

/// Hypotheses needed to draw an all-inlier sample with probability
/// `confidence` given the observed inlier ratio.
fn required_iterations(confidence: f64, inlier_ratio: f64, cap: usize) -> usize {
    if inlier_ratio <= 0.0 {
        return cap;
    }
    let p_good = inlier_ratio.powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 {
        return 1;
    }
    let num = (1.0 - confidence.clamp(0.0, 1.0 - 1e-12)).ln();
    let den = (1.0 - p_good).ln();
    if den >= 0.0 || !den.is_finite() {
        return cap;
    }
    let n = (num / den).ceil();
    if n.is_finite() && n >= 0.0 {
        (n as usize).clamp(1, cap)
    } else {
        cap
    }
}

fn score(h: &Homography, src: &[Point2<f32>], dst: &[Point2<f32>], thr: f64) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(&s, &d)| reprojection_error(h, s, d) <= thr)
        .collect()
}

/// Fit `dst ~ H * src` robustly.
///
/// Samples of four correspondences come from a seeded generator, so equal
/// inputs give equal results.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(n = src.len()))
)]
pub fn fit_homography_ransac(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &RansacParams,
) -> Result<RansacFit, HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < SAMPLE_SIZE {
        return Err(HomographyError::TooFewPoints {
            needed: SAMPLE_SIZE,
            got: n,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut budget = params.max_iters.max(1);
    let mut iter = 0usize;

    while iter < budget {
        iter += 1;
        let idx = rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE);
        let s4 = [src[idx.index(0)], src[idx.index(1)], src[idx.index(2)], src[idx.index(3)]];
        let d4 = [dst[idx.index(0)], dst[idx.index(1)], dst[idx.index(2)], dst[idx.index(3)]];
        if sample_is_degenerate(&s4) || sample_is_degenerate(&d4) {
            continue;
        }
        let Some(h) = homography_from_4pt(&s4, &d4) else {
            continue;
        };

        let mask = score(&h, src, dst, params.threshold);
        let count = mask.iter().filter(|&&m| m).count();
        if best.as_ref().is_none_or(|(_, _, c)| count > *c) {
            budget = required_iterations(params.confidence, count as f64 / n as f64, budget);
            best = Some((h, mask, count));
            if count == n {
                break;
            }
        }
    }

    let Some((h_best, mask_best, count_best)) = best else {
        log::debug!("ransac: no usable sample among {n} correspondences after {iter} draws");
        return Err(HomographyError::NoConsensus);
    };
    if count_best < SAMPLE_SIZE {
        return Err(HomographyError::NoConsensus);
    }

    let homography = if params.refit_on_inliers && count_best > SAMPLE_SIZE {
        let (s_in, d_in): (Vec<_>, Vec<_>) = src
            .iter()
            .zip(dst)
            .zip(&mask_best)
            .filter(|&(_, &m)| m)
            .map(|((&s, &d), _)| (s, d))
            .unzip();
        estimate_homography(&s_in, &d_in).unwrap_or(h_best)
    } else {
        h_best
    };
    if homography.is_degenerate() {
        return Err(HomographyError::Degenerate);
    }

    let inlier_mask = score(&homography, src, dst, params.threshold);
    let inliers = inlier_mask.iter().filter(|&&m| m).count();
    log::debug!("ransac: {inliers}/{n} inliers after {iter} iterations");

    Ok(RansacFit {
        homography,
        inlier_mask,
        inliers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn ground_truth() -> Homography {
        Homography::from_array([
            [0.9, 0.12, 40.0],
            [-0.08, 1.05, 25.0],
            [0.0004, -0.0002, 1.0],
        ])
    }

    #[test]
    fn rejects_outliers_and_recovers_model() {
        let h = ground_truth();
        let mut rng = StdRng::seed_from_u64(7);
        let mut src = Vec::new();
        let mut dst = Vec::new();
        for i in 0..40 {
            let s = Point2::new((i % 8) as f32 * 25.0, (i / 8) as f32 * 30.0);
            let d = h.apply(s);
            src.push(s);
            dst.push(Point2::new(
                d.x + rng.gen_range(-0.3..0.3),
                d.y + rng.gen_range(-0.3..0.3),
            ));
        }
        for _ in 0..15 {
            src.push(Point2::new(rng.gen_range(0.0..200.0), rng.gen_range(0.0..150.0)));
            dst.push(Point2::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)));
        }

        let fit = fit_homography_ransac(&src, &dst, &RansacParams::default()).expect("fit");
        assert!(fit.inliers >= 40, "only {} inliers", fit.inliers);
        assert_eq!(fit.inlier_mask.len(), src.len());
        for i in 0..40 {
            assert!(fit.inlier_mask[i], "true inlier {i} rejected");
            let e = reprojection_error(&fit.homography, src[i], h.apply(src[i]));
            assert!(e < 1.0, "inlier {i} reprojects {e:.3} px off");
        }
    }

    #[test]
    fn same_seed_same_result() {
        let h = ground_truth();
        let src: Vec<_> = (0..12)
            .map(|i| Point2::new((i % 4) as f32 * 40.0, (i / 4) as f32 * 35.0))
            .collect();
        let mut dst: Vec<_> = src.iter().map(|&p| h.apply(p)).collect();
        dst[3] = Point2::new(999.0, -50.0);
        let a = fit_homography_ransac(&src, &dst, &RansacParams::default()).expect("fit");
        let b = fit_homography_ransac(&src, &dst, &RansacParams::default()).expect("fit");
        assert_eq!(a.homography, b.homography);
        assert_eq!(a.inlier_mask, b.inlier_mask);
        assert!(!a.inlier_mask[3]);
    }

    #[test]
    fn too_few_and_mismatched_inputs_error() {
        let p = [Point2::new(0.0_f32, 0.0); 3];
        assert_eq!(
            fit_homography_ransac(&p, &p, &RansacParams::default()).unwrap_err(),
            HomographyError::TooFewPoints { needed: 4, got: 3 }
        );
        let q = [Point2::new(0.0_f32, 0.0); 5];
        assert_eq!(
            fit_homography_ransac(&p, &q, &RansacParams::default()).unwrap_err(),
            HomographyError::LengthMismatch { src: 3, dst: 5 }
        );
    }

    #[test]
    fn collinear_points_have_no_consensus() {
        let src: Vec<_> = (0..10).map(|i| Point2::new(i as f32 * 10.0, 5.0)).collect();
        let dst = src.clone();
        assert_eq!(
            fit_homography_ransac(&src, &dst, &RansacParams::default()).unwrap_err(),
            HomographyError::NoConsensus
        );
    }

    #[test]
    fn iteration_budget_shrinks_with_inlier_ratio() {
        assert_eq!(required_iterations(0.995, 1.0, 2000), 1);
        assert_eq!(required_iterations(0.995, 0.0, 2000), 2000);
        let half = required_iterations(0.995, 0.5, 2000);
        assert!(half > 50 && half < 100, "{half}");
    }
}
