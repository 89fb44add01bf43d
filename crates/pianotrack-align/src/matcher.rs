//! Align a live frame to a fixed reference image through local features.

use crate::alignment::{AlignedFit, Alignment, UnavailableReason};
use nalgebra::Point2;
use pianotrack_core::{fit_homography_ransac, GrayImageView, HomographyError, RansacParams};
use pianotrack_features::{filter_redundant, match_features, FeatureParams, FeatureSet, Match};
use serde::{Deserialize, Serialize};

pub(crate) const MIN_CORRESPONDENCES: usize = 4;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherParams {
    pub features: FeatureParams,
    /// Lowe ratio; a match is kept when `best < ratio * second`.
    pub ratio: f32,
    /// Reference-side points closer than this to an accepted one are
    /// dropped. Zero disables the filter.
    pub min_separation: f32,
    pub ransac: RansacParams,
}

impl Default for MatcherParams {
    fn default() -> Self {
        Self {
            features: FeatureParams::default(),
            ratio: 0.7,
            min_separation: 1.0,
            ransac: RansacParams::default(),
        }
    }
}

/// Everything one `align` call saw, for introspection.
#[derive(Clone, Debug)]
pub struct MatchReport {
    /// Maps query (frame) pixels to reference pixels.
    pub alignment: Alignment<AlignedFit>,
    pub query: FeatureSet,
    /// Matches that survived the ratio test and the redundancy filter.
    pub matches: Vec<Match>,
    /// One flag per entry of `matches`; empty unless a fit was made.
    pub inlier_mask: Vec<bool>,
}

/// Holds the reference features; never mutated by `align`.
#[derive(Clone, Debug)]
pub struct FeatureMatcher {
    reference: FeatureSet,
    params: MatcherParams,
}

impl FeatureMatcher {
    pub fn new(reference: &GrayImageView<'_>, params: MatcherParams) -> Self {
        let features = FeatureSet::extract(reference, &params.features);
        log::debug!("matcher reference: {} features", features.len());
        Self::from_features(features, params)
    }

    pub fn from_features(reference: FeatureSet, params: MatcherParams) -> Self {
        Self { reference, params }
    }

    pub fn reference(&self) -> &FeatureSet {
        &self.reference
    }

    pub fn params(&self) -> &MatcherParams {
        &self.params
    }

    /// Detect features in `query` and align them to the reference.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip_all, fields(w = query.width, h = query.height))
    )]
    pub fn align(&self, query: &GrayImageView<'_>) -> MatchReport {
        let features = FeatureSet::extract(query, &self.params.features);
        self.align_features(features)
    }

    /// Align precomputed query features to the reference.
    pub fn align_features(&self, query: FeatureSet) -> MatchReport {
        let candidates = match_features(&query, &self.reference, self.params.ratio);
        let matches = filter_redundant(
            &candidates,
            &self.reference.points(),
            self.params.min_separation,
        );
        log::debug!(
            "matcher: {} query features, {} ratio-test survivors, {} after redundancy filter",
            query.len(),
            candidates.len(),
            matches.len()
        );

        if matches.len() < MIN_CORRESPONDENCES {
            return MatchReport {
                alignment: Alignment::Unavailable(UnavailableReason::InsufficientCorrespondences {
                    found: matches.len(),
                    needed: MIN_CORRESPONDENCES,
                }),
                query,
                matches,
                inlier_mask: Vec::new(),
            };
        }

        let src: Vec<Point2<f32>> = matches
            .iter()
            .map(|m| query.keypoints[m.query_idx].position)
            .collect();
        let dst: Vec<Point2<f32>> = matches
            .iter()
            .map(|m| self.reference.keypoints[m.train_idx].position)
            .collect();

        let (alignment, inlier_mask) = robust_fit(&src, &dst, &self.params.ransac);
        MatchReport {
            alignment,
            query,
            matches,
            inlier_mask,
        }
    }
}

/// RANSAC fit wrapped into an `Alignment`; failures become `Unavailable`.
pub(crate) fn robust_fit(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &RansacParams,
) -> (Alignment<AlignedFit>, Vec<bool>) {
    match fit_homography_ransac(src, dst, params) {
        Ok(fit) => (
            Alignment::Aligned(AlignedFit {
                homography: fit.homography,
                correspondences: src.len(),
                inliers: fit.inliers,
            }),
            fit.inlier_mask,
        ),
        Err(HomographyError::TooFewPoints { needed, got }) => (
            Alignment::Unavailable(UnavailableReason::InsufficientCorrespondences {
                found: got,
                needed,
            }),
            Vec::new(),
        ),
        Err(e) => {
            log::warn!("homography fit rejected: {e}");
            (Alignment::Unavailable(UnavailableReason::DegenerateFit), Vec::new())
        }
    }
}
