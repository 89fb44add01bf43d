//! Frame-to-frame stabilization against the previous frame.

use crate::alignment::{AlignedFit, Alignment, UnavailableReason};
use crate::matcher::{robust_fit, MIN_CORRESPONDENCES};
use nalgebra::Point2;
use pianotrack_core::{GrayImageView, Homography, RansacParams};
use pianotrack_features::{match_features, FeatureParams, FeatureSet};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerParams {
    pub features: FeatureParams,
    pub ratio: f32,
    pub ransac: RansacParams,
}

impl Default for StabilizerParams {
    fn default() -> Self {
        Self {
            features: FeatureParams::default(),
            ratio: 0.7,
            ransac: RansacParams::default(),
        }
    }
}

/// Caller-owned tracking state. `Default` is the reset state.
#[derive(Clone, Debug, Default)]
pub struct StabilizerSession {
    anchor: Option<FeatureSet>,
    last_homography: Option<Homography>,
    frames: u64,
}

impl StabilizerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Features of the previous frame, if any.
    pub fn anchor(&self) -> Option<&FeatureSet> {
        self.anchor.as_ref()
    }

    /// Last successful anchor-to-frame transform. Failed steps keep it.
    pub fn last_homography(&self) -> Option<&Homography> {
        self.last_homography.as_ref()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames
    }
}

/// Result of one stabilizer step.
#[derive(Clone, Debug)]
pub struct StabilizerStep {
    /// Maps previous-frame pixels to current-frame pixels.
    pub alignment: Alignment<AlignedFit>,
    /// Ratio-test survivors.
    pub matches: usize,
    pub inliers: usize,
    /// The anchor moved to this frame although no transform was fitted, so
    /// the next step no longer relates to the frame before this one.
    pub anchor_reset: bool,
}

#[derive(Clone, Debug, Default)]
pub struct VideoStabilizer {
    params: StabilizerParams,
}

impl VideoStabilizer {
    pub fn new(params: StabilizerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StabilizerParams {
        &self.params
    }

    /// Relate `frame` to the session's anchor, then make it the new anchor.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip_all, fields(frame = session.frames))
    )]
    pub fn step(
        &self,
        session: StabilizerSession,
        frame: &GrayImageView<'_>,
    ) -> (StabilizerSession, StabilizerStep) {
        let current = FeatureSet::extract(frame, &self.params.features);
        let StabilizerSession {
            anchor,
            last_homography,
            frames,
        } = session;

        let Some(anchor) = anchor else {
            log::debug!("stabilizer: anchor set ({} features)", current.len());
            let next = StabilizerSession {
                anchor: Some(current),
                last_homography,
                frames: frames + 1,
            };
            return (
                next,
                StabilizerStep {
                    alignment: Alignment::Unavailable(UnavailableReason::AnchorOnly),
                    matches: 0,
                    inliers: 0,
                    anchor_reset: false,
                },
            );
        };

        let matches = match_features(&current, &anchor, self.params.ratio);
        let (alignment, inliers) = if matches.len() < MIN_CORRESPONDENCES {
            (
                Alignment::Unavailable(UnavailableReason::InsufficientCorrespondences {
                    found: matches.len(),
                    needed: MIN_CORRESPONDENCES,
                }),
                0,
            )
        } else {
            let src: Vec<Point2<f32>> = matches
                .iter()
                .map(|m| anchor.keypoints[m.train_idx].position)
                .collect();
            let dst: Vec<Point2<f32>> = matches
                .iter()
                .map(|m| current.keypoints[m.query_idx].position)
                .collect();
            let (alignment, _) = robust_fit(&src, &dst, &self.params.ransac);
            let inliers = alignment.fit().map_or(0, |f| f.inliers);
            (alignment, inliers)
        };

        let anchor_reset = !alignment.is_aligned();
        if anchor_reset {
            log::debug!(
                "stabilizer: frame {frames} not aligned ({}), anchor advanced",
                alignment.reason().map(|r| r.to_string()).unwrap_or_default()
            );
        }

        let next = StabilizerSession {
            anchor: Some(current),
            last_homography: alignment
                .fit()
                .map(|f| f.homography)
                .or(last_homography),
            frames: frames + 1,
        };
        (
            next,
            StabilizerStep {
                alignment,
                matches: matches.len(),
                inliers,
                anchor_reset,
            },
        )
    }
}
