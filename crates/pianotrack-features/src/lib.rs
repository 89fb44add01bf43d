//! Local image features for frame-to-template and frame-to-frame matching.
//!
//! The pipeline is the classic one:
//!
//! 1. Harris corners on every level of a Gaussian scale pyramid,
//! 2. a dominant gradient orientation per corner,
//! 3. a 4×4×8 gradient histogram descriptor (128 floats, unit norm) whose
//!    support grows with the level's scale,
//! 4. exact 2-NN matching with Lowe's ratio test, optionally followed by a
//!    spatial redundancy filter on the train side.
//!
//! ```no_run
//! use pianotrack_core::GrayImage;
//! use pianotrack_features::{match_features, FeatureParams, FeatureSet};
//!
//! let template = GrayImage::new(320, 80);
//! let frame = GrayImage::new(320, 80);
//! let params = FeatureParams::default();
//! let reference = FeatureSet::extract(&template.view(), &params);
//! let query = FeatureSet::extract(&frame.view(), &params);
//! let matches = match_features(&query, &reference, 0.7);
//! println!("{} candidate matches", matches.len());
//! ```

mod descriptor;
mod detector;
mod filter;
mod matching;
mod pyramid;

pub use descriptor::{
    describe_keypoint, distance_sq, Descriptor, DescriptorParams, GradientField, DESCRIPTOR_LEN,
};
pub use detector::{detect_keypoints, harris_response, HarrisParams, Keypoint};
pub use filter::{gaussian_blur, gaussian_kernel, sobel, FloatImage};
pub use matching::{filter_redundant, knn2, knn2_distinct, ratio_test, Match};
pub use pyramid::{PyramidLevel, PyramidParams, ScalePyramid};

use nalgebra::Point2;
use pianotrack_core::GrayImageView;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    pub pyramid: PyramidParams,
    /// Detection settings, in level pixels. `max_keypoints` is shared
    /// evenly between levels.
    pub harris: HarrisParams,
    pub descriptor: DescriptorParams,
}

/// Keypoints of one image with their descriptors, index-aligned.
#[derive(Clone, Debug, Default)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    /// Detect and describe. Keypoints whose patch carries no gradient are
    /// dropped, so both vectors always have the same length.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(w = img.width, h = img.height))
    )]
    pub fn extract(img: &GrayImageView<'_>, params: &FeatureParams) -> Self {
        let pyramid = ScalePyramid::build(FloatImage::from_gray(img), &params.pyramid);
        let per_level = HarrisParams {
            max_keypoints: params.harris.max_keypoints.div_ceil(pyramid.len().max(1)),
            ..params.harris.clone()
        };

        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();
        for (level, layer) in pyramid.levels.iter().enumerate() {
            let raw = detect_keypoints(&layer.image, &per_level);
            if raw.is_empty() {
                continue;
            }
            let smoothed = gaussian_blur(&layer.image, params.harris.smoothing_sigma);
            let (gx, gy) = sobel(&smoothed);
            let field = GradientField::new(gx, gy);

            for kp in raw {
                let Some((orientation, d)) = describe_keypoint(&field, &kp, &params.descriptor)
                else {
                    continue;
                };
                let (x, y) = layer.to_base(kp.position.x, kp.position.y);
                keypoints.push(Keypoint {
                    position: Point2::new(x, y),
                    orientation,
                    scale: params.descriptor.support_radius * layer.scale,
                    level,
                    ..kp
                });
                descriptors.push(d);
            }
        }
        log::debug!(
            "extracted {} features from {}x{} image over {} levels",
            keypoints.len(),
            img.width,
            img.height,
            pyramid.len()
        );
        Self {
            keypoints,
            descriptors,
        }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn points(&self) -> Vec<Point2<f32>> {
        self.keypoints.iter().map(|k| k.position).collect()
    }
}

/// Same-site radius as a fraction of a keypoint's descriptor support.
const SITE_FRACTION: f32 = 0.25;

/// 2-NN matches of `query` against `train` that pass the ratio test. The
/// runner-up is taken from a different site than the best train keypoint,
/// so the other pyramid levels' copies of that keypoint do not count.
pub fn match_features(query: &FeatureSet, train: &FeatureSet, ratio: f32) -> Vec<Match> {
    let candidates = knn2_distinct(
        &query.descriptors,
        &train.descriptors,
        &train.points(),
        |i| SITE_FRACTION * train.keypoints[i].scale,
    );
    ratio_test(&candidates, ratio)
}
