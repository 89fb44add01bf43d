//! Frame-by-frame tracking: a motion estimate per frame, optionally
//! followed by photometric refinement of the frame-to-template transform.

use crate::io::{FrameEntry, FrameStatus};
use pianotrack_align::{
    AlignedFit, Alignment, FeatureMatcher, HomographyRefiner, RefinerParams, RefinerSession,
    StabilizerParams, StabilizerSession, VideoStabilizer,
};
use pianotrack_core::{GrayImage, GrayImageView, Homography};

/// Where per-frame motion comes from.
enum Motion {
    /// Previous frame to current frame.
    Stabilizer {
        stabilizer: VideoStabilizer,
        session: Option<StabilizerSession>,
    },
    /// Current frame to a fixed reference frame.
    Reference(FeatureMatcher),
}

struct MotionStep {
    alignment: Alignment,
    matches: usize,
    inliers: usize,
    anchor_reset: bool,
}

struct Refinement {
    refiner: HomographyRefiner,
    template: GrayImage,
    /// Template-from-reference map in reference mode, unused otherwise.
    initial: Homography,
    /// Holds the last accepted template-from-frame map.
    session: Option<RefinerSession>,
}

pub struct Tracker {
    motion: Motion,
    refinement: Option<Refinement>,
}

impl Tracker {
    /// Track relative to the previous frame.
    pub fn stabilized(params: StabilizerParams) -> Self {
        Self {
            motion: Motion::Stabilizer {
                stabilizer: VideoStabilizer::new(params),
                session: Some(StabilizerSession::new()),
            },
            refinement: None,
        }
    }

    /// Track relative to a fixed reference frame.
    pub fn against_reference(matcher: FeatureMatcher) -> Self {
        Self {
            motion: Motion::Reference(matcher),
            refinement: None,
        }
    }

    /// Also refine a template-from-frame homography on every frame.
    /// `initial` maps the first frame (or the reference frame) to `template`.
    pub fn with_refinement(
        mut self,
        params: RefinerParams,
        template: GrayImage,
        initial: Homography,
    ) -> Self {
        self.refinement = Some(Refinement {
            refiner: HomographyRefiner::new(params),
            template,
            initial,
            session: Some(RefinerSession::new(initial)),
        });
        self
    }

    /// Successful refinements so far; 0 without refinement.
    pub fn refinements(&self) -> u64 {
        self.refinement
            .as_ref()
            .and_then(|r| r.session.as_ref())
            .map_or(0, RefinerSession::refinements)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip(self, image),
            fields(w = image.width, h = image.height)
        )
    )]
    pub fn process(&mut self, frame: usize, path: &str, image: &GrayImageView<'_>) -> FrameEntry {
        let motion = self.motion_step(image);

        let Some(refinement) = self.refinement.as_mut() else {
            return entry(frame, path, &motion, &motion.alignment, None);
        };

        let session = refinement
            .session
            .take()
            .unwrap_or_else(|| RefinerSession::new(refinement.initial));
        let current = *session.homography();
        let predicted = match (&self.motion, motion.alignment.fit()) {
            (Motion::Stabilizer { .. }, Some(fit)) => fit
                .homography
                .inverse()
                .map(|prev_from_cur| current.compose(&prev_from_cur)),
            (Motion::Reference(_), Some(fit)) => Some(refinement.initial.compose(&fit.homography)),
            (_, None) => None,
        }
        .unwrap_or(current);

        let (session, refined) = refinement.refiner.refine(
            session.with_homography(predicted),
            image,
            &[refinement.template.view()],
        );
        refinement.session = Some(if refined.is_aligned() {
            session
        } else {
            log::debug!("frame {frame}: refinement unavailable, keeping previous estimate");
            session.with_homography(current)
        });
        let cost = refined.fit().map(|o| o.final_cost);
        let alignment = refined.map(|o| AlignedFit {
            homography: o.homography,
            correspondences: motion.matches,
            inliers: motion.inliers,
        });
        entry(frame, path, &motion, &alignment, cost)
    }

    fn motion_step(&mut self, image: &GrayImageView<'_>) -> MotionStep {
        match &mut self.motion {
            Motion::Stabilizer {
                stabilizer,
                session,
            } => {
                let (next, step) = stabilizer.step(session.take().unwrap_or_default(), image);
                *session = Some(next);
                MotionStep {
                    alignment: step.alignment,
                    matches: step.matches,
                    inliers: step.inliers,
                    anchor_reset: step.anchor_reset,
                }
            }
            Motion::Reference(matcher) => {
                let report = matcher.align(image);
                let inliers = report.inlier_mask.iter().filter(|&&m| m).count();
                MotionStep {
                    alignment: report.alignment,
                    matches: report.matches.len(),
                    inliers,
                    anchor_reset: false,
                }
            }
        }
    }
}

fn entry(
    frame: usize,
    path: &str,
    motion: &MotionStep,
    alignment: &Alignment,
    cost: Option<f64>,
) -> FrameEntry {
    let (status, homography, reason) = match alignment {
        Alignment::Aligned(fit) => (FrameStatus::Aligned, Some(fit.homography.to_array()), None),
        Alignment::Unavailable(r) => (FrameStatus::Unavailable, None, Some(*r)),
    };
    log::debug!(
        "frame {frame}: {status:?}, {} matches, {} inliers",
        motion.matches,
        motion.inliers
    );
    FrameEntry {
        frame,
        path: path.to_string(),
        status,
        homography,
        reason,
        matches: motion.matches,
        inliers: motion.inliers,
        cost,
        anchor_reset: motion.anchor_reset,
    }
}
