//! Photometric refinement of a frame-to-template homography.
//!
//! The cost of a homography is the summed L2 distance between each template
//! and the frame warped into that template's pixel grid. The nine matrix
//! coefficients are optimized directly with Nelder–Mead, warm-started from
//! the previous estimate.

use crate::alignment::{Alignment, HasHomography, UnavailableReason};
use crate::nelder_mead::{minimize, NelderMeadParams};
use nalgebra::SVector;
use pianotrack_core::{l2_distance, warp_into, GrayImageView, Homography};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerParams {
    pub optimizer: NelderMeadParams,
}

/// Current estimate of the frame-to-template transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefinerSession {
    homography: Homography,
    refinements: u64,
}

impl RefinerSession {
    pub fn new(homography: Homography) -> Self {
        Self {
            homography,
            refinements: 0,
        }
    }

    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Restart from `homography`, keeping the refinement count.
    pub fn with_homography(self, homography: Homography) -> Self {
        Self { homography, ..self }
    }

    /// Successful `refine` calls so far.
    pub fn refinements(&self) -> u64 {
        self.refinements
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefineOutcome {
    /// Maps frame pixels to template pixels, with `h[2][2] == 1`.
    pub homography: Homography,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

impl HasHomography for RefineOutcome {
    fn homography(&self) -> &Homography {
        &self.homography
    }
}

/// Summed L2 distance between every template and `frame` warped through
/// `homography` into that template's grid. Degenerate maps cost `+∞`.
pub fn warp_cost(
    frame: &GrayImageView<'_>,
    homography: &Homography,
    templates: &[GrayImageView<'_>],
) -> f64 {
    let mut total = 0.0;
    for tpl in templates {
        let Some(warped) = warp_into(frame, homography, tpl.width, tpl.height) else {
            return f64::INFINITY;
        };
        match l2_distance(&warped.view(), tpl) {
            Some(d) => total += d,
            None => return f64::INFINITY,
        }
    }
    total
}

#[derive(Clone, Debug, Default)]
pub struct HomographyRefiner {
    params: RefinerParams,
}

impl HomographyRefiner {
    pub fn new(params: RefinerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RefinerParams {
        &self.params
    }

    /// Refine the session's homography against `frame`.
    ///
    /// On success the returned session carries the refined transform; on
    /// `Unavailable` it is the input session unchanged.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip_all, fields(templates = templates.len()))
    )]
    pub fn refine(
        &self,
        session: RefinerSession,
        frame: &GrayImageView<'_>,
        templates: &[GrayImageView<'_>],
    ) -> (RefinerSession, Alignment<RefineOutcome>) {
        if templates.is_empty() {
            return (session, Alignment::Unavailable(UnavailableReason::NoTemplates));
        }
        if session.homography.is_degenerate() {
            log::warn!("refiner: session homography is degenerate");
            return (session, Alignment::Unavailable(UnavailableReason::DegenerateFit));
        }

        let x0 = SVector::<f64, 9>::from_row_slice(&session.homography.to_coefficients());
        let cost = |x: &SVector<f64, 9>| {
            let mut c = [0.0; 9];
            c.copy_from_slice(x.as_slice());
            warp_cost(frame, &Homography::from_coefficients(&c), templates)
        };
        let initial_cost = cost(&x0);
        let m = minimize(cost, x0, &self.params.optimizer);

        let mut coeffs = [0.0; 9];
        coeffs.copy_from_slice(m.x.as_slice());
        let Some(homography) = Homography::from_coefficients(&coeffs).normalized() else {
            log::warn!("refiner: refined homography has a vanishing h33");
            return (session, Alignment::Unavailable(UnavailableReason::DegenerateFit));
        };

        log::debug!(
            "refiner: cost {initial_cost:.1} -> {:.1} in {} iterations ({} evaluations, converged: {})",
            m.value,
            m.iterations,
            m.evaluations,
            m.converged
        );

        let next = RefinerSession {
            homography,
            refinements: session.refinements + 1,
        };
        let outcome = RefineOutcome {
            homography,
            initial_cost,
            final_cost: m.value,
            iterations: m.iterations,
            evaluations: m.evaluations,
            converged: m.converged,
        };
        (next, Alignment::Aligned(outcome))
    }
}
