//! Derivative-free Nelder–Mead simplex minimizer.

use nalgebra::SVector;
use std::cell::Cell;
use serde::{Deserialize, Serialize};

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Relative step for nonzero start coordinates and absolute step for zero
/// ones when building the initial simplex.
const NONZERO_STEP: f64 = 0.05;
const ZERO_STEP: f64 = 0.00025;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadParams {
    /// `None` means `200 × dimension`.
    pub max_iterations: Option<usize>,
    /// `None` means `200 × dimension`.
    pub max_evaluations: Option<usize>,
    /// Convergence needs every vertex within this of the best one...
    pub x_tolerance: f64,
    /// ...and every cost within this of the best cost.
    pub f_tolerance: f64,
}

impl Default for NelderMeadParams {
    fn default() -> Self {
        Self {
            max_iterations: None,
            max_evaluations: None,
            x_tolerance: 1e-4,
            f_tolerance: 1e-4,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Minimum<const N: usize> {
    pub x: SVector<f64, N>,
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
    /// Both tolerances were met before a budget ran out.
    pub converged: bool,
}

/// Minimize `f` starting from `x0`.
///
/// `x0` is a vertex of the initial simplex and the best vertex never gets
/// worse, so `value <= f(x0)`. Non-finite costs are treated as `+∞`.
pub fn minimize<const N: usize>(
    mut f: impl FnMut(&SVector<f64, N>) -> f64,
    x0: SVector<f64, N>,
    params: &NelderMeadParams,
) -> Minimum<N> {
    let max_iter = params.max_iterations.unwrap_or(200 * N).max(1);
    let max_eval = params.max_evaluations.unwrap_or(200 * N).max(N + 1);

    let evaluations = Cell::new(0usize);
    let mut eval = |x: &SVector<f64, N>| {
        evaluations.set(evaluations.get() + 1);
        let v = f(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    let mut simplex: Vec<(SVector<f64, N>, f64)> = Vec::with_capacity(N + 1);
    simplex.push((x0, eval(&x0)));
    for k in 0..N {
        let mut y = x0;
        y[k] = if y[k] != 0.0 {
            (1.0 + NONZERO_STEP) * y[k]
        } else {
            ZERO_STEP
        };
        let fy = eval(&y);
        simplex.push((y, fy));
    }

    let mut iterations = 0usize;
    let mut converged = false;
    loop {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].clone();
        let x_spread = simplex[1..]
            .iter()
            .map(|(x, _)| (x - best.0).amax())
            .fold(0.0, f64::max);
        let f_spread = simplex[1..]
            .iter()
            .map(|(_, v)| (v - best.1).abs())
            .fold(0.0, f64::max);
        if x_spread <= params.x_tolerance && f_spread <= params.f_tolerance {
            converged = true;
            break;
        }
        if iterations >= max_iter || evaluations.get() >= max_eval {
            break;
        }
        iterations += 1;

        let centroid = simplex[..N]
            .iter()
            .fold(SVector::<f64, N>::zeros(), |acc, (x, _)| acc + x)
            / N as f64;
        let (worst_x, worst_f) = simplex[N].clone();
        let second_worst_f = simplex[N - 1].1;

        let xr = centroid + (centroid - worst_x) * REFLECT;
        let fr = eval(&xr);

        if fr < best.1 {
            let xe = centroid + (xr - centroid) * EXPAND;
            let fe = eval(&xe);
            simplex[N] = if fe < fr { (xe, fe) } else { (xr, fr) };
            continue;
        }
        if fr < second_worst_f {
            simplex[N] = (xr, fr);
            continue;
        }

        let shrink = if fr < worst_f {
            // Outside contraction.
            let xc = centroid + (xr - centroid) * CONTRACT;
            let fc = eval(&xc);
            if fc <= fr {
                simplex[N] = (xc, fc);
                false
            } else {
                true
            }
        } else {
            // Inside contraction.
            let xcc = centroid + (worst_x - centroid) * CONTRACT;
            let fcc = eval(&xcc);
            if fcc < worst_f {
                simplex[N] = (xcc, fcc);
                false
            } else {
                true
            }
        };

        if shrink {
            let anchor = simplex[0].0;
            for vertex in simplex.iter_mut().skip(1) {
                let x = anchor + (vertex.0 - anchor) * SHRINK;
                vertex.1 = eval(&x);
                vertex.0 = x;
            }
        }
    }

    let (x, value) = simplex[0];
    Minimum {
        x,
        value,
        iterations,
        evaluations: evaluations.get(),
        converged,
    }
}
