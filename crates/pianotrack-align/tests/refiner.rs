mod common;

use approx::assert_relative_eq;
use common::smooth_texture;
use pianotrack_align::{warp_cost, HomographyRefiner, RefinerParams, RefinerSession};
use pianotrack_core::{warp_into, Homography};

fn translation(tx: f64, ty: f64) -> Homography {
    Homography::from_array([[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]])
}

#[test]
fn refinement_never_increases_cost_and_updates_session() {
    let template = smooth_texture(80, 60);
    // The template sits at (12, 9) inside the frame.
    let frame = warp_into(&template.view(), &translation(12.0, 9.0), 110, 85).expect("warp");
    let truth = translation(-12.0, -9.0);
    let start = translation(-13.5, -8.0);

    let templates = [template.view()];
    let refiner = HomographyRefiner::new(RefinerParams::default());
    let (session, outcome) = refiner.refine(RefinerSession::new(start), &frame.view(), &templates);
    let fit = outcome.fit().expect("refined");

    assert!(fit.final_cost <= fit.initial_cost);
    assert!(fit.final_cost < fit.initial_cost);
    assert_relative_eq!(fit.initial_cost, warp_cost(&frame.view(), &start, &templates));
    assert!(warp_cost(&frame.view(), &truth, &templates) < fit.initial_cost);
    assert_relative_eq!(fit.homography.h[(2, 2)], 1.0, epsilon = 1e-12);
    assert!(fit.evaluations >= 10);

    assert_eq!(session.homography(), &fit.homography);
    assert_eq!(session.refinements(), 1);
}

#[test]
fn warm_restart_keeps_improving_or_holds() {
    let template = smooth_texture(64, 48);
    let frame = warp_into(&template.view(), &translation(6.0, 5.0), 80, 64).expect("warp");
    let templates = [template.view(), template.view()];
    let refiner = HomographyRefiner::default();

    let (session, first) =
        refiner.refine(RefinerSession::new(translation(-7.0, -4.0)), &frame.view(), &templates);
    let first = first.into_fit().expect("refined");
    let (session, second) = refiner.refine(session, &frame.view(), &templates);
    let second = second.into_fit().expect("refined");

    assert_relative_eq!(second.initial_cost, first.final_cost, max_relative = 1e-2);
    assert!(second.final_cost <= second.initial_cost);
    assert_eq!(session.refinements(), 2);
}
