mod common;

use common::{assert_maps_near, keyboard_template, project};
use nalgebra::Point2;
use pianotrack_align::{
    candidate_orderings, find_homography, find_homography_confirmed, template_corners,
    CalibrationError, CornerSearchMode,
};
use pianotrack_core::{GrayImage, Homography};

fn quad() -> [Point2<f32>; 4] {
    [
        Point2::new(60.0, 120.0),
        Point2::new(640.0, 100.0),
        Point2::new(620.0, 232.0),
        Point2::new(78.0, 250.0),
    ]
}

#[test]
fn perspective_keyboard_is_recovered_from_clockwise_clicks() {
    let template = keyboard_template();
    assert_eq!((template.width, template.height), (545, 66));
    let (frame, _) = project(&template, quad(), 700, 320);

    let outcome = find_homography(
        &frame.view(),
        &template.view(),
        &quad(),
        CornerSearchMode::Rotations,
    );
    let fit = outcome.fit().expect("aligned");
    assert_eq!(fit.ordering, [0, 1, 2, 3]);

    let corners = template_corners(template.width, template.height);
    for (marked, corner) in quad().iter().zip(corners) {
        assert_maps_near(&fit.homography, *marked, corner, 0.05);
    }
}

#[test]
fn click_order_rotation_gives_identical_result() {
    let template = keyboard_template();
    let (frame, _) = project(&template, quad(), 700, 320);
    let q = quad();
    let from_br = [q[2], q[3], q[0], q[1]];

    let a = find_homography(&frame.view(), &template.view(), &q, CornerSearchMode::Rotations)
        .into_fit()
        .expect("aligned");
    let b = find_homography(&frame.view(), &template.view(), &from_br, CornerSearchMode::Rotations)
        .into_fit()
        .expect("aligned");

    assert_eq!(b.ordering, [2, 3, 0, 1]);
    assert_eq!(a.homography, b.homography);
    assert_eq!(a.distance, b.distance);
}

#[test]
fn reflected_click_order_needs_permutations() {
    let template = keyboard_template();
    let (frame, _) = project(&template, quad(), 700, 320);
    let q = quad();
    // Counter-clockwise from the top-left.
    let mirrored = [q[0], q[3], q[2], q[1]];

    let fit = find_homography(
        &frame.view(),
        &template.view(),
        &mirrored,
        CornerSearchMode::Permutations,
    )
    .into_fit()
    .expect("aligned");
    assert_eq!(fit.ordering, [0, 3, 2, 1]);

    // Same corners, same best fit, whatever the click order.
    let clockwise = find_homography(
        &frame.view(),
        &template.view(),
        &q,
        CornerSearchMode::Permutations,
    )
    .into_fit()
    .expect("aligned");
    assert_eq!(clockwise.ordering, [0, 1, 2, 3]);
    assert_eq!(fit.distance, clockwise.distance);
    assert_eq!(fit.homography, clockwise.homography);

    let rotations_only = find_homography(
        &frame.view(),
        &template.view(),
        &mirrored,
        CornerSearchMode::Rotations,
    )
    .into_fit()
    .expect("aligned");
    assert!(rotations_only.distance > fit.distance);
}

#[test]
fn confirmer_sees_candidates_in_order() {
    let template = keyboard_template();
    let (frame, _) = project(&template, quad(), 700, 320);

    let mut seen = 0usize;
    let mut accept_second = |warped: &GrayImage, _: &Homography| {
        assert_eq!((warped.width, warped.height), (545, 66));
        seen += 1;
        seen == 2
    };
    let fit = find_homography_confirmed(
        &frame.view(),
        &template.view(),
        &quad(),
        CornerSearchMode::Rotations,
        &mut accept_second,
    )
    .expect("second candidate accepted");
    assert_eq!(seen, 2);
    assert_eq!(fit.ordering, candidate_orderings(CornerSearchMode::Rotations)[1]);
}

#[test]
fn rejecting_everything_exhausts_the_search() {
    let template = keyboard_template();
    let (frame, _) = project(&template, quad(), 700, 320);
    let mut reject = |_: &GrayImage, _: &Homography| false;

    let err = find_homography_confirmed(
        &frame.view(),
        &template.view(),
        &quad(),
        CornerSearchMode::Permutations,
        &mut reject,
    )
    .unwrap_err();
    assert_eq!(err, CalibrationError::ExhaustedSearch { candidates: 24 });
}
