use nalgebra::Point2;
use pianotrack::align::{
    find_homography, template_corners, CornerSearchMode, HomographyRefiner, NelderMeadParams,
    RefinerParams, RefinerSession,
};
use pianotrack::core::{homography_from_4pt, warp_into, GrayImage};
use pianotrack::template::{synthesize, KeyboardSpec};

fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> f64 {
    assert_eq!((a.width, a.height), (b.width, b.height));
    let sum: u64 = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(&p, &q)| (p as i64 - q as i64).unsigned_abs())
        .sum();
    sum as f64 / a.data.len() as f64
}

#[test]
fn upside_down_keyboard_is_recovered_from_shuffled_clicks() {
    let template = synthesize(&KeyboardSpec::default())
        .expect("render")
        .to_gray();
    assert_eq!((template.width, template.height), (545, 66));

    // Camera behind the keyboard: template TL lands bottom right.
    let quad = [
        Point2::new(630.0_f32, 262.0),
        Point2::new(70.0, 280.0),
        Point2::new(84.0, 118.0),
        Point2::new(610.0, 96.0),
    ];
    let corners = template_corners(template.width, template.height);
    let h_frame = homography_from_4pt(&corners, &quad).expect("valid quad");
    let frame = warp_into(&template.view(), &h_frame, 720, 360).expect("warp");

    let clicks = [quad[3], quad[1], quad[0], quad[2]];
    let fit = find_homography(
        &frame.view(),
        &template.view(),
        &clicks,
        CornerSearchMode::Permutations,
    )
    .into_fit()
    .expect("aligned");
    assert_eq!(fit.ordering, [3, 1, 0, 2]);

    let rectified = warp_into(&frame.view(), &fit.homography, template.width, template.height)
        .expect("warp back");
    let diff = mean_abs_diff(&rectified, &template);
    assert!(diff < 20.0, "mean abs diff {diff:.2}");

    let params = RefinerParams {
        optimizer: NelderMeadParams {
            max_iterations: Some(150),
            ..NelderMeadParams::default()
        },
    };
    let (session, refined) = HomographyRefiner::new(params).refine(
        RefinerSession::new(fit.homography),
        &frame.view(),
        &[template.view()],
    );
    let refined = refined.into_fit().expect("refined");
    assert!(refined.final_cost <= refined.initial_cost);
    assert_eq!(session.homography(), &refined.homography);
}
