use nalgebra::Matrix3;
use pianotrack_core::{warp_into, GrayImage, Homography};
use pianotrack_features::{
    filter_redundant, match_features, DescriptorParams, FeatureParams, FeatureSet, Match,
};

/// Deterministic clutter of overlapping gray rectangles.
fn clutter(w: usize, h: usize, seed: u64) -> GrayImage {
    let mut state = seed;
    let mut next = |m: usize| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) as usize) % m
    };
    let mut img = GrayImage::new(w, h);
    img.data.fill(100);
    for _ in 0..60 {
        let x0 = next(w);
        let y0 = next(h);
        let rw = 6 + next(30);
        let rh = 6 + next(24);
        let v = (20 + next(215)) as u8;
        for y in y0..(y0 + rh).min(h) {
            for x in x0..(x0 + rw).min(w) {
                img.set(x, y, v);
            }
        }
    }
    img
}

fn shifted(src: &GrayImage, dx: usize, dy: usize) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    for y in dy..src.height {
        for x in dx..src.width {
            out.set(x, y, src.get(x - dx, y - dy));
        }
    }
    out
}

#[test]
fn translated_frame_matches_with_consistent_offset() {
    let reference = clutter(240, 160, 17);
    let frame = shifted(&reference, 7, 4);
    let params = FeatureParams::default();

    let train = FeatureSet::extract(&reference.view(), &params);
    let query = FeatureSet::extract(&frame.view(), &params);
    assert!(train.len() > 20, "reference has {} features", train.len());

    let matches = match_features(&query, &train, 0.7);
    assert!(matches.len() >= 10, "only {} matches", matches.len());

    // Within one level pixel of the true shift.
    let support = DescriptorParams::default().support_radius;
    let consistent = matches
        .iter()
        .filter(|m| {
            let q = query.keypoints[m.query_idx];
            let t = train.keypoints[m.train_idx];
            let tol = t.scale / support;
            let (q, t) = (q.position, t.position);
            (q.x - t.x - 7.0).abs() < tol && (q.y - t.y - 4.0).abs() < tol
        })
        .count();
    assert!(
        consistent * 10 >= matches.len() * 8,
        "{consistent} of {} matches agree with the shift",
        matches.len()
    );
}

#[test]
fn identical_images_match_every_keypoint_to_itself() {
    let img = clutter(200, 120, 5);
    let params = FeatureParams::default();
    let set = FeatureSet::extract(&img.view(), &params);
    let matches = match_features(&set, &set, 0.7);
    assert!(!matches.is_empty());
    for m in &matches {
        assert_eq!(m.query_idx, m.train_idx);
        assert_eq!(m.distance, 0.0);
    }
    // Coarser levels re-detect the same corners; full-resolution keypoints
    // come first and are already spread apart by non-maximum suppression.
    let unique = filter_redundant(&matches, &set.points(), 1.0);
    let base = |ms: &[Match]| {
        ms.iter()
            .filter(|m| set.keypoints[m.train_idx].level == 0)
            .count()
    };
    assert!(base(&matches) > 0);
    assert_eq!(base(&unique), base(&matches));
    assert!(unique.len() <= matches.len());
}

#[test]
fn keypoints_span_several_pyramid_levels() {
    let img = clutter(240, 160, 5);
    let set = FeatureSet::extract(&img.view(), &FeatureParams::default());
    let support = DescriptorParams::default().support_radius;
    let levels: std::collections::BTreeSet<_> = set.keypoints.iter().map(|k| k.level).collect();
    assert!(levels.len() >= 3, "levels {levels:?}");
    for k in &set.keypoints {
        assert!(k.position.x >= 0.0 && k.position.x <= 240.0);
        assert!(k.position.y >= 0.0 && k.position.y <= 160.0);
        if k.level == 0 {
            assert_eq!(k.scale, support);
        } else {
            assert!(k.scale > support);
        }
    }
}

#[test]
fn zoomed_out_frame_still_matches() {
    let reference = clutter(240, 160, 5);
    let zoom = Homography::new(Matrix3::new(0.6, 0.0, 0.0, 0.0, 0.6, 0.0, 0.0, 0.0, 1.0));
    let frame = warp_into(&reference.view(), &zoom, 240, 160).expect("warp");
    let params = FeatureParams::default();

    let train = FeatureSet::extract(&reference.view(), &params);
    let query = FeatureSet::extract(&frame.view(), &params);
    let matches = match_features(&query, &train, 0.7);

    // Frame points sit at 0.6× their reference position.
    let consistent = matches
        .iter()
        .filter(|m| {
            let q = query.keypoints[m.query_idx].position;
            let t = train.keypoints[m.train_idx].position;
            (q.x / 0.6 - t.x).abs() < 3.0 && (q.y / 0.6 - t.y).abs() < 3.0
        })
        .count();
    assert!(consistent >= 8, "{consistent} of {} matches fit the zoom", matches.len());
}

#[test]
fn blank_image_has_no_features() {
    let img = GrayImage::new(64, 64);
    let set = FeatureSet::extract(&img.view(), &FeatureParams::default());
    assert!(set.is_empty());
    assert_eq!(set.descriptors.len(), 0);
}
