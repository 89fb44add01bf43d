//! Exact two-nearest-neighbour matching, Lowe's ratio test and the spatial
//! redundancy filter.

use crate::descriptor::{distance_sq, Descriptor};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use kiddo::{KdTree, SquaredEuclidean};

/// A query descriptor paired with its nearest train descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    /// L2 distance to the nearest train descriptor.
    pub distance: f32,
    /// L2 distance to the runner-up.
    pub second_distance: f32,
}

impl Match {
    /// Lowe's test: the best candidate must beat `ratio ×` the second.
    #[inline]
    pub fn passes_ratio(&self, ratio: f32) -> bool {
        self.distance < ratio * self.second_distance
    }
}

/// For every query descriptor find the two closest train descriptors.
///
/// Brute force over all pairs. Queries are visited in order and the output
/// keeps that order. Returns nothing when `train` has fewer than two entries.
pub fn knn2(query: &[Descriptor], train: &[Descriptor]) -> Vec<Match> {
    if train.len() < 2 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(query.len());
    for (qi, q) in query.iter().enumerate() {
        let (mut best, mut best_d) = (usize::MAX, f32::INFINITY);
        let mut second_d = f32::INFINITY;
        for (ti, t) in train.iter().enumerate() {
            let d = distance_sq(q, t);
            if d < best_d {
                second_d = best_d;
                best_d = d;
                best = ti;
            } else if d < second_d {
                second_d = d;
            }
        }
        if best == usize::MAX || !second_d.is_finite() {
            continue;
        }
        out.push(Match {
            query_idx: qi,
            train_idx: best,
            distance: best_d.sqrt(),
            second_distance: second_d.sqrt(),
        });
    }
    out
}

/// Like [`knn2`], but the runner-up must come from a different site: train
/// entries closer than `site_radius(best)` to the best entry's point do not
/// count as the second neighbour.
///
/// Multi-scale detection describes one image location several times; this
/// keeps those copies from failing each other's ratio test. Queries with no
/// runner-up outside the site are dropped.
pub fn knn2_distinct(
    query: &[Descriptor],
    train: &[Descriptor],
    train_points: &[Point2<f32>],
    site_radius: impl Fn(usize) -> f32,
) -> Vec<Match> {
    if train.len() < 2 || train_points.len() != train.len() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(query.len());
    for (qi, q) in query.iter().enumerate() {
        let Some((best, best_d)) = train
            .iter()
            .enumerate()
            .map(|(ti, t)| (ti, distance_sq(q, t)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        let site = train_points[best];
        let r = site_radius(best);
        let second_d = train
            .iter()
            .zip(train_points)
            .enumerate()
            .filter(|&(ti, (_, p))| ti != best && (p.x - site.x).hypot(p.y - site.y) >= r)
            .map(|(_, (t, _))| distance_sq(q, t))
            .fold(f32::INFINITY, f32::min);
        if !best_d.is_finite() || !second_d.is_finite() {
            continue;
        }
        out.push(Match {
            query_idx: qi,
            train_idx: best,
            distance: best_d.sqrt(),
            second_distance: second_d.sqrt(),
        });
    }
    out
}

/// Keep the matches that pass the ratio test, in input order.
pub fn ratio_test(matches: &[Match], ratio: f32) -> Vec<Match> {
    matches
        .iter()
        .copied()
        .filter(|m| m.passes_ratio(ratio))
        .collect()
}

/// Drop matches whose train-side point lies strictly closer than
/// `min_distance` to the train point of an already accepted match.
///
/// Matches are visited in input order; the first one in a cluster wins.
pub fn filter_redundant(
    matches: &[Match],
    train_points: &[Point2<f32>],
    min_distance: f32,
) -> Vec<Match> {
    if min_distance <= 0.0 {
        return matches.to_vec();
    }
    let r2 = min_distance * min_distance;
    let mut accepted: KdTree<f32, 2> = KdTree::new();
    let mut kept = Vec::with_capacity(matches.len());

    for m in matches {
        let Some(&p) = train_points.get(m.train_idx) else {
            continue;
        };
        let query = [p.x, p.y];
        let crowded = accepted
            .within_unsorted::<SquaredEuclidean>(&query, r2)
            .iter()
            .any(|nn| nn.distance < r2);
        if crowded {
            continue;
        }
        accepted.add(&query, kept.len() as u64);
        kept.push(*m);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(i: usize) -> Descriptor {
        let mut d = [0.0; 128];
        d[i] = 1.0;
        d
    }

    fn mix(i: usize, j: usize, a: f32) -> Descriptor {
        let mut d = [0.0; 128];
        d[i] = a;
        d[j] = (1.0 - a * a).sqrt();
        d
    }

    #[test]
    fn knn2_reports_best_and_runner_up() {
        let train = [unit(0), unit(1), unit(2)];
        let query = [mix(1, 2, 0.9)];
        let m = knn2(&query, &train);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].train_idx, 1);
        assert!(m[0].distance < m[0].second_distance);
    }

    #[test]
    fn single_train_descriptor_yields_nothing() {
        assert!(knn2(&[unit(0)], &[unit(0)]).is_empty());
    }

    #[test]
    fn ratio_test_rejects_ambiguous_matches() {
        let train = [unit(0), unit(1), unit(2)];
        let query = [unit(0), mix(1, 2, 0.7071)];
        let m = ratio_test(&knn2(&query, &train), 0.7);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].query_idx, 0);
    }

    #[test]
    fn redundant_train_points_keep_first_visit() {
        let pts = [
            Point2::new(10.0, 10.0),
            Point2::new(10.5, 10.2),
            Point2::new(11.2, 10.0),
            Point2::new(50.0, 50.0),
        ];
        let mk = |q, t| Match {
            query_idx: q,
            train_idx: t,
            distance: 0.1,
            second_distance: 1.0,
        };
        let input = [mk(0, 0), mk(1, 1), mk(2, 2), mk(3, 3), mk(4, 0)];
        let kept = filter_redundant(&input, &pts, 1.0);
        let ids: Vec<_> = kept.iter().map(|m| m.query_idx).collect();
        // (11.2, 10) is 1.2 px from the first point; exactly coincident is redundant.
        assert_eq!(ids, vec![0, 2, 3]);
    }

    #[test]
    fn redundancy_radius_is_strict_and_scales_to_many_points() {
        let mut pts = vec![Point2::new(10.0, 10.0), Point2::new(11.0, 10.0)];
        for i in 0..200 {
            pts.push(Point2::new((i % 20) as f32 * 3.0, (i / 20) as f32 * 3.0 + 40.0));
        }
        // A second pass over the same lattice is entirely redundant.
        for i in 0..200 {
            pts.push(Point2::new((i % 20) as f32 * 3.0 + 0.5, (i / 20) as f32 * 3.0 + 40.0));
        }
        let input: Vec<_> = (0..pts.len())
            .map(|t| Match {
                query_idx: t,
                train_idx: t,
                distance: 0.1,
                second_distance: 1.0,
            })
            .collect();
        let kept = filter_redundant(&input, &pts, 1.0);
        // Exactly `min_distance` apart is not redundant.
        assert_eq!(kept[1].train_idx, 1);
        assert_eq!(kept.len(), 202);
        assert!(kept.iter().all(|m| m.train_idx < 202));
    }

    #[test]
    fn same_site_copies_do_not_count_as_runner_up() {
        // Train 0 and 1 describe one location at two scales; 2 is elsewhere.
        let train = [unit(0), mix(0, 1, 0.95), unit(2)];
        let pts = [
            Point2::new(10.0, 10.0),
            Point2::new(10.8, 10.4),
            Point2::new(60.0, 30.0),
        ];
        let query = [mix(0, 1, 0.99)];

        assert!(ratio_test(&knn2(&query, &train), 0.7).is_empty());

        let m = knn2_distinct(&query, &train, &pts, |_| 2.0);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].train_idx, 0);
        assert!(m[0].passes_ratio(0.7));

        // Without a site radius it degenerates to plain 2-NN.
        let plain = knn2_distinct(&query, &train, &pts, |_| 0.0);
        assert_eq!(plain, knn2(&query, &train));
    }
}
