//! Euclidean clustering of the filtered cloud into candidate leg blobs.
//!
//! Produces one centroid per cluster, with two corrections driven by the
//! current track set: centroids snap onto paired-leg positions they sit
//! on top of, and a blob containing both legs of a tracked pair is split
//! back into two centroids.

use crate::config::TrackerConfig;
use crate::geometry::{Bounds, Point};

/// Snap distance between a centroid and a paired-leg position.
const CENTROID_SNAP_RADIUS: f64 = 0.03;

/// Groups points by single-link proximity and returns the clusters that
/// satisfy the size bounds.
pub fn euclidean_clusters(
    points: &[Point],
    tolerance: f64,
    min_size: usize,
    max_size: usize,
) -> Vec<Vec<usize>> {
    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();

    for seed in 0..points.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let mut cluster = vec![seed];
        let mut frontier = vec![seed];
        while let Some(i) = frontier.pop() {
            for j in 0..points.len() {
                if !visited[j] && points[i].distance(&points[j]) <= tolerance {
                    visited[j] = true;
                    cluster.push(j);
                    frontier.push(j);
                }
            }
        }
        if cluster.len() >= min_size && cluster.len() <= max_size {
            clusters.push(cluster);
        }
    }
    clusters
}

fn centroid_of(points: &[Point], indices: &[usize]) -> Point {
    let n = indices.len() as f64;
    let (sx, sy) = indices
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &i| (sx + points[i].x, sy + points[i].y));
    Point::new(sx / n, sy / n)
}

fn bounds_of(points: &[Point], indices: &[usize], margin: f64) -> Bounds {
    let mut b = Bounds::new(f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for &i in indices {
        b.x_min = b.x_min.min(points[i].x);
        b.x_max = b.x_max.max(points[i].x);
        b.y_min = b.y_min.min(points[i].y);
        b.y_max = b.y_max.max(points[i].y);
    }
    b.inflated(margin)
}

/// Clusters the cloud and returns the corrected centroids.
///
/// `paired_legs` are the positions of live tracks that belong to a
/// person; they drive centroid snapping and blob splitting.
pub fn cluster_centroids(
    points: &[Point],
    paired_legs: &[Point],
    config: &TrackerConfig,
) -> Vec<Point> {
    let clusters = euclidean_clusters(
        points,
        config.cluster_tolerance,
        config.min_cluster_size,
        config.max_cluster_size,
    );

    if paired_legs.is_empty() {
        return clusters
            .iter()
            .map(|cluster| centroid_of(points, cluster))
            .collect();
    }

    let mut centroids = Vec::with_capacity(clusters.len());
    for cluster in &clusters {
        let raw = centroid_of(points, cluster);
        let snapped = snap_to_paired_leg(raw, paired_legs);
        let bounds = bounds_of(points, cluster, config.cluster_bounding_box_uncertainty);

        match split_blob(points, cluster, &snapped, &bounds, paired_legs, config) {
            Some((fst, snd)) => {
                centroids.push(fst);
                centroids.push(snd);
            }
            None => centroids.push(snapped),
        }
    }
    centroids
}

/// A centroid within 3 cm of exactly one paired leg takes that leg's
/// position, so micro-jitter cannot break the assignment.
fn snap_to_paired_leg(centroid: Point, paired_legs: &[Point]) -> Point {
    let near: Vec<&Point> = paired_legs
        .iter()
        .filter(|leg| leg.distance(&centroid) <= CENTROID_SNAP_RADIUS)
        .collect();
    match near.as_slice() {
        [single] => **single,
        _ => centroid,
    }
}

/// Splits a cluster whose inflated bounding box covers both legs of a
/// tracked pair.
///
/// The raw points are partitioned by the sign of the cross product with
/// the centroid direction; the split stands only when both halves are
/// clusters in their own right and their centroids are at least one leg
/// radius apart.
fn split_blob(
    points: &[Point],
    cluster: &[usize],
    centroid: &Point,
    bounds: &Bounds,
    paired_legs: &[Point],
    config: &TrackerConfig,
) -> Option<(Point, Point)> {
    if paired_legs.len() < 2 {
        return None;
    }

    let mut by_distance: Vec<&Point> = paired_legs.iter().collect();
    by_distance.sort_by(|a, b| {
        a.distance(centroid)
            .partial_cmp(&b.distance(centroid))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let (fst_leg, snd_leg) = (by_distance[0], by_distance[1]);
    if !bounds.contains(fst_leg) || !bounds.contains(snd_leg) {
        return None;
    }

    let (mut fst, mut snd): (Vec<usize>, Vec<usize>) = (Vec::new(), Vec::new());
    for &i in cluster {
        let p = points[i];
        if p.x * centroid.y - centroid.x * p.y < 0.0 {
            fst.push(i);
        } else {
            snd.push(i);
        }
    }
    if fst.len() < config.min_cluster_size || snd.len() < config.min_cluster_size {
        return None;
    }

    let fst_centroid = centroid_of(points, &fst);
    let snd_centroid = centroid_of(points, &snd);
    if fst_centroid.distance(&snd_centroid) < config.leg_radius {
        return None;
    }
    Some((fst_centroid, snd_centroid))
}
