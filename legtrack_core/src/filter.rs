//! Spatial filtering of the projected scan.
//!
//! Three stages, in order: passthrough crop to the region of interest,
//! radius outlier removal, and an optional occupancy-grid free-space mask.
//! Every stage fails the scan when fewer than `min_cluster_size` points
//! survive it.

use legtrack_env::{OccupancyGrid, RigidTransform};
use tracing::debug;

use crate::config::TrackerConfig;
use crate::geometry::{Bounds, Point};

/// Half-width of the averaging window on the occupancy grid.
const FREE_SPACE_KERNEL: i64 = 2;

/// Runs the filter chain. `None` means the scan is skipped for matching.
pub fn filter_cloud(
    points: &[Point],
    roi: &Bounds,
    config: &TrackerConfig,
    map: Option<(&OccupancyGrid, &RigidTransform)>,
) -> Option<Vec<Point>> {
    if points.len() < config.min_cluster_size {
        debug!("filter: too few points in the input cloud");
        return None;
    }

    let cropped: Vec<Point> = points.iter().copied().filter(|p| roi.contains(p)).collect();
    if cropped.len() < config.min_cluster_size {
        debug!("filter: too few points after the passthrough crop");
        return None;
    }

    let inliers = radius_outlier_removal(
        &cropped,
        config.outlier_removal_radius,
        config.max_neighbors_for_outlier_removal,
    );
    if inliers.len() < config.min_cluster_size {
        debug!("filter: too few points after outlier removal");
        return None;
    }

    let survivors = match map {
        Some((grid, to_map)) => {
            let masked: Vec<Point> = inliers
                .into_iter()
                .filter(|p| {
                    let q = to_map.apply((*p).into());
                    free_space_ratio(grid, q.x, q.y, config.in_free_space_threshold)
                        <= config.in_free_space_threshold
                })
                .collect();
            masked
        }
        None => inliers,
    };

    if survivors.len() < config.min_cluster_size {
        debug!("filter: too few points after the free-space mask");
        return None;
    }
    Some(survivors)
}

/// Keeps points with at least `min_neighbors` other points within `radius`.
fn radius_outlier_removal(points: &[Point], radius: f64, min_neighbors: usize) -> Vec<Point> {
    points
        .iter()
        .enumerate()
        .filter(|(i, p)| {
            let neighbors = points
                .iter()
                .enumerate()
                .filter(|(j, q)| j != i && p.distance(q) <= radius)
                .count();
            neighbors >= min_neighbors
        })
        .map(|(_, p)| *p)
        .collect()
}

/// Mean occupancy of the `(2k+1)^2` window around a map-frame position,
/// as a fraction of fully occupied.
///
/// Positions whose window leaves the grid count as occupied, so that
/// points near the map edge are dropped rather than trusted.
pub fn free_space_ratio(grid: &OccupancyGrid, x: f64, y: f64, threshold: f64) -> f64 {
    let (cx, cy) = grid.cell_of(x, y);
    let mut sum = 0.0;
    for i in cx - FREE_SPACE_KERNEL..=cx + FREE_SPACE_KERNEL {
        for j in cy - FREE_SPACE_KERNEL..=cy + FREE_SPACE_KERNEL {
            match grid.value(i, j) {
                Some(v) => sum += v as f64,
                None => return threshold * 2.0,
            }
        }
    }
    let window = (2.0 * FREE_SPACE_KERNEL as f64 + 1.0).powi(2);
    sum / (window * 100.0)
}
