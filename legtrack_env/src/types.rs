//! Message types consumed by the tracker.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A single planar range scan.
///
/// Beam `k` points along `angle_min + k * angle_increment` in the scan
/// frame; `ranges[k]` is the measured distance in meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaserScan {
    /// Frame the ranges are expressed in.
    pub frame_id: String,

    /// Acquisition time in seconds.
    pub stamp: f64,

    /// Angle of the first beam, radians.
    pub angle_min: f64,

    /// Angle of the last beam, radians.
    pub angle_max: f64,

    /// Angular distance between consecutive beams, radians.
    pub angle_increment: f64,

    /// Returns closer than this are invalid.
    pub range_min: f64,

    /// Returns farther than this are invalid.
    pub range_max: f64,

    /// Per-beam range values in meters.
    pub ranges: Vec<f64>,
}

impl LaserScan {
    /// Projects the polar ranges into planar points in the scan frame.
    ///
    /// Non-finite returns and returns outside `[range_min, range_max]`
    /// are skipped.
    pub fn project(&self) -> Vec<Point2<f64>> {
        self.ranges
            .iter()
            .enumerate()
            .filter_map(|(k, &r)| {
                if !r.is_finite() || r < self.range_min || r > self.range_max {
                    return None;
                }
                let angle = self.angle_min + k as f64 * self.angle_increment;
                Some(Point2::new(r * angle.cos(), r * angle.sin()))
            })
            .collect()
    }
}

/// A 2-D occupancy grid in row-major order.
///
/// Cell values are in `[0, 100]` (occupancy percentage); negative values
/// mean unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// Frame of the grid origin.
    pub frame_id: String,

    /// Edge length of one cell in meters.
    pub resolution: f64,

    /// World coordinates of cell (0, 0).
    pub origin_x: f64,
    pub origin_y: f64,

    /// Grid dimensions in cells.
    pub width: u32,
    pub height: u32,

    /// Row-major cell data, `width * height` entries.
    pub data: Vec<i8>,
}

impl OccupancyGrid {
    /// Maps a world position to grid cell indices.
    pub fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        let cx = ((x - self.origin_x) / self.resolution).round() as i64;
        let cy = ((y - self.origin_y) / self.resolution).round() as i64;
        (cx, cy)
    }

    /// Row-major flat index for a cell, or `None` when off the grid.
    pub fn index(&self, cx: i64, cy: i64) -> Option<usize> {
        if cx < 0 || cy < 0 || cx >= self.width as i64 || cy >= self.height as i64 {
            return None;
        }
        Some(cx as usize + cy as usize * self.width as usize)
    }

    /// Cell value, or `None` when off the grid.
    pub fn value(&self, cx: i64, cy: i64) -> Option<i8> {
        self.index(cx, cy).map(|i| self.data[i])
    }
}
