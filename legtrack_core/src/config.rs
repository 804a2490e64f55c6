//! Runtime configuration of the tracker.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which association policy runs each scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationMode {
    /// Single-person tracking with a dynamic region of interest.
    OnePerson,
    /// Per-pair bounding-box zones, leftovers through GNN.
    BoundingBox,
    /// Global nearest neighbor via optimal assignment (default).
    GlobalNearestNeighbor,
}

/// All named options of the tracker, with the deployment defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Topic the inbound transport reads scans from.
    pub scan_topic: String,
    /// Topic the occupancy grid arrives on.
    pub global_map_topic: String,
    /// Tracking frame all state is expressed in.
    pub transform_link: String,
    /// Scan period in seconds.
    pub frequency: f64,

    /// Static region of interest, tracking frame.
    pub x_lower_limit: f64,
    pub x_upper_limit: f64,
    pub y_lower_limit: f64,
    pub y_upper_limit: f64,

    /// Approximate radius of one leg in meters.
    pub leg_radius: f64,
    /// Bootstrap reference point for single-person mode.
    pub ref_point_x: f64,
    pub ref_point_y: f64,

    /// Updates needed before a track is confirmed; also the history depth.
    pub min_observations: usize,
    /// Two legs farther apart than this are never one person.
    pub max_dist_btw_legs: f64,
    /// Height applied to emitted markers.
    pub z_coordinate: f64,
    /// Kalman state dimension; the constant-acceleration model uses 6.
    pub state_dimensions: usize,

    pub min_cluster_size: usize,
    pub max_cluster_size: usize,
    pub cluster_tolerance: f64,

    /// Scans a track survives without an update.
    pub occluded_dead_age: u32,
    /// Measurement noise variance (position, both axes).
    pub variance_observation: f64,
    /// Carried for parameter-set parity; not consumed by the pipeline.
    pub min_dist_travelled: f64,
    /// A track whose position uncertainty exceeds this is dead.
    pub max_cov: f64,
    /// Occupancy mask: keep points whose free-space ratio is at most this.
    pub in_free_space_threshold: f64,

    pub mahalanobis_dist_gate: f64,
    pub euclidian_dist_gate: f64,
    /// Cost assigned to inadmissible assignment cells.
    pub max_cost: f64,
    pub tracking_bounding_box_uncertainty: f64,
    pub cluster_bounding_box_uncertainty: f64,
    pub outlier_removal_radius: f64,
    pub max_neighbors_for_outlier_removal: usize,

    pub is_one_person_to_track: bool,
    pub is_bounding_box_tracking: bool,
    pub with_map: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            scan_topic: "/scan_unified".into(),
            global_map_topic: "/move_base/global_costmap/costmap".into(),
            transform_link: "base_link".into(),
            frequency: 0.05,
            x_lower_limit: 0.0,
            x_upper_limit: 0.5,
            y_lower_limit: -0.5,
            y_upper_limit: 0.5,
            leg_radius: 0.1,
            ref_point_x: -0.9,
            ref_point_y: 0.0,
            min_observations: 4,
            max_dist_btw_legs: 0.8,
            z_coordinate: 0.178,
            state_dimensions: 6,
            min_cluster_size: 3,
            max_cluster_size: 100,
            cluster_tolerance: 0.07,
            occluded_dead_age: 10,
            variance_observation: 0.25,
            min_dist_travelled: 0.25,
            max_cov: 0.81,
            in_free_space_threshold: 0.06,
            mahalanobis_dist_gate: 1.2,
            euclidian_dist_gate: 0.4,
            max_cost: 999_999.0,
            tracking_bounding_box_uncertainty: 0.2,
            cluster_bounding_box_uncertainty: 0.03,
            outlier_removal_radius: 0.07,
            max_neighbors_for_outlier_removal: 3,
            is_one_person_to_track: false,
            is_bounding_box_tracking: false,
            with_map: false,
        }
    }
}

impl TrackerConfig {
    /// Checks the options a misconfigured deployment gets wrong.
    ///
    /// The tracker refuses to start on any of these.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("frequency", self.frequency),
            ("leg_radius", self.leg_radius),
            ("max_dist_btw_legs", self.max_dist_btw_legs),
            ("cluster_tolerance", self.cluster_tolerance),
            ("variance_observation", self.variance_observation),
            ("max_cov", self.max_cov),
            ("mahalanobis_dist_gate", self.mahalanobis_dist_gate),
            ("euclidian_dist_gate", self.euclidian_dist_gate),
            ("max_cost", self.max_cost),
            ("outlier_removal_radius", self.outlier_removal_radius),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        for (name, value) in [
            ("in_free_space_threshold", self.in_free_space_threshold),
            (
                "tracking_bounding_box_uncertainty",
                self.tracking_bounding_box_uncertainty,
            ),
            (
                "cluster_bounding_box_uncertainty",
                self.cluster_bounding_box_uncertainty,
            ),
            ("min_dist_travelled", self.min_dist_travelled),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if self.min_cluster_size == 0 || self.max_cluster_size < self.min_cluster_size {
            return Err(ConfigError::ClusterSize {
                min: self.min_cluster_size,
                max: self.max_cluster_size,
            });
        }
        if self.x_lower_limit >= self.x_upper_limit {
            return Err(ConfigError::InvertedRoi { axis: 'x' });
        }
        if self.y_lower_limit >= self.y_upper_limit {
            return Err(ConfigError::InvertedRoi { axis: 'y' });
        }
        if self.state_dimensions != 6 {
            return Err(ConfigError::StateDimensions(self.state_dimensions));
        }
        if self.min_observations == 0 {
            return Err(ConfigError::MinObservations);
        }
        Ok(())
    }

    /// The active association policy. Single-person mode wins over zones.
    pub fn association_mode(&self) -> AssociationMode {
        if self.is_one_person_to_track {
            AssociationMode::OnePerson
        } else if self.is_bounding_box_tracking {
            AssociationMode::BoundingBox
        } else {
            AssociationMode::GlobalNearestNeighbor
        }
    }

    /// Number of scans spanning `seconds` at the configured scan period.
    pub fn scans_within(&self, seconds: f64) -> u32 {
        (seconds / self.frequency).ceil() as u32
    }
}

/// Fatal configuration problems.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("cluster size bounds are invalid: [{min}, {max}]")]
    ClusterSize { min: usize, max: usize },

    #[error("region of interest is inverted on the {axis} axis")]
    InvertedRoi { axis: char },

    #[error("state dimension {0} is unsupported, the constant-acceleration model requires 6")]
    StateDimensions(usize),

    #[error("min_observations must be at least 1")]
    MinObservations,
}
