//! Planar laser leg tracking.
//!
//! Turns a stream of 2-D range scans into identity-persistent leg tracks
//! and paired-people estimates: spatial filtering and Euclidean
//! clustering of the returns, one of three association policies matching
//! cluster centroids to Kalman-filtered tracks, pairing of legs into
//! people with short-term identity reuse, and a gait-based left/right
//! label for the tracked pair.

pub mod association;
pub mod clustering;
pub mod config;
pub mod filter;
pub mod gait;
pub mod geometry;
pub mod kalman;
pub mod memory;
pub mod output;
pub mod pairing;
pub mod track;
pub mod tracker;
pub mod visualization;

// Re-export key types for convenience
pub use association::zones::TrackingZone;
pub use config::{AssociationMode, ConfigError, TrackerConfig};
pub use gait::GaitLabeler;
pub use geometry::{Bounds, Point};
pub use kalman::LegFilter;
pub use memory::PeopleMemory;
pub use output::{LegChannel, LegRecord, ScanOutput};
pub use track::Leg;
pub use tracker::LegTracker;
pub use visualization::{ArrowMarker, Color, EllipseMarker, PathMarker, RectMarker};
