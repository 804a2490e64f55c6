//! External interface layer for the leg tracker.
//!
//! The tracking pipeline itself is transport-agnostic: scans, occupancy
//! grids and frame transforms arrive through the types and traits defined
//! here, and whatever delivers them (a ROS bridge, a replay file, the
//! simulation harness) stays outside the core crate.

pub mod error;
pub mod transform;
pub mod types;

pub use error::TransformError;
pub use transform::{IdentityTransforms, RigidTransform, TransformProvider};
pub use types::{LaserScan, OccupancyGrid};
