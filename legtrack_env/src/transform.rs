//! Rigid planar transforms and the provider interface.

use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// A rigid transform between two planar frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RigidTransform {
    iso: Isometry2<f64>,
}

impl RigidTransform {
    /// Builds a transform from a translation and a yaw angle (radians).
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            iso: Isometry2::new(Vector2::new(x, y), yaw),
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            iso: Isometry2::identity(),
        }
    }

    /// Applies the transform to a point.
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        self.iso * p
    }

    /// Composes `self` after `other`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        Self {
            iso: self.iso * other.iso,
        }
    }

    /// The inverse transform.
    pub fn inverse(&self) -> RigidTransform {
        Self {
            iso: self.iso.inverse(),
        }
    }
}

/// Synchronous lookup of the rigid transform between two frames.
///
/// The tracker queries this once per scan; a failed lookup degrades the
/// scan to predict-only.
pub trait TransformProvider {
    fn lookup(&self, target_frame: &str, source_frame: &str)
        -> Result<RigidTransform, TransformError>;
}

/// Provider that answers every lookup with the identity transform.
///
/// Useful when scans are already expressed in the tracking frame, and in
/// tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransforms;

impl TransformProvider for IdentityTransforms {
    fn lookup(
        &self,
        _target_frame: &str,
        _source_frame: &str,
    ) -> Result<RigidTransform, TransformError> {
        Ok(RigidTransform::identity())
    }
}

/// Strips the leading slash some publishers put on frame ids.
pub fn normalize_frame_id(frame_id: &str) -> &str {
    frame_id.strip_prefix('/').unwrap_or(frame_id)
}
