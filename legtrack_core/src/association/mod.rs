//! Track-to-measurement association.
//!
//! Exactly one policy runs per scan: the single-person dynamic-gate
//! matcher, bounding-box zone tracking, or global nearest neighbor via
//! optimal assignment.

pub mod gnn;
pub mod one_person;
pub mod zones;

use crate::geometry::Point;
use crate::track::Leg;

/// Scalar-covariance Mahalanobis distance between a centroid and a
/// track's predicted position.
pub(crate) fn mahalanobis(p: &Point, leg: &Leg) -> f64 {
    let cov = leg.matching_covariance();
    if cov <= 0.0 {
        return f64::MAX;
    }
    let pos = leg.position();
    (((p.x - pos.x).powi(2) + (p.y - pos.y).powi(2)) / cov).sqrt()
}
