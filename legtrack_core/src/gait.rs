//! Left/right leg labeling from gait asymmetry.
//!
//! Maintained only while exactly one paired person is tracked. The
//! labeler keeps a tally of which leg has been spatially on the right,
//! and when one leg swings while the other stands it checks whether the
//! swinging leg is on its habitual side. Agreement reinforces the
//! assignment, disagreement swaps it and restarts the confidence.

use crate::geometry::Point;
use crate::track::Leg;

/// Speed above which a leg counts as swinging.
const SWING_SPEED: f64 = 0.2;

/// Confidence right after a reset.
const INITIAL_CONFIDENCE: f64 = 0.01;

/// Confidence granted to a fresh swap.
const SWAP_CONFIDENCE: f64 = 0.1;

/// Reinforcement step per agreeing observation.
const CONFIDENCE_STEP: f64 = 0.1;

/// Confidence-weighted left/right assignment for the tracked pair.
#[derive(Debug, Clone)]
pub struct GaitLabeler {
    /// `(left_leg_id, right_leg_id)` once initialized.
    left_right: Option<(u32, u32)>,
    /// Scans with the first-iterated leg on the left vs. on the right.
    tally_ij: u32,
    tally_ji: u32,
    confidence: f64,
}

impl Default for GaitLabeler {
    fn default() -> Self {
        Self {
            left_right: None,
            tally_ij: 0,
            tally_ji: 0,
            confidence: INITIAL_CONFIDENCE,
        }
    }
}

impl GaitLabeler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the assignment and the tally.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Observes the pair for one scan. `i` and `j` follow the track
    /// vector's iteration order, which the tally is keyed by.
    pub fn observe(&mut self, i: &Leg, j: &Leg) {
        let i_is_right = i.position().y <= j.position().y;
        if i_is_right {
            self.tally_ji += 1;
        } else {
            self.tally_ij += 1;
        }

        let (left, _right) = match self.left_right {
            None => {
                // first sighting: take the current spatial order
                self.left_right = Some(if i_is_right {
                    (j.leg_id(), i.leg_id())
                } else {
                    (i.leg_id(), j.leg_id())
                });
                return;
            }
            Some(pair) => pair,
        };

        let (moving, unmoving, moving_is_i) = match classify(i, j) {
            Some(split) => split,
            None => return,
        };

        // A = swinging leg, B = where its velocity carries it. Only the
        // swing back toward the origin is informative.
        let a = moving.position();
        let b = Point::new(a.x + moving.velocity().x, a.y + moving.velocity().y);
        if a.norm() <= b.norm() {
            return;
        }

        if moving.position().y <= unmoving.position().y {
            // swinging leg currently on the right
            let habitual_right = if moving_is_i {
                self.tally_ij < self.tally_ji
            } else {
                self.tally_ij > self.tally_ji
            };
            if habitual_right {
                if left != unmoving.leg_id() {
                    self.left_right = Some((unmoving.leg_id(), moving.leg_id()));
                    self.confidence = SWAP_CONFIDENCE;
                } else {
                    self.confidence = (self.confidence + CONFIDENCE_STEP).min(1.0);
                }
            }
        } else {
            // swinging leg currently on the left
            let habitual_left = if moving_is_i {
                self.tally_ij > self.tally_ji
            } else {
                self.tally_ij < self.tally_ji
            };
            if habitual_left {
                if left != moving.leg_id() {
                    self.left_right = Some((moving.leg_id(), unmoving.leg_id()));
                    self.confidence = SWAP_CONFIDENCE;
                } else {
                    self.confidence = (self.confidence + CONFIDENCE_STEP).min(1.0);
                }
            }
        }
    }

    /// `(left_leg_id, right_leg_id)` once known.
    pub fn left_right(&self) -> Option<(u32, u32)> {
        self.left_right
    }

    /// True when `leg_id` is currently labeled as the left leg.
    pub fn is_left(&self, leg_id: u32) -> bool {
        matches!(self.left_right, Some((left, _)) if left == leg_id)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Splits the pair into (swinging, standing) legs, when exactly one
/// swings.
fn classify<'a>(i: &'a Leg, j: &'a Leg) -> Option<(&'a Leg, &'a Leg, bool)> {
    let vi = i.velocity().norm();
    let vj = j.velocity().norm();
    if vi > SWING_SPEED && vj < SWING_SPEED {
        Some((i, j, true))
    } else if vi < SWING_SPEED && vj > SWING_SPEED {
        Some((j, i, false))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::geometry::Point;
    use crate::track::Leg;

    fn config() -> TrackerConfig {
        TrackerConfig {
            frequency: 0.1,
            variance_observation: 0.01,
            ..Default::default()
        }
    }

    fn static_leg(id: u32, x: f64, y: f64) -> Leg {
        let mut leg = Leg::new(id, Point::new(x, y), &config());
        for _ in 0..5 {
            leg.predict();
            leg.update(Point::new(x, y));
        }
        leg
    }

    /// A leg driven toward the origin fast enough to count as swinging.
    fn inbound_leg(id: u32, x_from: f64, y: f64, scans: usize) -> Leg {
        let mut leg = Leg::new(id, Point::new(x_from, y), &config());
        for k in 1..=scans {
            leg.predict();
            leg.update(Point::new(x_from - 0.05 * k as f64, y));
        }
        leg
    }

    #[test]
    fn first_observation_takes_the_spatial_order() {
        let mut gait = GaitLabeler::new();
        let right = static_leg(1, 0.3, -0.15);
        let left = static_leg(2, 0.3, 0.15);
        gait.observe(&right, &left);
        assert_eq!(gait.left_right(), Some((2, 1)));
        assert!(gait.is_left(2));
    }

    #[test]
    fn inbound_swing_on_the_habitual_left_reinforces() {
        let mut gait = GaitLabeler::new();
        let standing = static_leg(1, 0.3, -0.15);
        // moving leg is on the left and swings toward the robot
        let mut swinging = inbound_leg(2, 1.5, 0.15, 8);
        gait.observe(&standing, &swinging);
        assert_eq!(gait.left_right(), Some((2, 1)));

        let before = gait.confidence();
        for k in 9..=14 {
            swinging.predict();
            swinging.update(Point::new(1.5 - 0.05 * k as f64, 0.15));
            gait.observe(&standing, &swinging);
        }
        assert!(gait.confidence() > before);
        assert_eq!(gait.left_right(), Some((2, 1)));
    }

    #[test]
    fn contradicting_swing_swaps_and_restarts_confidence() {
        let mut gait = GaitLabeler::new();
        // seed an assignment that contradicts the spatial order about to
        // be observed: leg 1 recorded left, but it sits on the right
        let standing_right = static_leg(1, 0.3, -0.15);
        let standing_left = static_leg(2, 0.3, 0.15);
        gait.observe(&standing_left, &standing_right);
        assert_eq!(gait.left_right(), Some((2, 1)));

        // now leg 2 swings inbound while on the right of leg 1's side:
        // place leg 2 below leg 1 and build up the tally first
        let below = static_leg(2, 0.3, -0.4);
        for _ in 0..6 {
            gait.observe(&standing_right, &below);
        }
        let swinging = inbound_leg(2, 1.5, -0.4, 10);
        gait.observe(&standing_right, &swinging);
        // leg 2 proven habitual-right: assignment flips to (1, 2)
        assert_eq!(gait.left_right(), Some((1, 2)));
        assert!((gait.confidence() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn reset_clears_everything() {
        let mut gait = GaitLabeler::new();
        let a = static_leg(1, 0.3, -0.15);
        let b = static_leg(2, 0.3, 0.15);
        gait.observe(&a, &b);
        gait.reset();
        assert_eq!(gait.left_right(), None);
        assert!((gait.confidence() - 0.01).abs() < 1e-12);
    }
}
