//! Global nearest neighbor association via optimal assignment.
//!
//! Builds a square cost matrix over (measurement, track) pairs, solves it
//! with the Hungarian algorithm and applies an acceptance window to each
//! assignment. Pad rows mark tracks missed, pad columns seed new tracks.

use pathfinding::prelude::{kuhn_munkres_min, Matrix};
use tracing::trace;

use super::mahalanobis;
use crate::geometry::Point;
use crate::track::Leg;
use crate::tracker::LegTracker;

/// Costs are scaled to integers for the assignment solver.
const COST_SCALE: f64 = 10_000.0;

/// Below this distance the assignment is free.
const SNAP_DIST: f64 = 0.03;

/// Hard Euclidean gate on admissible matrix cells.
const CELL_EUCLIDEAN_GATE: f64 = 0.6;

/// Acceptance window for a track that has never been updated.
const FRESH_TRACK_WINDOW: f64 = 0.45;

/// Acceptance window for a track with at least one observation.
const KNOWN_TRACK_WINDOW: f64 = 0.35;

/// A paired leg faster than this may be about to stretch the pair.
const STRETCH_SPEED: f64 = 0.2;

/// Proximity of the inter-leg distance to its bound that triggers the
/// adaptive covariance reset.
const STRETCH_SLACK: f64 = 0.1;

impl LegTracker {
    /// Runs the default association policy for one scan.
    pub(crate) fn gnn_munkres(&mut self, centroids: &[Point]) {
        // When a fast pair is close to its stretch limit, loosen the
        // leading filter so it tolerates the imminent step change.
        for i in 0..self.legs.len() {
            if !self.legs[i].has_pair() || !self.legs[i].is_confirmed() {
                continue;
            }
            if self.legs[i].velocity().norm() <= STRETCH_SPEED {
                continue;
            }
            let pid = self.legs[i].people_id();
            if let Some(j) = (i + 1..self.legs.len()).find(|&j| self.legs[j].people_id() == pid) {
                let dist = self.legs[i].position().distance(&self.legs[j].position());
                if self.config.max_dist_btw_legs - dist < STRETCH_SLACK {
                    trace!(leg_id = self.legs[i].leg_id(), "pair stretch reset");
                    self.legs[i].reset_error_cov_and_state();
                }
            }
        }

        for leg in &mut self.legs {
            leg.predict();
        }

        if centroids.is_empty() {
            return;
        }

        let tracks = std::mem::take(&mut self.legs);
        let mut fused = self.assign_munkres(centroids, tracks);
        self.cull_dead_in(&mut fused);
        self.legs = fused;
    }

    /// Optimal assignment of measurements to the given tracks.
    ///
    /// Consumes the tracks and returns the fused set: updated and missed
    /// tracks plus tracks seeded from unmatched measurements.
    pub(crate) fn assign_munkres(&mut self, meas: &[Point], mut tracks: Vec<Leg>) -> Vec<Leg> {
        let m = meas.len();
        let t = tracks.len();
        if m == 0 {
            return tracks;
        }
        let n = m.max(t);
        let gate = self.config.mahalanobis_dist_gate;
        let max_cost = (self.config.max_cost * COST_SCALE) as i64;

        // Pad cells stay at zero so dummy rows and columns absorb the
        // surplus side for free.
        let mut matrix = Matrix::new(n, n, 0i64);
        for (r, p) in meas.iter().enumerate() {
            for (c, track) in tracks.iter().enumerate() {
                let d = p.distance(&track.position());
                let maha = mahalanobis(p, track);
                matrix[(r, c)] = if d <= SNAP_DIST {
                    0
                } else if maha < gate && d < CELL_EUCLIDEAN_GATE {
                    (maha * COST_SCALE) as i64
                } else {
                    max_cost
                };
            }
        }

        let (_, assignment) = kuhn_munkres_min(&matrix);

        let mut seeded = Vec::new();
        for (r, &c) in assignment.iter().enumerate() {
            match (r < m, c < t) {
                (true, true) => {
                    let d = meas[r].distance(&tracks[c].position());
                    let maha = mahalanobis(&meas[r], &tracks[c]);
                    let accepted = maha < gate
                        && ((tracks[c].observations() == 0 && d < FRESH_TRACK_WINDOW)
                            || (tracks[c].observations() > 0 && d < KNOWN_TRACK_WINDOW));
                    if accepted {
                        tracks[c].update(meas[r]);
                    } else {
                        // too much of a jump: keep the track missed and
                        // treat the measurement as something new
                        tracks[c].missed();
                        seeded.push(self.init_leg(meas[r]));
                    }
                }
                (false, true) => tracks[c].missed(),
                (true, false) => seeded.push(self.init_leg(meas[r])),
                (false, false) => {}
            }
        }

        tracks.extend(seeded);
        tracks
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TrackerConfig;
    use crate::geometry::Point;
    use crate::tracker::LegTracker;

    fn tracker() -> LegTracker {
        LegTracker::new(TrackerConfig {
            frequency: 0.1,
            variance_observation: 0.01,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn unmatched_measurements_seed_tracks() {
        let mut tracker = tracker();
        tracker.gnn_munkres(&[Point::new(0.3, -0.15), Point::new(0.3, 0.15)]);
        assert_eq!(tracker.legs().len(), 2);
        let ids: Vec<u32> = tracker.legs().iter().map(|l| l.leg_id()).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn steady_measurements_update_instead_of_seeding() {
        let mut tracker = tracker();
        for _ in 0..5 {
            tracker.gnn_munkres(&[Point::new(0.3, -0.15), Point::new(0.3, 0.15)]);
        }
        assert_eq!(tracker.legs().len(), 2);
        assert!(tracker.legs().iter().all(|l| l.observations() >= 4));
        assert!(tracker.legs().iter().all(|l| l.occluded_age() == 0));
    }

    #[test]
    fn a_vanished_reflector_marks_its_track_missed() {
        let mut tracker = tracker();
        for _ in 0..3 {
            tracker.gnn_munkres(&[Point::new(0.3, -0.15), Point::new(0.3, 0.15)]);
        }
        tracker.gnn_munkres(&[Point::new(0.3, -0.15)]);
        let occluded: Vec<u32> = tracker.legs().iter().map(|l| l.occluded_age()).collect();
        assert!(occluded.contains(&0));
        assert!(occluded.contains(&1));
    }

    #[test]
    fn a_large_jump_seeds_a_new_track_and_misses_the_old() {
        let mut tracker = tracker();
        for _ in 0..3 {
            tracker.gnn_munkres(&[Point::new(0.1, 0.0)]);
        }
        let old_id = tracker.legs()[0].leg_id();
        // far inside the matrix gate is impossible, the cell carries
        // max_cost, so the pad handling splits the pair of events
        tracker.gnn_munkres(&[Point::new(0.45, 0.3)]);
        assert_eq!(tracker.legs().len(), 2);
        let old = tracker.legs().iter().find(|l| l.leg_id() == old_id).unwrap();
        assert_eq!(old.occluded_age(), 1);
        let fresh = tracker.legs().iter().find(|l| l.leg_id() != old_id).unwrap();
        assert_eq!(fresh.observations(), 0);
    }
}
