//! Pairing of leg tracks into people, and people-id assignment.

use tracing::warn;

use crate::geometry::Point;
use crate::tracker::LegTracker;

/// Normalization constant of the historical-gain formula.
const GAIN_DIST_NORM: f64 = 200.0;

/// Shared-history snapshots disagree in size; the pairing pass aborts.
pub(crate) struct HistoryMismatch;

impl LegTracker {
    /// Dissolves over-stretched pairs, then tries to pair every unpaired
    /// eligible track.
    pub(crate) fn find_people(&mut self) {
        self.check_distance_of_legs();
        for i in 0..self.legs.len() {
            let leg = &self.legs[i];
            if leg.has_pair() {
                continue;
            }
            if leg.people_id().is_none() && !leg.is_confirmed() {
                continue;
            }
            match self.find_second_leg(i) {
                Ok(Some(j)) => self.assign_people_id(i, j),
                Ok(None) => {}
                Err(HistoryMismatch) => {
                    warn!("pairing: history snapshots disagree in size, aborting the pass");
                    return;
                }
            }
        }
    }

    /// Clears pairs whose legs have drifted beyond `max_dist_btw_legs`.
    fn check_distance_of_legs(&mut self) {
        for i in 0..self.legs.len() {
            if !self.legs[i].has_pair() {
                continue;
            }
            let pid = self.legs[i].people_id();
            if let Some(j) = (i + 1..self.legs.len()).find(|&j| self.legs[j].people_id() == pid) {
                let dist = self.legs[i].position().distance(&self.legs[j].position());
                if dist > self.config.max_dist_btw_legs {
                    self.separate_legs(i, j);
                }
            }
        }
    }

    /// Breaks one pair and retires its zone.
    pub(crate) fn separate_legs(&mut self, i: usize, j: usize) {
        let pid = self.legs[i].people_id();
        self.legs[i].set_has_pair(false);
        self.legs[j].set_has_pair(false);
        self.legs[i].set_people_id(None);
        self.legs[j].set_people_id(None);
        if self.config.is_bounding_box_tracking {
            if let Some(pid) = pid {
                if let Some(z) = self
                    .tracking_zones
                    .iter()
                    .position(|z| z.people_id() == pid)
                {
                    self.tracking_zones.swap_remove(z);
                }
            }
        }
    }

    /// Candidate search for the partner of `fst`.
    ///
    /// With several candidates the winner maximizes a forgetting-weighted
    /// gain over the shared history; a candidate whose historical
    /// distance ever exceeded the pair bound is rejected outright.
    fn find_second_leg(&self, fst: usize) -> Result<Option<usize>, HistoryMismatch> {
        let fst_pos = self.legs[fst].position();
        let candidates: Vec<usize> = (fst + 1..self.legs.len())
            .filter(|&i| {
                let leg = &self.legs[i];
                if leg.has_pair() || !leg.is_confirmed() {
                    return false;
                }
                let dist = fst_pos.distance(&leg.position());
                dist >= self.config.leg_radius && dist <= self.config.max_dist_btw_legs
            })
            .collect();

        match candidates.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            _ => {
                let mut best: Option<usize> = None;
                let mut max_gain = 0.0;
                for &candidate in &candidates {
                    if let Some(gain) = self.history_gain(fst, candidate)? {
                        if gain > max_gain {
                            max_gain = gain;
                            best = Some(candidate);
                        }
                    }
                }
                Ok(best)
            }
        }
    }

    /// Mean forgetting-weighted closeness over the two tracks' shared
    /// history. `None` marks an invalid candidate.
    fn history_gain(&self, a: usize, b: usize) -> Result<Option<f64>, HistoryMismatch> {
        let depth = self.config.min_observations;
        let dims = self.config.state_dimensions;
        let ha = self.legs[a].history();
        let hb = self.legs[b].history();
        if ha.len() != depth || hb.len() != depth {
            return Err(HistoryMismatch);
        }

        let mut gain = 0.0;
        for slot in 0..depth - 1 {
            let (sa, sb) = (&ha[slot], &hb[slot]);
            if sa.len() != dims || sb.len() != dims {
                return Err(HistoryMismatch);
            }
            let dist = ((sa[0] - sb[0]).powi(2) + (sa[1] - sb[1]).powi(2)).sqrt();
            if dist > self.config.max_dist_btw_legs {
                return Ok(None);
            }
            let forgetting = 0.5_f64.powi((depth - 1 - slot) as i32);
            gain += forgetting * (1.0 - dist / GAIN_DIST_NORM.sqrt());
        }
        Ok(Some(gain / depth as f64))
    }

    /// Gives both legs a people-id and marks them paired.
    ///
    /// Id source preference: the short-term memory of lost pairs, then an
    /// id one of the legs still carries, then the smaller of two
    /// conflicting ids, then a fresh one.
    pub(crate) fn assign_people_id(&mut self, fst: usize, snd: usize) {
        let midpoint = Point::midpoint(&self.legs[fst].position(), &self.legs[snd].position());
        let recalled = self
            .memory
            .recall(&midpoint, self.config.max_dist_btw_legs);

        let id = match recalled {
            Some(id) => id,
            None => match (self.legs[fst].people_id(), self.legs[snd].people_id()) {
                (Some(f), None) => {
                    self.memory.erase_retired(f);
                    f
                }
                (Some(f), Some(s)) if f == s => {
                    self.memory.erase_retired(f);
                    f
                }
                (None, Some(s)) => {
                    self.memory.erase_retired(s);
                    s
                }
                (Some(f), Some(s)) => {
                    self.memory.erase_retired(f);
                    self.memory.erase_retired(s);
                    f.min(s)
                }
                (None, None) => {
                    let fresh = self.people_id_counter;
                    self.people_id_counter += 1;
                    fresh
                }
            },
        };

        self.legs[fst].set_people_id(Some(id));
        self.legs[snd].set_people_id(Some(id));
        self.legs[fst].set_has_pair(true);
        self.legs[snd].set_has_pair(true);

        if self.config.is_bounding_box_tracking {
            let zone = crate::association::zones::TrackingZone::new(
                self.legs[fst].leg_id(),
                self.legs[snd].leg_id(),
                id,
                &self.legs[fst].position(),
                &self.legs[snd].position(),
                self.config.tracking_bounding_box_uncertainty,
            );
            self.tracking_zones.push(zone);
        }
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
            x_lower_limit: -2.0,
            x_upper_limit: 2.0,
            y_lower_limit: -2.0,
            y_upper_limit: 2.0,
            ..Default::default()
        })
        .unwrap()
    }

    /// Drives the GNN policy with fixed centroids for `scans` scans.
    fn drive(tracker: &mut LegTracker, centroids: &[Point], scans: usize) {
        for _ in 0..scans {
            tracker.gnn_munkres(centroids);
            tracker.find_people();
        }
    }

    #[test]
    fn confirmed_close_tracks_pair_up() {
        let mut tracker = tracker();
        drive(
            &mut tracker,
            &[Point::new(0.3, -0.15), Point::new(0.3, 0.15)],
            5,
        );
        assert_eq!(tracker.legs().len(), 2);
        assert!(tracker.legs().iter().all(|l| l.has_pair()));
        assert_eq!(
            tracker.legs()[0].people_id(),
            tracker.legs()[1].people_id()
        );
    }

    #[test]
    fn distant_tracks_stay_single() {
        let mut tracker = tracker();
        drive(
            &mut tracker,
            &[Point::new(0.3, -0.45), Point::new(0.3, 0.45)],
            6,
        );
        assert!(tracker.legs().iter().all(|l| !l.has_pair()));
    }

    #[test]
    fn tracks_closer_than_a_leg_radius_stay_single() {
        let mut tracker = tracker();
        drive(
            &mut tracker,
            &[Point::new(0.3, -0.03), Point::new(0.3, 0.03)],
            6,
        );
        assert!(tracker.legs().iter().all(|l| !l.has_pair()));
    }

    #[test]
    fn overstretched_pairs_dissolve() {
        let mut tracker = tracker();
        let near = [Point::new(0.3, -0.15), Point::new(0.3, 0.15)];
        drive(&mut tracker, &near, 5);
        assert!(tracker.legs().iter().all(|l| l.has_pair()));

        // walk the legs apart until the pair distance bound breaks
        let mut offset = 0.15;
        for _ in 0..30 {
            offset += 0.03;
            drive(
                &mut tracker,
                &[Point::new(0.3, -offset), Point::new(0.3, offset)],
                1,
            );
        }
        assert!(tracker.legs().iter().all(|l| !l.has_pair()));
        assert!(tracker.legs().iter().all(|l| l.people_id().is_none()));
    }

    #[test]
    fn the_historically_closer_candidate_wins() {
        let mut tracker = tracker();
        // two candidate partners for the first leg, one walking close to
        // it and one near the edge of the pairing range
        let trio = [
            Point::new(0.3, -0.15),
            Point::new(0.3, 0.15),
            Point::new(0.3, -0.75),
        ];
        drive(&mut tracker, &trio, 6);
        let paired: Vec<_> = tracker.legs().iter().filter(|l| l.has_pair()).collect();
        assert_eq!(paired.len(), 2);
        // the gain favors the companion at 0.30 m over the one at 0.60 m
        assert!(paired.iter().all(|l| l.position().y.abs() < 0.2));
        let single = tracker.legs().iter().find(|l| !l.has_pair()).unwrap();
        assert!(single.position().y < -0.5);
    }
}
