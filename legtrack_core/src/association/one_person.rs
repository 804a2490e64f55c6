//! Single-person tracking with a dynamic region of interest.
//!
//! At most two tracks exist. Tracks bootstrap from the cluster centroid
//! closest to a configured reference point, matching runs under tight
//! Euclidean gates with a protective radius around the partner leg, and
//! the region of interest follows the pair. A track leaving the static
//! region or a pair stretched beyond the inter-leg bound resets the
//! whole integrator; that is the nominal "person departed" path.

use tracing::debug;

use super::mahalanobis;
use crate::geometry::{Bounds, Point};
use crate::tracker::LegTracker;

/// Gate for adopting a bootstrap centroid near the reference point.
const BOOTSTRAP_GATE: f64 = 0.3;

/// Euclidean gate when one centroid is offered to two tracks.
const SINGLE_MEAS_GATE: f64 = 0.25;

/// Euclidean gate when several centroids are offered to one track.
const SINGLE_TRACK_GATE: f64 = 0.3;

/// A centroid this close to a track bypasses ranking; a centroid this
/// close to the partner is refused to protect an occluded leg.
const PROTECT_RADIUS: f64 = 0.05;

/// Occlusion age beyond which a paired track is no longer predicted.
const PREDICT_OCCLUSION_LIMIT: u32 = 3;

/// Margin the dynamic region keeps around the pair.
const DYNAMIC_ROI_MARGIN: f64 = 0.2;

/// Below this area the dynamic region collapses back to the static one.
const MIN_DYNAMIC_ROI_AREA: f64 = 0.17;

impl LegTracker {
    /// Runs the single-person policy for one scan.
    pub(crate) fn match_one_person(&mut self, centroids: &[Point]) {
        let mut centroids: Vec<Point> = centroids.to_vec();

        let mut to_reset = false;
        for i in 0..self.legs.len() {
            if self.legs[i].is_dead() {
                continue;
            }
            if self.legs.len() == 2 {
                if self.legs[i].occluded_age() < PREDICT_OCCLUSION_LIMIT {
                    self.legs[i].predict();
                }
            } else {
                self.legs[i].predict();
            }
            if !self.static_roi.contains(&self.legs[i].position()) {
                to_reset = true;
                break;
            }
        }
        if self.legs.len() == 2 {
            let dist = self.legs[0].position().distance(&self.legs[1].position());
            if dist > self.config.max_dist_btw_legs {
                to_reset = true;
            }
        }
        if to_reset {
            debug!("person left the tracking region, resetting");
            self.reset_one_person();
            return;
        }

        if centroids.is_empty() {
            for leg in &mut self.legs {
                leg.missed();
            }
            return;
        }

        if centroids.len() == 1 {
            self.match_single_centroid(&mut centroids);
        } else if self.legs.len() == 1 {
            self.match_single_track(&mut centroids);
        } else if self.legs.len() == 2 {
            self.match_pair_jointly(&centroids);
        }

        if self.legs.len() == 2 {
            let around = Bounds::around(
                &self.legs[0].position(),
                &self.legs[1].position(),
                DYNAMIC_ROI_MARGIN,
            )
            .clipped_to(&self.static_roi);
            self.dynamic_roi = if around.area() < MIN_DYNAMIC_ROI_AREA {
                self.static_roi
            } else {
                around
            };
            return;
        }

        self.bootstrap_near_reference(&centroids);
    }

    /// One centroid, one or two tracks: best Mahalanobis under a tight
    /// Euclidean gate, refusing a centroid that sits on the partner.
    fn match_single_centroid(&mut self, centroids: &mut Vec<Point>) {
        let p = centroids[0];
        let mut min_dist = self.config.max_cost;
        let mut index = None;
        for i in 0..self.legs.len() {
            if self.legs.len() == 2 {
                let other = self.legs[1 - i].position();
                if p.distance(&other) <= PROTECT_RADIUS {
                    continue;
                }
            }
            let maha = mahalanobis(&p, &self.legs[i]);
            let euclid = p.distance(&self.legs[i].position());
            if maha < min_dist && euclid < SINGLE_MEAS_GATE {
                index = Some(i);
                min_dist = maha;
            }
        }
        if let Some(i) = index {
            self.legs[i].update(p);
            centroids.clear();
            if self.legs.len() == 2 {
                self.legs[1 - i].missed();
            }
        }
    }

    /// Several centroids, one track.
    fn match_single_track(&mut self, centroids: &mut Vec<Point>) {
        let mut min_dist = self.config.max_cost;
        let mut index = None;
        for (i, c) in centroids.iter().enumerate() {
            let euclid = c.distance(&self.legs[0].position());
            if euclid <= PROTECT_RADIUS {
                index = Some(i);
                break;
            }
            let maha = mahalanobis(c, &self.legs[0]);
            if maha < min_dist && euclid < SINGLE_TRACK_GATE {
                index = Some(i);
                min_dist = maha;
            }
        }
        match index {
            Some(i) => {
                let p = centroids.remove(i);
                self.legs[0].update(p);
            }
            None => self.legs[0].missed(),
        }
    }

    /// Several centroids, two tracks: minimize the summed Mahalanobis
    /// distance over ordered pairs, with an on-top-of-track fallback.
    fn match_pair_jointly(&mut self, centroids: &[Point]) {
        let mut total_cost = self.config.max_cost;
        let (mut fst_index, mut snd_index) = (None, None);
        let (mut best_fst, mut best_snd) = (None, None);

        for (i, ci) in centroids.iter().enumerate() {
            let fst_euclid = ci.distance(&self.legs[0].position());
            let fst_cost = if fst_euclid <= PROTECT_RADIUS {
                best_fst = Some(i);
                0.0
            } else {
                mahalanobis(ci, &self.legs[0])
            };
            for (j, cj) in centroids.iter().enumerate() {
                if i == j {
                    continue;
                }
                let snd_euclid = cj.distance(&self.legs[1].position());
                let snd_cost = if snd_euclid <= PROTECT_RADIUS {
                    best_snd = Some(j);
                    0.0
                } else {
                    mahalanobis(cj, &self.legs[1])
                };
                if fst_cost + snd_cost < total_cost {
                    total_cost = fst_cost + snd_cost;
                    fst_index = Some(i);
                    snd_index = Some(j);
                }
            }
        }

        match fst_index.or(best_fst) {
            Some(i) => self.legs[0].update(centroids[i]),
            None => self.legs[0].missed(),
        }
        match snd_index.or(best_snd) {
            Some(j) => self.legs[1].update(centroids[j]),
            None => self.legs[1].missed(),
        }
    }

    /// Greedily adopts centroids near the reference point until two
    /// tracks exist.
    fn bootstrap_near_reference(&mut self, centroids: &[Point]) {
        let ref_point = Point::new(self.config.ref_point_x, self.config.ref_point_y);
        let mut used: Option<usize> = None;
        while self.legs.len() < 2 {
            let mut best: Option<(usize, f64)> = None;
            for (i, c) in centroids.iter().enumerate() {
                if used == Some(i) {
                    continue;
                }
                let dist = ref_point.distance(c);
                if dist < BOOTSTRAP_GATE && best.map_or(true, |(_, d)| dist < d) {
                    best = Some((i, dist));
                }
            }
            match best {
                Some((i, _)) => {
                    used = Some(i);
                    let leg = self.init_leg(centroids[i]);
                    self.legs.push(leg);
                }
                None => break,
            }
            if used.is_some() && centroids.len() <= 1 {
                break;
            }
        }
    }

    /// Clears tracks, the dynamic region and the left/right state.
    pub(crate) fn reset_one_person(&mut self) {
        self.legs.clear();
        self.dynamic_roi = self.static_roi;
        self.gait.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::tracker::LegTracker;

    fn tracker() -> LegTracker {
        LegTracker::new(TrackerConfig {
            is_one_person_to_track: true,
            frequency: 0.1,
            variance_observation: 0.01,
            x_lower_limit: -2.0,
            x_upper_limit: 2.0,
            y_lower_limit: -2.0,
            y_upper_limit: 2.0,
            ref_point_x: 0.3,
            ref_point_y: 0.0,
            ..Default::default()
        })
        .unwrap()
    }

    fn pair() -> [Point; 2] {
        [Point::new(0.3, -0.15), Point::new(0.3, 0.15)]
    }

    #[test]
    fn bootstrap_adopts_centroids_near_the_reference_point() {
        let mut tracker = tracker();
        tracker.match_one_person(&pair());
        assert_eq!(tracker.legs().len(), 2);
    }

    #[test]
    fn far_centroids_do_not_bootstrap() {
        let mut tracker = tracker();
        tracker.match_one_person(&[Point::new(1.5, 1.5), Point::new(1.4, 1.4)]);
        assert!(tracker.legs().is_empty());
    }

    #[test]
    fn occluded_partner_is_marked_missed() {
        let mut tracker = tracker();
        for _ in 0..3 {
            tracker.match_one_person(&pair());
        }
        // only the lower leg remains visible
        tracker.match_one_person(&[Point::new(0.3, -0.15)]);
        let ages: Vec<u32> = tracker.legs().iter().map(|l| l.occluded_age()).collect();
        assert!(ages.contains(&0));
        assert!(ages.contains(&1));
    }

    #[test]
    fn centroid_on_top_of_the_partner_is_refused() {
        let mut tracker = tracker();
        for _ in 0..3 {
            tracker.match_one_person(&pair());
        }
        // a lone centroid sitting exactly on leg 1 must not be given to
        // leg 0, and goes to leg 1 instead
        tracker.match_one_person(&[Point::new(0.3, 0.15)]);
        let upper = tracker
            .legs()
            .iter()
            .find(|l| l.position().y > 0.0)
            .unwrap();
        assert_eq!(upper.occluded_age(), 0);
    }

    #[test]
    fn dynamic_roi_follows_the_pair() {
        let mut tracker = tracker();
        for _ in 0..3 {
            tracker.match_one_person(&pair());
        }
        let roi = tracker.dynamic_roi();
        assert!(roi.x_min > -2.0 && roi.x_max < 2.0);
        assert!(roi.contains(&Point::new(0.3, 0.0)));
    }

    #[test]
    fn separating_pair_resets_the_tracker() {
        let mut tracker = tracker();
        tracker.match_one_person(&pair());
        assert_eq!(tracker.legs().len(), 2);
        // drive the legs apart beyond max_dist_btw_legs
        let mut offset = 0.15;
        let mut reset_seen = false;
        for _ in 0..40 {
            offset += 0.03;
            tracker.match_one_person(&[
                Point::new(0.3, -offset),
                Point::new(0.3, offset),
            ]);
            if tracker.legs().is_empty() {
                reset_seen = true;
                break;
            }
        }
        assert!(reset_seen, "pair separation must reset the tracker");
        assert_eq!(tracker.dynamic_roi(), tracker.static_roi());
    }
}
