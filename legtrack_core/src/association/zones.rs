//! Bounding-box zone tracking.
//!
//! Every known pair owns a persistent axis-aligned zone. Centroids
//! falling inside a zone are consumed by a restricted two-track matcher;
//! whatever remains is associated by GNN against the tracks that do not
//! belong to a person yet, so established pairs are never reshuffled by
//! the second pass.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::mahalanobis;
use crate::geometry::{Bounds, Point};
use crate::tracker::LegTracker;

/// Euclidean gate for a lone in-zone centroid.
const ZONE_SINGLE_GATE: f64 = 0.3;

/// Euclidean acceptance for the jointly matched centroids.
const ZONE_PAIR_GATE: f64 = 0.33;

/// Persistent tracking zone bracketing one pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingZone {
    people_id: u32,
    fst_leg_id: u32,
    snd_leg_id: u32,
    bounds: Bounds,
    scans_without_update: u32,
}

impl TrackingZone {
    pub fn new(
        fst_leg_id: u32,
        snd_leg_id: u32,
        people_id: u32,
        a: &Point,
        b: &Point,
        margin: f64,
    ) -> Self {
        Self {
            people_id,
            fst_leg_id,
            snd_leg_id,
            bounds: Bounds::around(a, b, margin),
            scans_without_update: 0,
        }
    }

    /// Recomputes the zone rectangle from its two legs.
    pub fn refresh(&mut self, a: &Point, b: &Point, margin: f64) {
        self.bounds = Bounds::around(a, b, margin);
    }

    pub fn contains(&self, p: &Point) -> bool {
        self.bounds.contains(p)
    }

    pub fn mark_updated(&mut self) {
        self.scans_without_update = 0;
    }

    pub fn increment_without_update(&mut self) {
        self.scans_without_update += 1;
    }

    pub fn scans_without_update(&self) -> u32 {
        self.scans_without_update
    }

    pub fn people_id(&self) -> u32 {
        self.people_id
    }

    pub fn fst_leg_id(&self) -> u32 {
        self.fst_leg_id
    }

    pub fn snd_leg_id(&self) -> u32 {
        self.snd_leg_id
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }
}

impl LegTracker {
    /// Runs the zone-tracking policy for one scan.
    pub(crate) fn bounding_box_tracking(&mut self, centroids: &[Point]) {
        for leg in &mut self.legs {
            if !leg.is_dead() {
                leg.predict();
            }
        }

        // zone geometry follows the predicted member positions
        for z in 0..self.tracking_zones.len() {
            let fst = self.leg_index_by_id(self.tracking_zones[z].fst_leg_id());
            let snd = self.leg_index_by_id(self.tracking_zones[z].snd_leg_id());
            match (fst, snd) {
                (Some(f), Some(s)) => {
                    let (a, b) = (self.legs[f].position(), self.legs[s].position());
                    self.tracking_zones[z].refresh(
                        &a,
                        &b,
                        self.config.tracking_bounding_box_uncertainty,
                    );
                }
                _ => warn!(
                    people_id = self.tracking_zones[z].people_id(),
                    "tracking zone lost a member leg"
                ),
            }
        }

        if centroids.is_empty() {
            return;
        }

        let mut used = vec![false; centroids.len()];
        for z in 0..self.tracking_zones.len() {
            let in_zone: Vec<usize> = (0..centroids.len())
                .filter(|&j| !used[j] && self.tracking_zones[z].contains(&centroids[j]))
                .collect();
            for &j in &in_zone {
                used[j] = true;
            }
            let points: Vec<Point> = in_zone.iter().map(|&j| centroids[j]).collect();
            self.match_centroids_to_zone(z, &points);
        }

        let rest: Vec<Point> = (0..centroids.len())
            .filter(|&j| !used[j])
            .map(|j| centroids[j])
            .collect();
        if rest.is_empty() {
            return;
        }

        // second pass never touches tracks that already belong to a person
        let legs = std::mem::take(&mut self.legs);
        let (with_id, without_id): (Vec<_>, Vec<_>) =
            legs.into_iter().partition(|l| l.people_id().is_some());
        let mut fused = self.assign_munkres(&rest, without_id);
        self.cull_dead_in(&mut fused);
        self.legs = with_id;
        self.legs.extend(fused);
    }

    /// Restricted matcher for the centroids inside one zone.
    fn match_centroids_to_zone(&mut self, zone_index: usize, points: &[Point]) {
        let (fst, snd) = {
            let zone = &self.tracking_zones[zone_index];
            (
                self.leg_index_by_id(zone.fst_leg_id()),
                self.leg_index_by_id(zone.snd_leg_id()),
            )
        };
        let (Some(fst), Some(snd)) = (fst, snd) else {
            return;
        };
        if points.is_empty() {
            return;
        }

        let mut updated = false;
        if points.len() == 1 {
            let p = points[0];
            let fst_euclid = p.distance(&self.legs[fst].position());
            let snd_euclid = p.distance(&self.legs[snd].position());
            if fst_euclid <= ZONE_SINGLE_GATE || snd_euclid <= ZONE_SINGLE_GATE {
                if mahalanobis(&p, &self.legs[fst]) <= mahalanobis(&p, &self.legs[snd]) {
                    self.legs[fst].update(p);
                } else {
                    self.legs[snd].update(p);
                }
                updated = true;
            }
        } else {
            let mut total_cost = self.config.max_cost;
            let (mut fst_index, mut snd_index) = (None, None);
            for (i, ci) in points.iter().enumerate() {
                let fst_cost = mahalanobis(ci, &self.legs[fst]);
                for (j, cj) in points.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let snd_cost = mahalanobis(cj, &self.legs[snd]);
                    if fst_cost + snd_cost < total_cost {
                        total_cost = fst_cost + snd_cost;
                        fst_index = Some(i);
                        snd_index = Some(j);
                    }
                }
            }
            if let (Some(i), Some(j)) = (fst_index, snd_index) {
                if points[i].distance(&self.legs[fst].position()) < ZONE_PAIR_GATE {
                    self.legs[fst].update(points[i]);
                    updated = true;
                }
                if points[j].distance(&self.legs[snd].position()) < ZONE_PAIR_GATE {
                    self.legs[snd].update(points[j]);
                    updated = true;
                }
            }
        }

        let (a, b) = (self.legs[fst].position(), self.legs[snd].position());
        let zone = &mut self.tracking_zones[zone_index];
        zone.refresh(&a, &b, self.config.tracking_bounding_box_uncertainty);
        if updated {
            zone.mark_updated();
        }
    }
}
