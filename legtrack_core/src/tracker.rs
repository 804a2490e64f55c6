//! The tracker object and the per-scan pipeline.
//!
//! `LegTracker` owns every mutable collection: live tracks, the retired
//! and last-seen memory, tracking zones, the dynamic region of interest,
//! the left/right state, people paths and the id counters. All of it is
//! mutated only from `process_scan`, which runs to completion before the
//! next scan is accepted.

use std::collections::HashSet;

use legtrack_env::transform::normalize_frame_id;
use legtrack_env::{LaserScan, OccupancyGrid, TransformProvider};
use tracing::{debug, warn};

use crate::association::zones::TrackingZone;
use crate::clustering::cluster_centroids;
use crate::config::{AssociationMode, ConfigError, TrackerConfig};
use crate::filter::filter_cloud;
use crate::gait::GaitLabeler;
use crate::geometry::{Bounds, Point};
use crate::memory::PeopleMemory;
use crate::output::{LegChannel, LegRecord, ScanOutput};
use crate::track::Leg;
use crate::visualization::{
    leg_velocity_arrow, people_ellipse, Color, EllipseMarker, PathStore, RectMarker,
};

/// Seconds of failed scans after which single-person state is forgotten.
const ONE_PERSON_STALE_SECS: f64 = 5.0;

/// Seconds a tracking zone survives without a member update.
const ZONE_STALE_SECS: f64 = 5.0;

/// Multi-object leg tracker over a stream of planar scans.
pub struct LegTracker {
    pub(crate) config: TrackerConfig,
    pub(crate) static_roi: Bounds,
    pub(crate) dynamic_roi: Bounds,
    pub(crate) legs: Vec<Leg>,
    pub(crate) memory: PeopleMemory,
    pub(crate) tracking_zones: Vec<TrackingZone>,
    pub(crate) gait: GaitLabeler,
    pub(crate) paths: PathStore,
    pub(crate) next_leg_id: u32,
    pub(crate) people_id_counter: u32,
    scans_since_full_run: u32,
    map: Option<OccupancyGrid>,
}

impl LegTracker {
    /// Builds a tracker, refusing to start on a misconfiguration.
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let static_roi = Bounds::new(
            config.x_lower_limit,
            config.x_upper_limit,
            config.y_lower_limit,
            config.y_upper_limit,
        );
        Ok(Self {
            config,
            static_roi,
            dynamic_roi: static_roi,
            legs: Vec::new(),
            memory: PeopleMemory::new(),
            tracking_zones: Vec::new(),
            gait: GaitLabeler::new(),
            paths: PathStore::new(),
            next_leg_id: 0,
            people_id_counter: 0,
            scans_since_full_run: 0,
            map: None,
        })
    }

    /// Replaces the occupancy map between scans (copy-on-assignment).
    pub fn set_map(&mut self, grid: OccupancyGrid) {
        self.map = Some(grid);
    }

    /// Processes one scan and returns everything to emit for it.
    pub fn process_scan(
        &mut self,
        scan: &LaserScan,
        transforms: &dyn TransformProvider,
    ) -> ScanOutput {
        let evicted = self.memory.age_and_evict(&self.config, &self.static_roi);
        for people_id in evicted {
            self.paths.drop_path(people_id);
        }

        if self.config.is_one_person_to_track {
            if self.scans_since_full_run as f64 * self.config.frequency > ONE_PERSON_STALE_SECS {
                debug!("no leg clusters for a while, forgetting single-person state");
                self.gait.reset();
                self.dynamic_roi = self.static_roi;
                self.scans_since_full_run = 0;
            }
            self.scans_since_full_run += 1;
        }

        self.age_tracking_zones();

        if self.config.with_map && self.map.is_none() {
            return ScanOutput::skipped(None);
        }

        let roi = if self.config.is_one_person_to_track {
            self.dynamic_roi
        } else {
            self.static_roi
        };
        let roi_marker = Some(RectMarker { bounds: roi, z: 0.0 });

        let source_frame = normalize_frame_id(&scan.frame_id);
        let to_tracking = match transforms.lookup(&self.config.transform_link, source_frame) {
            Ok(tf) => tf,
            Err(err) => {
                warn!(%err, "transform lookup failed, predicting only");
                self.predict_only();
                return ScanOutput::skipped(roi_marker);
            }
        };
        let points: Vec<Point> = scan
            .project()
            .into_iter()
            .map(|p| to_tracking.apply(p).into())
            .collect();

        let map_transform = match (&self.map, self.config.with_map) {
            (Some(grid), true) => {
                match transforms.lookup(&grid.frame_id, &self.config.transform_link) {
                    Ok(tf) => Some(tf),
                    Err(err) => {
                        warn!(%err, "map transform lookup failed, predicting only");
                        self.predict_only();
                        return ScanOutput::skipped(roi_marker);
                    }
                }
            }
            _ => None,
        };
        let map_context = match (&self.map, &map_transform) {
            (Some(grid), Some(tf)) => Some((grid, tf)),
            _ => None,
        };

        let filtered = match filter_cloud(&points, &roi, &self.config, map_context) {
            Some(filtered) => filtered,
            None => {
                self.predict_only();
                return ScanOutput::skipped(roi_marker);
            }
        };

        let paired_positions = self.paired_leg_positions();
        let centroids = cluster_centroids(&filtered, &paired_positions, &self.config);
        if centroids.is_empty() {
            self.predict_only();
            return ScanOutput::skipped(roi_marker);
        }

        match self.config.association_mode() {
            AssociationMode::OnePerson => self.match_one_person(&centroids),
            AssociationMode::BoundingBox => self.bounding_box_tracking(&centroids),
            AssociationMode::GlobalNearestNeighbor => self.gnn_munkres(&centroids),
        }

        let leg_markers = self
            .legs
            .iter()
            .map(|leg| {
                leg_velocity_arrow(
                    leg.position(),
                    leg.velocity(),
                    self.config.z_coordinate,
                    self.gait.is_left(leg.leg_id()),
                )
            })
            .collect();

        self.find_people();

        let mut records = Vec::new();
        if self.config.is_one_person_to_track && self.legs.len() == 2 {
            for (index, leg) in self.legs.iter().enumerate() {
                // crossed channel wiring: the first tracked leg goes
                // out on the second channel
                let channel = if index == 0 {
                    LegChannel::Second
                } else {
                    LegChannel::First
                };
                records.push(LegRecord::from_leg(leg, channel));
            }
        }

        let people_markers = self.people_markers_and_paths();

        let zone_markers = self
            .tracking_zones
            .iter()
            .map(|zone| RectMarker {
                bounds: *zone.bounds(),
                z: 0.0,
            })
            .collect();

        if self.config.is_one_person_to_track {
            self.scans_since_full_run = 0;
        }

        ScanOutput {
            records,
            leg_markers,
            people_markers,
            zone_markers,
            roi_marker,
            paths: self.paths.markers(),
        }
    }

    /// Degrade path for a scan with nothing to match: every live track is
    /// predicted and marked missed, dead tracks are culled.
    fn predict_only(&mut self) {
        for leg in &mut self.legs {
            leg.predict();
            leg.missed();
        }
        if !self.config.is_one_person_to_track {
            let mut legs = std::mem::take(&mut self.legs);
            self.cull_dead_in(&mut legs);
            self.legs = legs;
        }
    }

    /// Removes dead tracks from `legs`, keeping the pair bookkeeping and
    /// the short-term memory consistent.
    pub(crate) fn cull_dead_in(&mut self, legs: &mut Vec<Leg>) {
        let mut i = 0;
        while i < legs.len() {
            if !legs[i].is_dead() {
                i += 1;
                continue;
            }
            if legs[i].has_pair() {
                let pid = legs[i].people_id();
                if let Some(j) = (0..legs.len()).find(|&j| j != i && legs[j].people_id() == pid) {
                    legs[j].set_has_pair(false);
                }
                if let Some(pid) = pid {
                    // park so the surviving partner can still be drawn
                    // and so the loss midpoint can be recorded later
                    self.memory.park_retired(pid, legs[i].position());
                }
            } else if let Some(pid) = legs[i].people_id() {
                if let Some(partner) = self.memory.retired_position(pid) {
                    let midpoint = Point::midpoint(&legs[i].position(), &partner);
                    self.memory.remember(pid, midpoint);
                }
            }
            legs.swap_remove(i);
        }
    }

    /// Ages zones; zones starved of updates or missing a member retire.
    fn age_tracking_zones(&mut self) {
        let budget = self.config.scans_within(ZONE_STALE_SECS);
        let mut z = 0;
        while z < self.tracking_zones.len() {
            self.tracking_zones[z].increment_without_update();
            let zone = &self.tracking_zones[z];
            let resolvable = self.leg_index_by_id(zone.fst_leg_id()).is_some()
                && self.leg_index_by_id(zone.snd_leg_id()).is_some();
            if zone.scans_without_update() > budget || !resolvable {
                self.tracking_zones.swap_remove(z);
            } else {
                z += 1;
            }
        }
    }

    /// People ellipses and path updates; feeds the left/right labeler
    /// while exactly one paired person is present.
    fn people_markers_and_paths(&mut self) -> Vec<EllipseMarker> {
        let paired_people: HashSet<u32> = self
            .legs
            .iter()
            .filter(|l| l.has_pair())
            .filter_map(|l| l.people_id())
            .collect();
        let single_pair = paired_people.len() == 1;

        let mut markers = Vec::new();
        for i in 0..self.legs.len() {
            let Some(pid) = self.legs[i].people_id() else {
                continue;
            };
            if !self.legs[i].has_pair() {
                // partner already retired: draw against its parked position
                if let Some(partner) = self.memory.retired_position(pid) {
                    let pos = self.legs[i].position();
                    if pos.distance(&partner) <= self.config.max_dist_btw_legs {
                        self.paths.append(pid, Point::midpoint(&pos, &partner));
                        let color = self.paths.color_of(pid).unwrap_or(Color::RED);
                        markers.push(people_ellipse(
                            pos,
                            partner,
                            self.config.leg_radius,
                            self.config.z_coordinate,
                            color,
                        ));
                    }
                }
            } else if let Some(j) =
                (i + 1..self.legs.len()).find(|&j| self.legs[j].people_id() == Some(pid))
            {
                let (a, b) = (self.legs[i].position(), self.legs[j].position());
                self.paths.append(pid, Point::midpoint(&a, &b));
                let color = self.paths.color_of(pid).unwrap_or(Color::RED);
                markers.push(people_ellipse(
                    a,
                    b,
                    self.config.leg_radius,
                    self.config.z_coordinate,
                    color,
                ));
                if single_pair {
                    self.gait.observe(&self.legs[i], &self.legs[j]);
                }
            }
        }
        markers
    }

    /// Positions of live tracks that belong to a person.
    fn paired_leg_positions(&self) -> Vec<Point> {
        self.legs
            .iter()
            .filter(|l| l.people_id().is_some())
            .map(|l| l.position())
            .collect()
    }

    /// Seeds a new track with a fresh id.
    pub(crate) fn init_leg(&mut self, position: Point) -> Leg {
        let leg = Leg::new(self.next_leg_id, position, &self.config);
        self.next_leg_id += 1;
        leg
    }

    pub(crate) fn leg_index_by_id(&self, leg_id: u32) -> Option<usize> {
        self.legs.iter().position(|l| l.leg_id() == leg_id)
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn tracking_zones(&self) -> &[TrackingZone] {
        &self.tracking_zones
    }

    pub fn gait(&self) -> &GaitLabeler {
        &self.gait
    }

    pub fn memory(&self) -> &PeopleMemory {
        &self.memory
    }

    pub fn dynamic_roi(&self) -> Bounds {
        self.dynamic_roi
    }

    pub fn static_roi(&self) -> Bounds {
        self.static_roi
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legtrack_env::{IdentityTransforms, TransformError};

    /// Raycasts leg circles into a uniform scan, origin at the sensor.
    fn scan_of(legs: &[(f64, f64)], radius: f64) -> LaserScan {
        let beams = 721;
        let angle_min = -std::f64::consts::PI;
        let increment = 2.0 * std::f64::consts::PI / (beams as f64 - 1.0);
        let ranges = (0..beams)
            .map(|k| {
                let angle = angle_min + k as f64 * increment;
                let (dx, dy) = (angle.cos(), angle.sin());
                let mut best = f64::INFINITY;
                for &(cx, cy) in legs {
                    let along = cx * dx + cy * dy;
                    if along <= 0.0 {
                        continue;
                    }
                    let disc = along * along - (cx * cx + cy * cy) + radius * radius;
                    if disc < 0.0 {
                        continue;
                    }
                    let t = along - disc.sqrt();
                    if t > 0.0 && t < best {
                        best = t;
                    }
                }
                best
            })
            .collect();
        LaserScan {
            frame_id: "laser".into(),
            stamp: 0.0,
            angle_min,
            angle_max: angle_min + (beams - 1) as f64 * increment,
            angle_increment: increment,
            range_min: 0.05,
            range_max: 10.0,
            ranges,
        }
    }

    fn wide_config() -> TrackerConfig {
        TrackerConfig {
            frequency: 0.1,
            variance_observation: 0.01,
            x_lower_limit: -2.0,
            x_upper_limit: 2.0,
            y_lower_limit: -2.0,
            y_upper_limit: 2.0,
            ..Default::default()
        }
    }

    fn run(tracker: &mut LegTracker, legs: &[(f64, f64)], radius: f64) -> ScanOutput {
        tracker.process_scan(&scan_of(legs, radius), &IdentityTransforms)
    }

    struct FailingTransforms;
    impl TransformProvider for FailingTransforms {
        fn lookup(
            &self,
            target: &str,
            source: &str,
        ) -> Result<legtrack_env::RigidTransform, TransformError> {
            Err(TransformError::unavailable(target, source))
        }
    }

    #[test]
    fn a_single_reflector_becomes_one_confirmed_track() {
        let mut tracker = LegTracker::new(wide_config()).unwrap();
        run(&mut tracker, &[(0.4, 0.0)], 0.05);
        assert_eq!(tracker.legs().len(), 1);
        assert!(!tracker.legs()[0].is_confirmed());
        for _ in 0..4 {
            run(&mut tracker, &[(0.4, 0.0)], 0.05);
        }
        assert_eq!(tracker.legs().len(), 1);
        assert!(tracker.legs()[0].is_confirmed());
        assert!(!tracker.legs()[0].has_pair());
    }

    #[test]
    fn a_pair_is_born_and_paired() {
        let mut tracker = LegTracker::new(wide_config()).unwrap();
        for _ in 0..5 {
            run(&mut tracker, &[(0.4, -0.15), (0.4, 0.15)], 0.05);
        }
        assert_eq!(tracker.legs().len(), 2);
        assert!(tracker.legs().iter().all(|l| l.has_pair()));
        let pid = tracker.legs()[0].people_id();
        assert!(pid.is_some());
        assert_eq!(tracker.legs()[1].people_id(), pid);
        let dist = tracker.legs()[0]
            .position()
            .distance(&tracker.legs()[1].position());
        assert!((dist - 0.3).abs() < 0.06, "pair distance was {dist}");
    }

    #[test]
    fn occlusion_recovery_preserves_the_pair() {
        let mut tracker = LegTracker::new(wide_config()).unwrap();
        for _ in 0..5 {
            run(&mut tracker, &[(0.4, -0.15), (0.4, 0.15)], 0.05);
        }
        // one leg disappears for a scan
        run(&mut tracker, &[(0.4, -0.15)], 0.05);
        let occluded = tracker
            .legs()
            .iter()
            .find(|l| l.occluded_age() > 0)
            .expect("one leg must be occluded");
        assert_eq!(occluded.occluded_age(), 1);
        assert!(occluded.has_pair());
        let pid = occluded.people_id();

        // and comes back
        run(&mut tracker, &[(0.4, -0.15), (0.4, 0.15)], 0.05);
        assert!(tracker.legs().iter().all(|l| l.occluded_age() == 0));
        assert!(tracker.legs().iter().all(|l| l.people_id() == pid));
    }

    #[test]
    fn a_returning_person_inherits_their_people_id() {
        let config = TrackerConfig {
            occluded_dead_age: 2,
            ..wide_config()
        };
        let mut tracker = LegTracker::new(config).unwrap();
        for _ in 0..6 {
            run(&mut tracker, &[(0.4, -0.15), (0.4, 0.15)], 0.05);
        }
        let pid = tracker.legs()[0].people_id().unwrap();
        let old_ids: Vec<u32> = tracker.legs().iter().map(|l| l.leg_id()).collect();

        // the person vanishes long enough for both tracks to retire
        for _ in 0..5 {
            run(&mut tracker, &[], 0.05);
        }
        assert!(tracker.legs().is_empty());
        assert_eq!(tracker.memory().last_seen().len(), 1);
        assert_eq!(tracker.memory().last_seen()[0].people_id, pid);

        // and reappears nearby
        for _ in 0..6 {
            run(&mut tracker, &[(0.42, -0.15), (0.42, 0.15)], 0.05);
        }
        assert_eq!(tracker.legs().len(), 2);
        assert!(tracker.legs().iter().all(|l| l.people_id() == Some(pid)));
        for leg in tracker.legs() {
            assert!(!old_ids.contains(&leg.leg_id()), "leg ids must be fresh");
        }
    }

    #[test]
    fn the_swinging_leg_earns_its_label() {
        let mut tracker = LegTracker::new(wide_config()).unwrap();
        // stand still until the pair forms
        for _ in 0..6 {
            run(&mut tracker, &[(1.2, -0.15), (1.2, 0.15)], 0.05);
        }
        assert!(tracker.legs().iter().all(|l| l.has_pair()));
        let moving_id = tracker
            .legs()
            .iter()
            .find(|l| l.position().y > 0.0)
            .unwrap()
            .leg_id();

        // the upper leg swings toward the robot, the lower one stands
        for k in 1..=11 {
            let x = 1.2 - 0.05 * k as f64;
            run(&mut tracker, &[(1.2, -0.15), (x, 0.15)], 0.05);
        }
        let (left, _right) = tracker.gait().left_right().expect("label must be set");
        assert_eq!(left, moving_id);
        assert!(
            tracker.gait().confidence() >= 0.5,
            "confidence was {}",
            tracker.gait().confidence()
        );
    }

    #[test]
    fn a_merged_blob_is_split_for_a_tracked_pair() {
        let config = TrackerConfig {
            cluster_tolerance: 0.1,
            ..wide_config()
        };
        let mut tracker = LegTracker::new(config).unwrap();
        for _ in 0..6 {
            run(&mut tracker, &[(0.5, -0.15), (0.5, 0.15)], 0.05);
        }
        assert!(tracker.legs().iter().all(|l| l.has_pair()));

        // legs close up until their returns merge into one blob
        run(&mut tracker, &[(0.5, -0.12), (0.5, 0.12)], 0.05);
        run(&mut tracker, &[(0.5, -0.1), (0.5, 0.1)], 0.07);

        // the blob was split: both tracks were updated independently
        assert_eq!(tracker.legs().len(), 2);
        assert!(tracker.legs().iter().all(|l| l.occluded_age() == 0));
        let ys: Vec<f64> = tracker.legs().iter().map(|l| l.position().y).collect();
        assert!(ys.iter().any(|&y| y > 0.0) && ys.iter().any(|&y| y < 0.0));
    }

    #[test]
    fn one_person_roi_exit_resets_everything() {
        let config = TrackerConfig {
            is_one_person_to_track: true,
            ref_point_x: 0.3,
            ref_point_y: 0.0,
            x_upper_limit: 1.0,
            ..wide_config()
        };
        let mut tracker = LegTracker::new(config).unwrap();
        for _ in 0..4 {
            run(&mut tracker, &[(0.3, -0.15), (0.3, 0.15)], 0.05);
        }
        assert_eq!(tracker.legs().len(), 2);

        // the person walks out through the x upper limit
        let mut x = 0.3;
        for _ in 0..16 {
            x += 0.05;
            run(&mut tracker, &[(x, -0.15), (x, 0.15)], 0.05);
        }
        // any cluster in the remaining region now finds the predicted
        // tracks beyond the limit and triggers the reset
        for _ in 0..3 {
            run(&mut tracker, &[(0.9, 0.0)], 0.05);
        }
        assert!(tracker.legs().is_empty(), "tracks must be cleared");
        assert_eq!(tracker.dynamic_roi(), tracker.static_roi());
        assert!(tracker.gait().left_right().is_none());
    }

    #[test]
    fn one_person_mode_emits_two_records_on_swapped_channels() {
        let config = TrackerConfig {
            is_one_person_to_track: true,
            ref_point_x: 0.3,
            ref_point_y: 0.0,
            ..wide_config()
        };
        let mut tracker = LegTracker::new(config).unwrap();
        let mut last = ScanOutput::default();
        for _ in 0..6 {
            last = run(&mut tracker, &[(0.3, -0.15), (0.3, 0.15)], 0.05);
        }
        assert_eq!(last.records.len(), 2);
        assert_eq!(last.records[0].channel, LegChannel::Second);
        assert_eq!(last.records[1].channel, LegChannel::First);
        // paired legs publish full confidence
        assert!(last.records.iter().all(|r| r.values[8] == 1.0));
        let pid = last.records[0].values[7];
        assert!(pid >= 0.0);
        assert_eq!(last.records[1].values[7], pid);
    }

    #[test]
    fn transform_failure_degrades_to_predict_only() {
        let mut tracker = LegTracker::new(wide_config()).unwrap();
        for _ in 0..3 {
            run(&mut tracker, &[(0.4, -0.15), (0.4, 0.15)], 0.05);
        }
        let before: Vec<u32> = tracker.legs().iter().map(|l| l.observations()).collect();

        let scan = scan_of(&[(0.4, -0.15), (0.4, 0.15)], 0.05);
        let out = tracker.process_scan(&scan, &FailingTransforms);

        assert!(out.records.is_empty());
        assert!(out.leg_markers.is_empty());
        let after: Vec<u32> = tracker.legs().iter().map(|l| l.observations()).collect();
        assert_eq!(before, after, "no matching may happen");
        assert!(tracker.legs().iter().all(|l| l.occluded_age() == 1));
    }

    #[test]
    fn waiting_for_the_map_skips_scans_entirely() {
        let config = TrackerConfig {
            with_map: true,
            ..wide_config()
        };
        let mut tracker = LegTracker::new(config).unwrap();
        let out = run(&mut tracker, &[(0.4, -0.15), (0.4, 0.15)], 0.05);
        assert!(out.roi_marker.is_none());
        assert!(tracker.legs().is_empty());
    }

    #[test]
    fn leg_ids_stay_unique_across_lives() {
        let config = TrackerConfig {
            occluded_dead_age: 2,
            ..wide_config()
        };
        let mut tracker = LegTracker::new(config).unwrap();
        let mut seen = std::collections::HashSet::new();
        for round in 0..3 {
            let x = 0.4 + 0.02 * round as f64;
            for _ in 0..5 {
                run(&mut tracker, &[(x, -0.15), (x, 0.15)], 0.05);
                for leg in tracker.legs() {
                    seen.insert(leg.leg_id());
                }
            }
            for _ in 0..5 {
                run(&mut tracker, &[], 0.05);
            }
        }
        // three lives of two legs each
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn paths_follow_the_pair_and_stay_bounded() {
        let mut tracker = LegTracker::new(wide_config()).unwrap();
        let mut out = ScanOutput::default();
        for k in 0..90 {
            let x = 0.4 + 0.002 * k as f64;
            out = run(&mut tracker, &[(x, -0.15), (x, 0.15)], 0.05);
        }
        assert_eq!(out.paths.len(), 1);
        assert!(out.paths[0].points.len() <= 80);
        assert!(!out.people_markers.is_empty());
    }
}
