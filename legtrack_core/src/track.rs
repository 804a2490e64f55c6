//! One leg track and its lifecycle.

use std::collections::VecDeque;

use nalgebra::DVector;

use crate::config::TrackerConfig;
use crate::geometry::Point;
use crate::kalman::LegFilter;

/// A Kalman-filter-backed estimate of one human leg.
#[derive(Debug, Clone)]
pub struct Leg {
    leg_id: u32,
    people_id: Option<u32>,
    has_pair: bool,
    filter: LegFilter,
    observations: u32,
    occluded_age: u32,
    age: u32,
    distance_travelled: f64,
    /// Pre-update state snapshots, newest last, bounded by `min_observations`.
    history: VecDeque<DVector<f64>>,
    min_observations: usize,
    occluded_dead_age: u32,
    max_cov: f64,
}

impl Leg {
    pub fn new(leg_id: u32, position: Point, config: &TrackerConfig) -> Self {
        Self {
            leg_id,
            people_id: None,
            has_pair: false,
            filter: LegFilter::new(
                position,
                config.frequency,
                config.state_dimensions,
                config.variance_observation,
            ),
            observations: 0,
            occluded_age: 0,
            age: 0,
            distance_travelled: 0.0,
            history: VecDeque::with_capacity(config.min_observations),
            min_observations: config.min_observations,
            occluded_dead_age: config.occluded_dead_age,
            max_cov: config.max_cov,
        }
    }

    /// Advances the filter by one scan period.
    pub fn predict(&mut self) {
        self.filter.predict();
        self.age += 1;
    }

    /// Folds a measurement in. Resets the occlusion age, counts the
    /// observation, extends the travelled distance and snapshots the
    /// pre-update state into the bounded history.
    pub fn update(&mut self, z: Point) {
        if self.history.len() == self.min_observations {
            self.history.pop_front();
        }
        self.history.push_back(self.filter.state().clone());

        let step = self.filter.update(z);
        self.distance_travelled += step;
        self.observations += 1;
        self.occluded_age = 0;
    }

    /// Marks the scan as missed for this track.
    pub fn missed(&mut self) {
        self.occluded_age += 1;
    }

    /// Lifecycle check: uncertain, long-occluded or never-confirmed tracks
    /// are dead.
    pub fn is_dead(&self) -> bool {
        self.filter.position_covariance_trace() > self.max_cov
            || self.occluded_age > self.occluded_dead_age
            || (!self.is_confirmed() && self.age > self.occluded_dead_age)
    }

    /// A track with enough updates to take part in pairing.
    pub fn is_confirmed(&self) -> bool {
        self.observations >= self.min_observations as u32
    }

    /// `has_pair` weighted by how long the track has been occluded.
    pub fn confidence(&self) -> f64 {
        if self.has_pair {
            (1.0 - 0.11 * self.occluded_age as f64).max(0.0)
        } else {
            0.0
        }
    }

    /// Covariance and kinematic reset ahead of an anticipated step change.
    pub fn reset_error_cov_and_state(&mut self) {
        self.filter.reset();
    }

    pub fn position(&self) -> Point {
        self.filter.position()
    }

    pub fn velocity(&self) -> Point {
        self.filter.velocity()
    }

    pub fn acceleration(&self) -> Point {
        self.filter.acceleration()
    }

    /// Flat state vector `[px, py, vx, vy, ax, ay]`.
    pub fn current_state(&self) -> [f64; 6] {
        let s = self.filter.state();
        [s[0], s[1], s[2], s[3], s[4], s[5]]
    }

    /// Scalar gating covariance for measurement-to-track matching.
    pub fn matching_covariance(&self) -> f64 {
        self.filter.matching_covariance()
    }

    pub fn history(&self) -> &VecDeque<DVector<f64>> {
        &self.history
    }

    pub fn leg_id(&self) -> u32 {
        self.leg_id
    }

    pub fn people_id(&self) -> Option<u32> {
        self.people_id
    }

    pub fn set_people_id(&mut self, id: Option<u32>) {
        self.people_id = id;
    }

    pub fn has_pair(&self) -> bool {
        self.has_pair
    }

    pub fn set_has_pair(&mut self, has_pair: bool) {
        self.has_pair = has_pair;
    }

    pub fn observations(&self) -> u32 {
        self.observations
    }

    pub fn occluded_age(&self) -> u32 {
        self.occluded_age
    }

    pub fn distance_travelled(&self) -> f64 {
        self.distance_travelled
    }
}
