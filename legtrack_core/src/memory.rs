//! Short-term memory of recently lost people.
//!
//! Two stores with the same aging budget: the midpoints of pairs at the
//! moment they were lost (for people-id reuse), and the last positions of
//! retired legs whose partner is still alive (for drawing the person and
//! for computing the loss midpoint when the partner dies too).

use crate::config::TrackerConfig;
use crate::geometry::{Bounds, Point};

/// Seconds a lost person stays eligible for id reuse.
const MEMORY_BUDGET_SECS: f64 = 5.0;

/// Seconds after which a near-boundary loss is treated as a departure.
const BOUNDARY_BUDGET_SECS: f64 = 1.0;

/// Distance to a region-of-interest edge that counts as "near".
const BOUNDARY_MARGIN: f64 = 0.1;

/// Midpoint of a pair at the scan it was lost.
#[derive(Debug, Clone)]
pub struct LastSeen {
    pub age_scans: u32,
    pub people_id: u32,
    pub position: Point,
}

/// Final position of a retired leg whose people-id is still of interest.
#[derive(Debug, Clone)]
pub struct RetiredLeg {
    pub age_scans: u32,
    pub people_id: u32,
    pub position: Point,
}

/// Owner of both stores.
#[derive(Debug, Default)]
pub struct PeopleMemory {
    last_seen: Vec<LastSeen>,
    retired: Vec<RetiredLeg>,
}

impl PeopleMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ages every entry by one scan and evicts the expired ones.
    ///
    /// Returns the people-ids whose last-seen entry was evicted, so the
    /// caller can drop the matching path markers.
    pub fn age_and_evict(&mut self, config: &TrackerConfig, roi: &Bounds) -> Vec<u32> {
        let full_budget = config.scans_within(MEMORY_BUDGET_SECS);
        let boundary_budget = config.scans_within(BOUNDARY_BUDGET_SECS);

        let mut evicted = Vec::new();
        let mut i = 0;
        while i < self.last_seen.len() {
            let entry = &self.last_seen[i];
            let expired = entry.age_scans > full_budget
                || (entry.age_scans > boundary_budget && near_boundary(&entry.position, roi));
            if expired {
                evicted.push(entry.people_id);
                self.last_seen.swap_remove(i);
            } else {
                self.last_seen[i].age_scans += 1;
                i += 1;
            }
        }

        let mut j = 0;
        while j < self.retired.len() {
            if self.retired[j].age_scans > full_budget {
                self.retired.swap_remove(j);
            } else {
                self.retired[j].age_scans += 1;
                j += 1;
            }
        }

        evicted
    }

    /// Records the loss midpoint of a pair.
    pub fn remember(&mut self, people_id: u32, position: Point) {
        self.last_seen.push(LastSeen {
            age_scans: 0,
            people_id,
            position,
        });
    }

    /// Finds a lost person whose midpoint is within `max_dist` of the
    /// given position; the matched entry is consumed.
    pub fn recall(&mut self, position: &Point, max_dist: f64) -> Option<u32> {
        let index = self
            .last_seen
            .iter()
            .position(|e| e.position.distance(position) <= max_dist)?;
        let entry = self.last_seen.swap_remove(index);
        Some(entry.people_id)
    }

    /// Parks the final position of a retired leg.
    pub fn park_retired(&mut self, people_id: u32, position: Point) {
        self.retired.push(RetiredLeg {
            age_scans: 0,
            people_id,
            position,
        });
    }

    /// Last position of the retired partner for a people-id, if any.
    pub fn retired_position(&self, people_id: u32) -> Option<Point> {
        self.retired
            .iter()
            .find(|r| r.people_id == people_id)
            .map(|r| r.position)
    }

    /// Drops one retired entry carrying this people-id (used when the id
    /// is reassigned to a live pair).
    pub fn erase_retired(&mut self, people_id: u32) {
        if let Some(index) = self.retired.iter().position(|r| r.people_id == people_id) {
            self.retired.swap_remove(index);
        }
    }

    pub fn last_seen(&self) -> &[LastSeen] {
        &self.last_seen
    }

    pub fn retired(&self) -> &[RetiredLeg] {
        &self.retired
    }
}

fn near_boundary(p: &Point, roi: &Bounds) -> bool {
    (p.x - roi.x_min).abs() <= BOUNDARY_MARGIN
        || (p.x - roi.x_max).abs() <= BOUNDARY_MARGIN
        || (p.y - roi.y_min).abs() <= BOUNDARY_MARGIN
        || (p.y - roi.y_max).abs() <= BOUNDARY_MARGIN
}
