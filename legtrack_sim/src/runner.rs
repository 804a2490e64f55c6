//! Drives the tracker over a generated scan stream and checks the
//! tracker's structural invariants after every scan.

use std::collections::HashSet;

use legtrack_core::{LegTracker, TrackerConfig};
use legtrack_env::IdentityTransforms;
use tracing::{debug, info};

use crate::export::{SimExport, SimFrame};
use crate::scenarios::{generate, ScenarioId, ScenarioSpec};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub scenario: ScenarioId,
    pub seed: u64,
    /// Whether every per-scan invariant held.
    pub passed: bool,
    pub failure_reason: Option<String>,
    pub scans_processed: usize,
    /// Distinct leg ids seen alive at any point.
    pub leg_ids_seen: usize,
    /// Distinct people ids seen on paired legs.
    pub people_ids_seen: usize,
    /// Per-leg records emitted over the whole run.
    pub records_emitted: usize,
    pub final_track_count: usize,
}

/// Runs scenarios against a tracker configuration.
pub struct ScenarioRunner {
    config: TrackerConfig,
}

impl ScenarioRunner {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    /// A configuration wide enough for the bundled scenarios.
    pub fn default_config(spec: &ScenarioSpec) -> TrackerConfig {
        TrackerConfig {
            frequency: spec.dt,
            variance_observation: 0.01,
            x_lower_limit: -0.5,
            x_upper_limit: 4.0,
            y_lower_limit: -1.5,
            y_upper_limit: 1.5,
            ..Default::default()
        }
    }

    /// Runs one scenario, optionally collecting frames for export.
    pub fn run(
        &self,
        scenario: ScenarioId,
        spec: &ScenarioSpec,
        mut export: Option<&mut SimExport>,
    ) -> ScenarioResult {
        let mut tracker = LegTracker::new(self.config.clone()).expect("valid configuration");
        let scans = generate(scenario, spec);
        info!(scenario = scenario.name(), seed = spec.seed, "running scenario");

        let mut leg_ids = HashSet::new();
        let mut people_ids = HashSet::new();
        let mut records = 0;
        let mut failure = None;

        for (k, scan) in scans.iter().enumerate() {
            let output = tracker.process_scan(scan, &IdentityTransforms);
            records += output.records.len();

            for leg in tracker.legs() {
                leg_ids.insert(leg.leg_id());
                if leg.has_pair() {
                    people_ids.insert(leg.people_id().expect("paired legs carry an id"));
                }
            }

            if let Some(reason) = check_invariants(&tracker) {
                failure = Some(format!("scan {k}: {reason}"));
                break;
            }
            if let Some(export) = export.as_mut() {
                export.push(SimFrame::capture(k, &tracker));
            }
            debug!(scan = k, tracks = tracker.legs().len(), "scan processed");
        }

        ScenarioResult {
            scenario,
            seed: spec.seed,
            passed: failure.is_none(),
            failure_reason: failure,
            scans_processed: scans.len(),
            leg_ids_seen: leg_ids.len(),
            people_ids_seen: people_ids.len(),
            records_emitted: records,
            final_track_count: tracker.legs().len(),
        }
    }
}

/// Structural invariants of the tracker state, checked between scans.
fn check_invariants(tracker: &LegTracker) -> Option<String> {
    let legs = tracker.legs();

    let mut ids = HashSet::new();
    for leg in legs {
        if !ids.insert(leg.leg_id()) {
            return Some(format!("duplicate leg id {}", leg.leg_id()));
        }
    }

    for leg in legs {
        if !leg.has_pair() {
            continue;
        }
        let Some(pid) = leg.people_id() else {
            return Some(format!("paired leg {} has no people id", leg.leg_id()));
        };
        let partners: Vec<_> = legs
            .iter()
            .filter(|other| {
                other.leg_id() != leg.leg_id()
                    && other.has_pair()
                    && other.people_id() == Some(pid)
            })
            .collect();
        if partners.len() != 1 {
            return Some(format!(
                "leg {} has {} partners for people id {}",
                leg.leg_id(),
                partners.len(),
                pid
            ));
        }
        let dist = leg.position().distance(&partners[0].position());
        if dist > tracker.config().max_dist_btw_legs {
            return Some(format!("pair {pid} stretched to {dist:.3} m"));
        }
    }

    let budget = tracker.config().scans_within(5.0) + 1;
    for entry in tracker.memory().last_seen() {
        if entry.age_scans > budget {
            return Some(format!(
                "last-seen entry for people {} aged {} scans",
                entry.people_id, entry.age_scans
            ));
        }
    }

    None
}
