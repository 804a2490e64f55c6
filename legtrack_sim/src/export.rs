//! Frame-by-frame JSON export of a scenario run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use legtrack_core::LegTracker;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One tracked leg at one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegFrame {
    pub leg_id: u32,
    pub people_id: Option<u32>,
    pub has_pair: bool,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub occluded_age: u32,
}

/// Tracker state snapshot after one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    pub scan_index: usize,
    pub legs: Vec<LegFrame>,
}

impl SimFrame {
    pub fn capture(scan_index: usize, tracker: &LegTracker) -> Self {
        let legs = tracker
            .legs()
            .iter()
            .map(|leg| LegFrame {
                leg_id: leg.leg_id(),
                people_id: leg.people_id(),
                has_pair: leg.has_pair(),
                x: leg.position().x,
                y: leg.position().y,
                vx: leg.velocity().x,
                vy: leg.velocity().y,
                occluded_age: leg.occluded_age(),
            })
            .collect();
        Self { scan_index, legs }
    }
}

/// Collected frames of one run, written as JSON lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    pub scenario: String,
    pub seed: u64,
    pub frames: Vec<SimFrame>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("export encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SimExport {
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: SimFrame) {
        self.frames.push(frame);
    }

    /// Writes one JSON object per line: a header, then every frame.
    pub fn write_jsonl(&self, path: &Path) -> Result<(), ExportError> {
        let mut out = BufWriter::new(File::create(path)?);
        let header = serde_json::json!({
            "scenario": self.scenario,
            "seed": self.seed,
            "frames": self.frames.len(),
        });
        writeln!(out, "{header}")?;
        for frame in &self.frames {
            writeln!(out, "{}", serde_json::to_string(frame)?)?;
        }
        Ok(())
    }
}
