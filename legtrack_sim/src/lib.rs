//! Deterministic scenario harness for the leg tracker.
//!
//! All entropy derives from a single 64-bit seed: leg trajectories,
//! range noise and scan synthesis are reproducible, so a failing run is
//! a failing seed.

pub mod export;
pub mod runner;
pub mod scenarios;

pub use export::{LegFrame, SimExport, SimFrame};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use scenarios::{ScenarioId, ScenarioSpec, SyntheticScan};
