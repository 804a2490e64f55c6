//! Per-scan output of the tracker.

use serde::{Deserialize, Serialize};

use crate::track::Leg;
use crate::visualization::{ArrowMarker, EllipseMarker, PathMarker, RectMarker};

/// The two per-leg output channels.
///
/// Channel wiring is crossed on purpose: the first tracked leg goes out
/// on the second channel and vice versa, which is what the downstream
/// consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegChannel {
    First,
    Second,
}

/// Flat numeric record for one paired leg:
/// `[pos_x, pos_y, vel_x, vel_y, acc_x, acc_y, leg_id, people_id, confidence]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegRecord {
    pub channel: LegChannel,
    pub values: [f64; 9],
}

impl LegRecord {
    pub fn from_leg(leg: &Leg, channel: LegChannel) -> Self {
        let s = leg.current_state();
        let people_id = leg.people_id().map(|id| id as f64).unwrap_or(-1.0);
        Self {
            channel,
            values: [
                s[0],
                s[1],
                s[2],
                s[3],
                s[4],
                s[5],
                leg.leg_id() as f64,
                people_id,
                leg.confidence(),
            ],
        }
    }
}

/// Everything the tracker emits for one scan.
///
/// On a recoverable skip only the region-of-interest outline survives;
/// records and markers for the scan simply do not appear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOutput {
    pub records: Vec<LegRecord>,
    pub leg_markers: Vec<ArrowMarker>,
    pub people_markers: Vec<EllipseMarker>,
    pub zone_markers: Vec<RectMarker>,
    pub roi_marker: Option<RectMarker>,
    pub paths: Vec<PathMarker>,
}

impl ScanOutput {
    /// Output of a skipped scan.
    pub fn skipped(roi_marker: Option<RectMarker>) -> Self {
        Self {
            roi_marker,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::geometry::Point;

    #[test]
    fn record_layout_matches_the_wire_order() {
        let config = TrackerConfig::default();
        let mut leg = Leg::new(3, Point::new(0.3, -0.15), &config);
        leg.set_people_id(Some(7));
        leg.set_has_pair(true);
        let record = LegRecord::from_leg(&leg, LegChannel::Second);
        assert_eq!(record.values[0], 0.3);
        assert_eq!(record.values[1], -0.15);
        assert_eq!(record.values[6], 3.0);
        assert_eq!(record.values[7], 7.0);
        assert_eq!(record.values[8], 1.0);
    }

    #[test]
    fn unpaired_legs_report_no_person() {
        let config = TrackerConfig::default();
        let leg = Leg::new(4, Point::new(0.1, 0.0), &config);
        let record = LegRecord::from_leg(&leg, LegChannel::First);
        assert_eq!(record.values[7], -1.0);
        assert_eq!(record.values[8], 0.0);
    }
}
