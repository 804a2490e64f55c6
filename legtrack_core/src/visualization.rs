//! Marker primitives emitted alongside the tracking output.
//!
//! These are plain data; whatever renders them (RViz bridge, web
//! frontend, the sim exporter) lives outside this crate.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds, Point};

/// Path polylines keep at most this many points per person.
const PATH_CAPACITY: usize = 80;

/// RGB color in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const RED: Color = Color {
        r: 1.0,
        g: 0.0,
        b: 0.0,
    };
    pub const BLUE: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 1.0,
    };
}

/// Velocity arrow for one leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrowMarker {
    pub start: Point,
    pub end: Point,
    pub z: f64,
    pub color: Color,
}

/// Arrow from a leg position along half its velocity.
pub fn leg_velocity_arrow(position: Point, velocity: Point, z: f64, is_left: bool) -> ArrowMarker {
    ArrowMarker {
        start: position,
        end: Point::new(
            position.x + 0.5 * velocity.x,
            position.y + 0.5 * velocity.y,
        ),
        z: z / 2.0,
        color: if is_left { Color::BLUE } else { Color::RED },
    }
}

/// Flat ellipse drawn under a person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EllipseMarker {
    pub center: Point,
    /// Rotation of the major axis, radians.
    pub yaw: f64,
    /// Major axis length.
    pub width: f64,
    /// Minor axis length.
    pub height: f64,
    pub z: f64,
    pub color: Color,
}

/// Ellipse spanning the two legs of one person.
pub fn people_ellipse(
    a: Point,
    b: Point,
    leg_radius: f64,
    z: f64,
    color: Color,
) -> EllipseMarker {
    let dist = a.distance(&b);
    EllipseMarker {
        center: Point::midpoint(&a, &b),
        yaw: (a.y - b.y).atan2(a.x - b.x),
        width: dist + 5.0 * leg_radius,
        height: 5.0 * leg_radius,
        z,
        color,
    }
}

/// Axis-aligned rectangle outline (region of interest, tracking zones).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectMarker {
    pub bounds: Bounds,
    pub z: f64,
}

/// Path polyline of one person's midpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMarker {
    pub people_id: u32,
    pub color: Color,
    pub points: Vec<Point>,
}

/// Per-person path history with deterministic colors.
#[derive(Debug)]
pub struct PathStore {
    paths: HashMap<u32, PathMarker>,
    rng: StdRng,
}

impl Default for PathStore {
    fn default() -> Self {
        Self {
            paths: HashMap::new(),
            rng: StdRng::seed_from_u64(1),
        }
    }
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a midpoint to the person's path, creating it with a fresh
    /// color on first sight.
    pub fn append(&mut self, people_id: u32, midpoint: Point) {
        let rng = &mut self.rng;
        let path = self.paths.entry(people_id).or_insert_with(|| PathMarker {
            people_id,
            color: Color {
                r: rng.gen(),
                g: rng.gen(),
                b: rng.gen(),
            },
            points: Vec::new(),
        });
        path.points.push(midpoint);
        while path.points.len() > PATH_CAPACITY {
            path.points.remove(0);
        }
    }

    /// Drops the path of a departed person.
    pub fn drop_path(&mut self, people_id: u32) {
        self.paths.remove(&people_id);
    }

    /// Color assigned to a person, if a path exists.
    pub fn color_of(&self, people_id: u32) -> Option<Color> {
        self.paths.get(&people_id).map(|p| p.color)
    }

    /// Snapshot of all paths for emission.
    pub fn markers(&self) -> Vec<PathMarker> {
        let mut markers: Vec<PathMarker> = self.paths.values().cloned().collect();
        markers.sort_by_key(|m| m.people_id);
        markers
    }
}
