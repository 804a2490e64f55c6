//! Planar points and axis-aligned bounds.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A planar coordinate in the tracking frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance to the origin.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// The point halfway between two points.
    pub fn midpoint(a: &Point, b: &Point) -> Point {
        Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }
}

impl From<Point2<f64>> for Point {
    fn from(p: Point2<f64>) -> Self {
        Point::new(p.x, p.y)
    }
}

impl From<Point> for Point2<f64> {
    fn from(p: Point) -> Self {
        Point2::new(p.x, p.y)
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// The rectangle bracketing two points, grown by `margin` on all sides.
    pub fn around(a: &Point, b: &Point, margin: f64) -> Self {
        Self {
            x_min: a.x.min(b.x) - margin,
            x_max: a.x.max(b.x) + margin,
            y_min: a.y.min(b.y) - margin,
            y_max: a.y.max(b.y) + margin,
        }
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }

    /// Grows the rectangle by `margin` on all sides.
    pub fn inflated(&self, margin: f64) -> Self {
        Self {
            x_min: self.x_min - margin,
            x_max: self.x_max + margin,
            y_min: self.y_min - margin,
            y_max: self.y_max + margin,
        }
    }

    /// Clips the rectangle to `outer`.
    pub fn clipped_to(&self, outer: &Bounds) -> Self {
        Self {
            x_min: self.x_min.max(outer.x_min),
            x_max: self.x_max.min(outer.x_max),
            y_min: self.y_min.max(outer.y_min),
            y_max: self.y_max.min(outer.y_max),
        }
    }

    pub fn area(&self) -> f64 {
        (self.x_max - self.x_min) * (self.y_max - self.y_min)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x_min + self.x_max) / 2.0, (self.y_min + self.y_max) / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}
