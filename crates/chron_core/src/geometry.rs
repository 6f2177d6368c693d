//! Plain 2D geometry shared by every curve generator.
//!
//! The rendering layer consumes positions and cubic-Bézier control points
//! in model space; `Vector2D::scale_by` is the single hook through which
//! two independent axis transforms are applied.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A 2D point or direction in model space. All operations are pure and
/// return new values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn plus(self, other: Vector2D) -> Vector2D {
        Vector2D::new(self.x + other.x, self.y + other.y)
    }

    pub fn minus(self, other: Vector2D) -> Vector2D {
        Vector2D::new(self.x - other.x, self.y - other.y)
    }

    pub fn times(self, scalar: f64) -> Vector2D {
        Vector2D::new(self.x * scalar, self.y * scalar)
    }

    pub fn divided_by(self, scalar: f64) -> Vector2D {
        Vector2D::new(self.x / scalar, self.y / scalar)
    }

    /// Maps each component through its own axis transform. Used to carry a
    /// model-space point into two independently scaled plot axes.
    pub fn scale_by(self, fx: impl Fn(f64) -> f64, fy: impl Fn(f64) -> f64) -> Vector2D {
        Vector2D::new(fx(self.x), fy(self.y))
    }
}

/// One cubic-Bézier piece. The start point is the previous piece's end
/// point (SVG path semantics), so a full path is a start point plus a
/// sequence of these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicSegment {
    pub p1: Vector2D,
    pub p2: Vector2D,
    pub p3: Vector2D,
}

impl CubicSegment {
    /// Hermite-style piece between two samples of a parametric curve:
    /// control points lie a third of the parameter step along the tangents.
    pub fn from_endpoints(
        start: Vector2D,
        start_tangent: Vector2D,
        end: Vector2D,
        end_tangent: Vector2D,
        dt: f64,
    ) -> Self {
        Self {
            p1: start.plus(start_tangent.times(dt / 3.0)),
            p2: end.minus(end_tangent.times(dt / 3.0)),
            p3: end,
        }
    }
}

/// A start point followed by cubic pieces; the discretized form of one
/// curve handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePath {
    pub start: Vector2D,
    pub segments: Vec<CubicSegment>,
}

/// One visible axis extent, `min < max`, both finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            bail!("Axis range must be finite, got [{min}, {max}].");
        }
        if max <= min {
            bail!("Axis range must have max > min, got [{min}, {max}].");
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// The visible plot window: the only information the view layer supplies
/// besides the data itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub x: AxisRange,
    pub y: AxisRange,
}

impl Window {
    pub fn new(x: AxisRange, y: AxisRange) -> Self {
        Self { x, y }
    }
}
