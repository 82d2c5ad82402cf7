//! Geometric primitives used by the plotting pipeline.
//!
//! [`Point`] is a data-space coordinate (seconds on X for timestamp plots).
//! Screen-space types describe the canvas the renderer draws into.

use serde::{Deserialize, Serialize};

/// A point in data space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X value in data coordinates.
    pub x: f64,
    /// Y value in data coordinates.
    pub y: f64,
}

impl Point {
    /// Create a new data point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in screen space (logical pixels, origin at the top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    /// X value in pixels.
    pub x: f32,
    /// Y value in pixels.
    pub y: f32,
}

impl ScreenPoint {
    /// Create a new screen point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Canvas size in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Size {
    /// Create a new size.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Check whether the size has positive area.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Width rounded down to whole pixel columns.
    pub fn pixel_width(&self) -> usize {
        if self.width.is_finite() && self.width > 0.0 {
            self.width as usize
        } else {
            0
        }
    }

    /// Screen rectangle covering the whole canvas.
    pub(crate) fn rect(&self) -> ScreenRect {
        ScreenRect::new(
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(self.width, self.height),
        )
    }
}

/// A rectangle in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScreenRect {
    /// Top-left corner.
    pub(crate) min: ScreenPoint,
    /// Bottom-right corner.
    pub(crate) max: ScreenPoint,
}

impl ScreenRect {
    pub(crate) fn new(min: ScreenPoint, max: ScreenPoint) -> Self {
        Self { min, max }
    }

    pub(crate) fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub(crate) fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    pub(crate) fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }
}

pub(crate) fn distance_sq(a: ScreenPoint, b: ScreenPoint) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}
