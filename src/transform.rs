//! Coordinate transforms between data and screen space.

use crate::geom::{Point, ScreenPoint, ScreenRect};
use crate::view::{Bounds, Range};

const MIN_SPAN: f64 = 1e-12;

/// Linear transform from data coordinates into screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Transform {
    screen: ScreenRect,
    x_axis: Range,
    y_axis: Range,
}

impl Transform {
    /// Create a transform for the given bounds and screen rectangle.
    ///
    /// Returns `None` when the screen is degenerate or the bounds are not finite.
    pub(crate) fn new(bounds: Bounds, screen: ScreenRect) -> Option<Self> {
        if !screen.is_valid() || !bounds.x.is_finite() || !bounds.y.is_finite() {
            return None;
        }
        Some(Self {
            screen,
            x_axis: bounds.x.with_min_span(MIN_SPAN),
            y_axis: bounds.y.with_min_span(MIN_SPAN),
        })
    }

    /// Map a data point into screen space.
    pub(crate) fn data_to_screen(&self, point: Point) -> ScreenPoint {
        let x_norm = (point.x - self.x_axis.min) / self.x_axis.span();
        let y_norm = (point.y - self.y_axis.min) / self.y_axis.span();
        let sx = self.screen.min.x as f64 + x_norm * self.screen.width() as f64;
        let sy = self.screen.max.y as f64 - y_norm * self.screen.height() as f64;
        ScreenPoint::new(sx as f32, sy as f32)
    }

    /// Map a screen point into data space.
    pub(crate) fn screen_to_data(&self, point: ScreenPoint) -> Point {
        Point::new(self.x_at(point.x), self.y_at(point.y))
    }

    /// Data X under a horizontal pixel position.
    pub(crate) fn x_at(&self, pixel_x: f32) -> f64 {
        let x_norm = (pixel_x as f64 - self.screen.min.x as f64) / self.screen.width() as f64;
        self.x_axis.min + x_norm * self.x_axis.span()
    }

    fn y_at(&self, pixel_y: f32) -> f64 {
        let y_norm = (self.screen.max.y as f64 - pixel_y as f64) / self.screen.height() as f64;
        self.y_axis.min + y_norm * self.y_axis.span()
    }
}
