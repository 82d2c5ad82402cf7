//! Interaction helpers for panning and zooming.
//!
//! Gestures arrive as [`InteractionEvent`]s in canvas pixel coordinates and are
//! turned into new data bounds by the coordinator.

use serde::{Deserialize, Serialize};

use crate::geom::{Point, ScreenPoint};
use crate::transform::Transform;
use crate::view::{Bounds, Range};

/// Which axes wheel zoom affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoomMode {
    /// Zoom the X axis only.
    #[default]
    X,
    /// Zoom the Y axis only.
    Y,
    /// Zoom both axes.
    Xy,
}

impl ZoomMode {
    /// Per-axis zoom factors for a uniform factor.
    pub(crate) fn factors(self, factor: f64) -> (f64, f64) {
        match self {
            Self::X => (factor, 1.0),
            Self::Y => (1.0, factor),
            Self::Xy => (factor, factor),
        }
    }
}

/// A pointer gesture on the chart canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InteractionEvent {
    /// Mouse wheel or trackpad scroll. Positive `delta_y` zooms out.
    Wheel { delta_y: f64, position: ScreenPoint },
    /// Pointer pressed for a pan.
    PanStart { position: ScreenPoint },
    /// Pointer moved while panning.
    PanMove { position: ScreenPoint },
    /// Pointer released.
    PanEnd,
}

/// Pan bounds by a pixel delta.
pub(crate) fn pan_bounds(
    bounds: Bounds,
    delta_pixels: ScreenPoint,
    transform: &Transform,
) -> Bounds {
    let origin = transform.screen_to_data(ScreenPoint::new(0.0, 0.0));
    let shifted = transform.screen_to_data(delta_pixels);
    let dx = shifted.x - origin.x;
    let dy = shifted.y - origin.y;
    Bounds::new(
        Range::new(bounds.x.min - dx, bounds.x.max - dx),
        Range::new(bounds.y.min - dy, bounds.y.max - dy),
    )
}

/// Zoom bounds around a center point.
pub(crate) fn zoom_bounds(bounds: Bounds, center: Point, factor_x: f64, factor_y: f64) -> Bounds {
    let x_min = center.x + (bounds.x.min - center.x) * factor_x;
    let x_max = center.x + (bounds.x.max - center.x) * factor_x;
    let y_min = center.y + (bounds.y.min - center.y) * factor_y;
    let y_max = center.y + (bounds.y.max - center.y) * factor_y;
    Bounds::new(Range::new(x_min, x_max), Range::new(y_min, y_max))
}

/// Compute a zoom factor from a wheel delta.
pub(crate) fn zoom_factor_from_wheel(delta_y: f64, sensitivity: f64) -> f64 {
    if !delta_y.is_finite() {
        return 1.0;
    }
    (delta_y * sensitivity).exp().clamp(0.1, 10.0)
}
