//! Chart rendering on a dedicated worker thread.
//!
//! Drawing itself belongs to an embedder-supplied [`ChartRenderer`]. The
//! [`RenderWorker`] owns it on its own thread together with the last frame and
//! datasets, so hover queries can be answered without touching the builder.

use crate::accumulator::{Dataset, finite_y_range};
use crate::datasource::SampleView;
use crate::error::{ErrorHandler, PipelineError};
use crate::extract::Datum;
use crate::geom::{ScreenPoint, Size, distance_sq};
use crate::series::SeriesKey;
use crate::transform::Transform;
use crate::view::{Bounds, Range};
use crate::worker::Worker;

/// Everything except datasets that a draw needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFrame {
    /// Canvas size in pixels.
    pub size: Size,
    /// Data bounds mapped onto the canvas.
    pub bounds: Bounds,
    /// Current playback position on the X axis.
    pub playhead_x: Option<f64>,
}

/// Downstream drawing surface.
pub trait ChartRenderer: Send {
    /// Draw one frame.
    fn draw(&mut self, frame: &RenderFrame, datasets: &[Dataset]);
}

/// A sample near the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverElement {
    /// Position of the series in the settings list.
    pub series_index: usize,
    /// Series key.
    pub key: SeriesKey,
    /// The sample under the pointer.
    pub datum: Datum,
}

struct RenderState {
    renderer: Box<dyn ChartRenderer>,
    frame: Option<RenderFrame>,
    datasets: Vec<Dataset>,
    hover_threshold_px: f32,
}

impl RenderState {
    fn update(&mut self, frame: RenderFrame) -> Bounds {
        self.frame = Some(frame);
        self.renderer.draw(&frame, &self.datasets);
        frame.bounds
    }

    fn update_datasets(&mut self, datasets: Vec<Dataset>) -> Option<Range> {
        self.datasets = datasets;
        self.datasets
            .iter()
            .map(|dataset| finite_y_range(&dataset.data))
            .fold(None, Range::union_opt)
    }

    fn elements_at_pixel(&self, cursor: ScreenPoint) -> Vec<HoverElement> {
        let Some(frame) = self.frame else {
            return Vec::new();
        };
        let plot_rect = frame.size.rect();
        if !plot_rect.contains(cursor) {
            return Vec::new();
        }
        let Some(transform) = Transform::new(frame.bounds, plot_rect) else {
            return Vec::new();
        };
        let threshold = self.hover_threshold_px;
        let center = transform.x_at(cursor.x);
        let dx = (transform.x_at(cursor.x + threshold) - center).abs();
        let search_range = Range::new(center - dx, center + dx);
        let threshold_sq = threshold * threshold;

        let mut elements = Vec::new();
        for dataset in &self.datasets {
            let view = SampleView::from_slice(&dataset.data);
            let monotonic = dataset.data.windows(2).all(|pair| pair[0].x <= pair[1].x);
            let mut best: Option<(&Datum, f32)> = None;
            for ordinal in view.range_by_x(search_range, monotonic) {
                let datum = view.get(ordinal);
                if !datum.x.is_finite() || !datum.y.is_finite() {
                    continue;
                }
                let screen = transform.data_to_screen(datum.point());
                if !plot_rect.contains(screen) {
                    continue;
                }
                let dist = distance_sq(screen, cursor);
                if dist > threshold_sq {
                    continue;
                }
                if best.is_none_or(|best| dist < best.1) {
                    best = Some((datum, dist));
                }
            }
            if let Some((datum, _)) = best {
                elements.push(HoverElement {
                    series_index: dataset.series_index,
                    key: dataset.key.clone(),
                    datum: datum.clone(),
                });
            }
        }
        elements
    }
}

/// Handle to the renderer thread.
///
/// After [`destroy`](Self::destroy) every call returns its empty value.
#[derive(Debug)]
pub struct RenderWorker {
    worker: Worker<RenderState>,
}

impl RenderWorker {
    /// Start a render worker owning `renderer`.
    pub fn spawn(
        renderer: impl ChartRenderer + 'static,
        hover_threshold_px: f32,
        on_error: ErrorHandler,
    ) -> Result<Self, PipelineError> {
        let state = RenderState {
            renderer: Box::new(renderer),
            frame: None,
            datasets: Vec::new(),
            hover_threshold_px,
        };
        Ok(Self {
            worker: Worker::spawn("render", state, on_error)?,
        })
    }

    /// Draw with a new frame; returns the bounds drawn.
    pub fn update(&self, frame: RenderFrame) -> Option<Bounds> {
        self.worker.query(move |state| state.update(frame))
    }

    /// Replace the datasets drawn by the next [`update`](Self::update); returns
    /// their Y extent.
    pub fn update_datasets(&self, datasets: Vec<Dataset>) -> Option<Range> {
        self.worker
            .query(move |state| state.update_datasets(datasets))
            .flatten()
    }

    /// Nearest sample of each dataset within the hover threshold.
    pub fn elements_at_pixel(&self, position: ScreenPoint) -> Vec<HoverElement> {
        self.worker
            .query(move |state| state.elements_at_pixel(position))
            .unwrap_or_default()
    }

    /// Whether the worker is still running.
    pub fn is_alive(&self) -> bool {
        self.worker.is_alive()
    }

    /// Stop the renderer thread. Idempotent.
    pub fn destroy(&mut self) {
        self.worker.destroy();
    }
}
