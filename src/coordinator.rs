//! Plot coordinator.
//!
//! The coordinator is the single entry point a plot panel talks to. It owns the
//! dataset builder for the configured X axis mode and the render worker, turns
//! pointer gestures into view bounds, and keeps synced panels in step. Each
//! input (player state, blocks, config, size, gestures) ends with a render.
//!
//! Bounds are resolved in this order, per axis: fixed config values, then the
//! user's own pan/zoom, then bounds adopted from the sync group, then follow
//! mode, then the playback range (timestamp modes) or the data extent.

use std::ops::ControlFlow;

use crossbeam::channel::{self, Receiver, Sender};

use crate::accumulator::CsvDataset;
use crate::builder::{DatasetsBuilder, Progress, create_builder};
use crate::config::{CoordinatorConfig, PlotConfig, XAxisMode};
use crate::error::{ErrorHandler, PipelineError};
use crate::geom::{ScreenPoint, Size};
use crate::interaction::{
    InteractionEvent, ZoomMode, pan_bounds, zoom_bounds, zoom_factor_from_wheel,
};
use crate::message::{Blocks, PlayerState};
use crate::path::MessagePath;
use crate::renderer::{ChartRenderer, HoverElement, RenderFrame, RenderWorker};
use crate::series::{SeriesConfig, build_series_configs};
use crate::sync::{BoundsSyncGroup, SyncBinding, SyncKind};
use crate::time::Time;
use crate::transform::Transform;
use crate::view::{Bounds, Range, Viewport};

/// Notifications for the owning panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinatorEvent {
    /// The X extent of the plotted data changed.
    TimeseriesBounds(Range),
    /// The user moved the view; `None` after a reset.
    ViewportChange(Option<Bounds>),
}

/// Orchestrates builder, renderer and view state for one plot panel.
pub struct PlotCoordinator {
    tuning: CoordinatorConfig,
    config: PlotConfig,
    on_error: ErrorHandler,
    builder: Box<dyn DatasetsBuilder>,
    renderer: RenderWorker,
    series: Vec<SeriesConfig>,
    size: Size,
    zoom_mode: ZoomMode,
    user_x: Option<Range>,
    user_y: Option<Range>,
    pan_anchor: Option<ScreenPoint>,
    playback_range: Option<Range>,
    playhead_x: Option<f64>,
    synced_x: Option<Range>,
    sync: Option<SyncBinding>,
    bounds: Option<Bounds>,
    timeseries_bounds: Option<Range>,
    subscribers: Vec<Sender<CoordinatorEvent>>,
    destroyed: bool,
}

impl PlotCoordinator {
    /// Create a coordinator drawing through `renderer`.
    ///
    /// Worker failures after construction are reported through `on_error`.
    pub fn new(
        config: PlotConfig,
        renderer: impl ChartRenderer + 'static,
        tuning: CoordinatorConfig,
        on_error: ErrorHandler,
    ) -> Result<Self, PipelineError> {
        let renderer = RenderWorker::spawn(renderer, tuning.hover_threshold_px, on_error.clone())?;
        let mut builder =
            create_builder(config.x_axis_val, parse_x_path(&config), on_error.clone())?;
        let series = build_series_configs(&config);
        builder.set_series(&series);
        Ok(Self {
            tuning,
            config,
            on_error,
            builder,
            renderer,
            series,
            size: Size::default(),
            zoom_mode: ZoomMode::default(),
            user_x: None,
            user_y: None,
            pan_anchor: None,
            playback_range: None,
            playhead_x: None,
            synced_x: None,
            sync: None,
            bounds: None,
            timeseries_bounds: None,
            subscribers: Vec::new(),
            destroyed: false,
        })
    }

    /// Consume a player snapshot and redraw.
    ///
    /// Returns the bounds drawn.
    pub fn handle_player_state(&mut self, state: &PlayerState) -> Option<Bounds> {
        if self.destroyed {
            return None;
        }
        let range = self.builder.handle_player_state(state);
        if is_timestamp_mode(self.config.x_axis_val) {
            self.playback_range = range;
            self.playhead_x = state
                .active_data
                .as_ref()
                .map(|active| active.current_time.seconds_since(active.start_time));
        }
        self.render()
    }

    /// Consume preloaded blocks and redraw.
    ///
    /// A `Break` from `progress` stops block processing; what was consumed so
    /// far is still drawn.
    pub fn handle_blocks(
        &mut self,
        start_time: Time,
        blocks: &Blocks,
        progress: Progress<'_>,
    ) -> ControlFlow<()> {
        if self.destroyed {
            return ControlFlow::Continue(());
        }
        let flow = self.builder.handle_blocks(start_time, blocks, progress);
        if flow.is_break() {
            tracing::debug!("block processing aborted");
        }
        self.render();
        flow
    }

    /// Apply new panel settings.
    ///
    /// Changing the X axis mode or the custom X path replaces the builder and
    /// drops everything it accumulated.
    pub fn handle_config(&mut self, config: PlotConfig) -> Result<(), PipelineError> {
        if self.destroyed {
            return Ok(());
        }
        let swap = config.x_axis_val != self.config.x_axis_val
            || config.active_x_path() != self.config.active_x_path();
        if swap {
            let builder =
                create_builder(config.x_axis_val, parse_x_path(&config), self.on_error.clone())?;
            let mut previous = std::mem::replace(&mut self.builder, builder);
            previous.destroy();
            self.playback_range = None;
            self.playhead_x = None;
            self.user_x = None;
            self.user_y = None;
        }
        if !config.is_synced {
            self.synced_x = None;
        }
        self.series = build_series_configs(&config);
        self.builder.set_series(&self.series);
        self.config = config;
        self.render();
        Ok(())
    }

    /// Resize the canvas and redraw.
    pub fn set_size(&mut self, size: Size) -> Option<Bounds> {
        if self.destroyed {
            return None;
        }
        self.size = size;
        self.render()
    }

    /// Select which axes wheel zoom affects.
    pub fn set_zoom_mode(&mut self, mode: ZoomMode) {
        self.zoom_mode = mode;
    }

    /// Apply a pointer gesture.
    pub fn add_interaction_event(&mut self, event: InteractionEvent) {
        if self.destroyed {
            return;
        }
        match event {
            InteractionEvent::Wheel { delta_y, position } => {
                let Some((bounds, transform)) = self.current_transform() else {
                    return;
                };
                let factor = zoom_factor_from_wheel(delta_y, self.tuning.wheel_zoom_sensitivity);
                let (factor_x, factor_y) = self.zoom_mode.factors(factor);
                let center = transform.screen_to_data(position);
                let next = zoom_bounds(bounds, center, factor_x, factor_y);
                if factor_x != 1.0 {
                    self.user_x = Some(next.x);
                }
                if factor_y != 1.0 {
                    self.user_y = Some(next.y);
                }
                self.after_interaction();
            }
            InteractionEvent::PanStart { position } => {
                self.pan_anchor = Some(position);
            }
            InteractionEvent::PanMove { position } => {
                let Some(anchor) = self.pan_anchor.replace(position) else {
                    return;
                };
                let Some((bounds, transform)) = self.current_transform() else {
                    return;
                };
                let delta = ScreenPoint::new(position.x - anchor.x, position.y - anchor.y);
                let next = pan_bounds(bounds, delta, &transform);
                self.user_x = Some(next.x);
                if self.zoom_mode != ZoomMode::X {
                    self.user_y = Some(next.y);
                }
                self.after_interaction();
            }
            InteractionEvent::PanEnd => {
                self.pan_anchor = None;
            }
        }
    }

    /// Whether the view deviates from its default bounds.
    pub fn can_reset(&self) -> bool {
        self.user_x.is_some() || self.user_y.is_some() || self.synced_x.is_some()
    }

    /// Return to the default bounds.
    pub fn reset_bounds(&mut self) {
        if self.destroyed {
            return;
        }
        self.user_x = None;
        self.user_y = None;
        self.synced_x = None;
        self.pan_anchor = None;
        if self.config.is_synced
            && let Some(sync) = self.sync.as_mut()
        {
            sync.publish_reset();
        }
        self.render();
        self.emit(CoordinatorEvent::ViewportChange(None));
    }

    /// Data X under a horizontal pixel of the last drawn frame.
    pub fn x_value_at_pixel(&self, pixel_x: f32) -> Option<f64> {
        if self.destroyed {
            return None;
        }
        let (_, transform) = self.current_transform()?;
        Some(transform.x_at(pixel_x))
    }

    /// Samples near a canvas position.
    pub fn elements_at_pixel(&self, position: ScreenPoint) -> Vec<HoverElement> {
        if self.destroyed {
            return Vec::new();
        }
        self.renderer.elements_at_pixel(position)
    }

    /// Full-resolution data of every series.
    pub fn csv_data(&mut self) -> Option<Vec<CsvDataset>> {
        if self.destroyed {
            return None;
        }
        self.builder.csv_data()
    }

    /// Bounds of the last drawn frame.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// The series currently plotted.
    pub fn series(&self) -> &[SeriesConfig] {
        &self.series
    }

    /// Receive coordinator events.
    pub fn subscribe(&mut self) -> Receiver<CoordinatorEvent> {
        let (tx, rx) = channel::unbounded();
        if !self.destroyed {
            self.subscribers.push(tx);
        }
        rx
    }

    /// Join or leave a sync group. Only used while the config is synced.
    pub fn set_sync_group(&mut self, group: Option<BoundsSyncGroup>) {
        self.sync = group.map(SyncBinding::new);
        self.synced_x = None;
    }

    /// Tear down both workers. Every later call is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.builder.destroy();
        self.renderer.destroy();
        self.subscribers.clear();
        self.sync = None;
        tracing::debug!("plot coordinator destroyed");
    }

    /// Whether [`destroy`](Self::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn after_interaction(&mut self) {
        let bounds = self.render();
        if self.config.is_synced
            && let (Some(sync), Some(x)) = (self.sync.as_mut(), self.user_x)
        {
            sync.publish_bounds(x);
        }
        self.emit(CoordinatorEvent::ViewportChange(bounds));
    }

    fn current_transform(&self) -> Option<(Bounds, Transform)> {
        let bounds = self.bounds?;
        Some((bounds, Transform::new(bounds, self.size.rect())?))
    }

    fn poll_sync(&mut self) {
        if !self.config.is_synced {
            return;
        }
        let Some(sync) = self.sync.as_mut() else {
            return;
        };
        match sync.poll() {
            Some(SyncKind::Bounds(x)) => {
                tracing::trace!(min = x.min, max = x.max, "adopting synced bounds");
                self.synced_x = Some(x);
                self.user_x = None;
            }
            Some(SyncKind::Reset) => {
                self.synced_x = None;
                self.user_x = None;
            }
            None => {}
        }
    }

    fn data_x_range(&mut self) -> Option<Range> {
        if is_timestamp_mode(self.config.x_axis_val) {
            self.playback_range
        } else {
            self.builder.x_range()
        }
    }

    fn resolve_x(&self, data_x: Option<Range>) -> Option<Range> {
        let follow = match (self.config.following_view_width, self.playhead_x) {
            (Some(width), Some(playhead)) if width > 0.0 => {
                Some(Range::new(playhead - width, playhead))
            }
            _ => None,
        };
        let mut x = self.user_x.or(self.synced_x).or(follow).or(data_x)?;
        if let Some(min) = self.config.min_x_value {
            x.min = min;
        }
        if let Some(max) = self.config.max_x_value {
            x.max = max;
        }
        Some(Range::new(x.min, x.max).with_min_span(1e-9))
    }

    fn resolve_y(&self, data_y: Option<Range>) -> Range {
        let mut y = self
            .user_y
            .or_else(|| {
                data_y.map(|range| range.padded(self.tuning.padding_frac, self.tuning.min_padding))
            })
            .unwrap_or(Range::new(0.0, 1.0));
        if let Some(min) = self.config.min_y_value {
            y.min = min;
        }
        if let Some(max) = self.config.max_y_value {
            y.max = max;
        }
        Range::new(y.min, y.max).with_min_span(1e-9)
    }

    fn render(&mut self) -> Option<Bounds> {
        if self.destroyed {
            return None;
        }
        self.poll_sync();
        let data_x = self.data_x_range();
        if let Some(range) = data_x
            && self.timeseries_bounds != Some(range)
        {
            self.timeseries_bounds = Some(range);
            self.emit(CoordinatorEvent::TimeseriesBounds(range));
        }
        if !self.size.is_valid() {
            return None;
        }
        let x = self.resolve_x(data_x)?;
        let datasets = self.builder.viewport_datasets(&Viewport::from_x(x, self.size))?;
        let data_y = self.renderer.update_datasets(datasets);
        let bounds = Bounds::new(x, self.resolve_y(data_y));
        let drawn = self.renderer.update(RenderFrame {
            size: self.size,
            bounds,
            playhead_x: self.playhead_x,
        })?;
        self.bounds = Some(drawn);
        Some(drawn)
    }

    fn emit(&mut self, event: CoordinatorEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl Drop for PlotCoordinator {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for PlotCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlotCoordinator")
            .field("x_axis_val", &self.config.x_axis_val)
            .field("series", &self.series.len())
            .field("bounds", &self.bounds)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

fn is_timestamp_mode(mode: XAxisMode) -> bool {
    matches!(mode, XAxisMode::Timestamp | XAxisMode::PartialTimestamp)
}

fn parse_x_path(config: &PlotConfig) -> Option<MessagePath> {
    let text = config.active_x_path()?;
    match MessagePath::parse(text) {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::warn!(path = text, error = %err, "ignoring invalid x axis path");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::Dataset;
    use crate::config::PlotPath;
    use crate::message::{ActiveData, MessageEvent};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Frames(Arc<Mutex<Vec<(RenderFrame, Vec<Dataset>)>>>);

    impl ChartRenderer for Frames {
        fn draw(&mut self, frame: &RenderFrame, datasets: &[Dataset]) {
            self.0.lock().unwrap().push((*frame, datasets.to_vec()));
        }
    }

    fn coordinator(config: PlotConfig) -> (PlotCoordinator, Frames) {
        let frames = Frames::default();
        let on_error: ErrorHandler = Arc::new(|err| panic!("unexpected error: {err}"));
        let mut coordinator =
            PlotCoordinator::new(config, frames.clone(), CoordinatorConfig::default(), on_error)
                .unwrap();
        coordinator.set_size(Size::new(200.0, 100.0));
        (coordinator, frames)
    }

    fn state(messages: Vec<MessageEvent>, current: i64, seek: u64) -> PlayerState {
        PlayerState::active(ActiveData {
            messages,
            start_time: Time::new(0, 0),
            end_time: Time::new(10, 0),
            current_time: Time::new(current, 0),
            last_seek_time: seek,
        })
    }

    fn cmd_vel(sec: i64, x: f64) -> MessageEvent {
        MessageEvent::new("/cmd_vel", Time::new(sec, 0), json!({ "linear": { "x": x } }))
    }

    fn config() -> PlotConfig {
        PlotConfig {
            paths: vec![PlotPath::new("/cmd_vel.linear.x")],
            ..PlotConfig::default()
        }
    }

    #[test]
    fn draws_playback_range_with_padded_y() {
        let (mut coordinator, frames) = coordinator(config());
        let bounds = coordinator
            .handle_player_state(&state(vec![cmd_vel(0, 1.0), cmd_vel(1, 3.0)], 1, 0))
            .unwrap();
        assert_eq!(bounds.x, Range::new(0.0, 10.0));
        assert!(bounds.y.min < 1.0 && bounds.y.max > 3.0);

        let frames = frames.0.lock().unwrap();
        let (frame, datasets) = frames.last().unwrap();
        assert_eq!(frame.playhead_x, Some(1.0));
        assert_eq!(datasets[0].data.len(), 2);
    }

    #[test]
    fn fixed_config_bounds_win() {
        let mut config = config();
        config.min_x_value = Some(2.0);
        config.min_y_value = Some(-1.0);
        config.max_y_value = Some(1.0);
        let (mut coordinator, _) = coordinator(config);
        let bounds = coordinator
            .handle_player_state(&state(vec![cmd_vel(0, 5.0)], 0, 0))
            .unwrap();
        assert_eq!(bounds.x, Range::new(2.0, 10.0));
        assert_eq!(bounds.y, Range::new(-1.0, 1.0));
    }

    #[test]
    fn follow_mode_tracks_playhead() {
        let mut config = config();
        config.following_view_width = Some(3.0);
        let (mut coordinator, _) = coordinator(config);
        let bounds = coordinator.handle_player_state(&state(Vec::new(), 8, 0)).unwrap();
        assert_eq!(bounds.x, Range::new(5.0, 8.0));
    }

    #[test]
    fn wheel_zoom_sets_user_bounds_until_reset() {
        let (mut coordinator, _) = coordinator(config());
        let events = coordinator.subscribe();
        coordinator.handle_player_state(&state(vec![cmd_vel(0, 1.0)], 0, 0));
        assert!(!coordinator.can_reset());

        coordinator.add_interaction_event(InteractionEvent::Wheel {
            delta_y: -200.0,
            position: ScreenPoint::new(100.0, 50.0),
        });
        assert!(coordinator.can_reset());
        let zoomed = coordinator.bounds().unwrap();
        assert!(zoomed.x.span() < 10.0);
        assert!((zoomed.x.min + zoomed.x.max - 10.0).abs() < 1e-9);

        coordinator.reset_bounds();
        assert!(!coordinator.can_reset());
        assert_eq!(coordinator.bounds().unwrap().x, Range::new(0.0, 10.0));

        let received: Vec<_> = events.try_iter().collect();
        assert!(received.contains(&CoordinatorEvent::TimeseriesBounds(Range::new(0.0, 10.0))));
        assert!(received.contains(&CoordinatorEvent::ViewportChange(None)));
        assert!(
            received
                .iter()
                .any(|event| matches!(event, CoordinatorEvent::ViewportChange(Some(_))))
        );
    }

    #[test]
    fn pan_shifts_x_only_in_x_zoom_mode() {
        let (mut coordinator, _) = coordinator(config());
        coordinator.handle_player_state(&state(vec![cmd_vel(0, 1.0)], 0, 0));
        let before = coordinator.bounds().unwrap();
        coordinator.add_interaction_event(InteractionEvent::PanStart {
            position: ScreenPoint::new(100.0, 50.0),
        });
        coordinator.add_interaction_event(InteractionEvent::PanMove {
            position: ScreenPoint::new(120.0, 10.0),
        });
        coordinator.add_interaction_event(InteractionEvent::PanEnd);
        let after = coordinator.bounds().unwrap();
        assert!((after.x.min - (before.x.min - 1.0)).abs() < 1e-9);
        assert_eq!(after.y, before.y);
    }

    #[test]
    fn x_value_at_pixel_uses_last_frame() {
        let (mut coordinator, _) = coordinator(config());
        assert_eq!(coordinator.x_value_at_pixel(10.0), None);
        coordinator.handle_player_state(&state(Vec::new(), 0, 0));
        assert_eq!(coordinator.x_value_at_pixel(100.0), Some(5.0));
    }

    #[test]
    fn synced_panels_share_x_bounds() {
        let group = BoundsSyncGroup::new();
        let mut config = config();
        config.is_synced = true;
        let (mut left, _) = coordinator(config.clone());
        let (mut right, _) = coordinator(config);
        left.set_sync_group(Some(group.clone()));
        right.set_sync_group(Some(group));
        left.handle_player_state(&state(Vec::new(), 0, 0));
        right.handle_player_state(&state(Vec::new(), 0, 0));

        left.add_interaction_event(InteractionEvent::Wheel {
            delta_y: -200.0,
            position: ScreenPoint::new(0.0, 50.0),
        });
        let shared = left.bounds().unwrap().x;
        let adopted = right.handle_player_state(&state(Vec::new(), 0, 0)).unwrap();
        assert_eq!(adopted.x, shared);
        assert!(right.can_reset());
    }

    #[test]
    fn switching_axis_mode_swaps_builder() {
        let (mut coordinator, _) = coordinator(config());
        coordinator.handle_player_state(&state(vec![cmd_vel(0, 1.0)], 0, 0));
        assert_eq!(coordinator.csv_data().unwrap()[0].data.len(), 1);

        let mut index = config();
        index.x_axis_val = XAxisMode::Index;
        coordinator.handle_config(index).unwrap();
        assert_eq!(coordinator.csv_data().unwrap()[0].data.len(), 0);
        assert!(!coordinator.can_reset());
    }

    #[test]
    fn calls_after_destroy_are_inert() {
        let (mut coordinator, _) = coordinator(config());
        let events = coordinator.subscribe();
        coordinator.destroy();
        assert!(coordinator.is_destroyed());
        assert_eq!(coordinator.handle_player_state(&state(vec![cmd_vel(0, 1.0)], 0, 0)), None);
        assert_eq!(coordinator.set_size(Size::new(10.0, 10.0)), None);
        assert!(coordinator.elements_at_pixel(ScreenPoint::new(1.0, 1.0)).is_empty());
        assert_eq!(coordinator.csv_data(), None);
        assert_eq!(coordinator.x_value_at_pixel(1.0), None);
        coordinator.add_interaction_event(InteractionEvent::PanEnd);
        coordinator.reset_bounds();
        assert!(coordinator.handle_config(config()).is_ok());
        assert!(events.recv().is_err());
        coordinator.destroy();
    }
}
