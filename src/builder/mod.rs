//! Dataset builders, one per X axis mode.
//!
//! A builder turns player snapshots and preloaded blocks into per-series
//! datasets. The coordinator owns exactly one builder and replaces it whenever
//! the X axis mode (or the custom X path) changes.

mod custom;
mod index;
mod inline;
mod timestamp;

use std::ops::ControlFlow;

pub use custom::{CurrentCustomDatasetsBuilder, CustomDatasetsBuilder};
pub use index::IndexDatasetsBuilder;
pub use timestamp::TimestampDatasetsBuilder;

use crate::accumulator::{CsvDataset, Dataset};
use crate::config::XAxisMode;
use crate::error::{ErrorHandler, PipelineError};
use crate::message::{Blocks, PlayerState};
use crate::path::MessagePath;
use crate::series::SeriesConfig;
use crate::time::Time;
use crate::view::{Range, Viewport};

/// Callback checked between units of block work; `Break` aborts the loop.
pub type Progress<'a> = &'a mut dyn FnMut() -> ControlFlow<()>;

/// Source of render-ready datasets for one X axis mode.
///
/// Reads return `None` once the builder has been destroyed.
pub trait DatasetsBuilder: Send {
    /// Replace the configured series.
    fn set_series(&mut self, series: &[SeriesConfig]);

    /// Consume one player snapshot.
    ///
    /// Returns the playback X range when the mode has one.
    fn handle_player_state(&mut self, state: &PlayerState) -> Option<Range>;

    /// Consume newly available preloaded blocks.
    ///
    /// `progress` is checked after each series; returning `Break` stops the
    /// loop early and is passed back to the caller.
    fn handle_blocks(
        &mut self,
        start_time: Time,
        blocks: &Blocks,
        progress: Progress<'_>,
    ) -> ControlFlow<()>;

    /// Down-sampled datasets for a viewport.
    fn viewport_datasets(&mut self, viewport: &Viewport) -> Option<Vec<Dataset>>;

    /// Full-resolution datasets for export.
    fn csv_data(&mut self) -> Option<Vec<CsvDataset>>;

    /// X extent of the accumulated data.
    fn x_range(&mut self) -> Option<Range>;

    /// Release the builder's resources. Idempotent.
    fn destroy(&mut self);
}

/// Create the builder for an X axis mode.
///
/// The custom modes need `x_path`; without it they plot nothing.
pub fn create_builder(
    mode: XAxisMode,
    x_path: Option<MessagePath>,
    on_error: ErrorHandler,
) -> Result<Box<dyn DatasetsBuilder>, PipelineError> {
    let builder: Box<dyn DatasetsBuilder> = match mode {
        XAxisMode::Timestamp => Box::new(TimestampDatasetsBuilder::new(on_error)?),
        XAxisMode::PartialTimestamp => Box::new(TimestampDatasetsBuilder::partial(on_error)?),
        XAxisMode::Index => Box::new(IndexDatasetsBuilder::new()),
        XAxisMode::Custom => Box::new(CustomDatasetsBuilder::new(x_path)),
        XAxisMode::CurrentCustom => Box::new(CurrentCustomDatasetsBuilder::new(x_path)),
    };
    tracing::debug!(?mode, "created datasets builder");
    Ok(builder)
}

/// Collect the extent of several datasets' X values.
pub(crate) fn datasets_x_range<'a>(
    items: impl IntoIterator<Item = &'a [crate::extract::Datum]>,
) -> Option<Range> {
    items
        .into_iter()
        .flatten()
        .filter(|item| item.x.is_finite())
        .fold(None, |acc: Option<Range>, item| match acc {
            None => Some(Range::new(item.x, item.x)),
            Some(mut range) => {
                range.expand_to_include(item.x);
                Some(range)
            }
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::error::ErrorHandler;
    use crate::geom::Size;
    use crate::message::{ActiveData, MessageBlock, MessageEvent, PlayerState};
    use crate::path::MessagePath;
    use crate::series::{SeriesConfig, TimestampMethod};
    use crate::time::Time;
    use crate::view::{Range, Viewport};

    pub(crate) fn fail_on_error() -> ErrorHandler {
        Arc::new(|err| panic!("unexpected pipeline error: {err}"))
    }

    pub(crate) fn series(index: usize, path: &str) -> SeriesConfig {
        SeriesConfig::new(index, MessagePath::parse(path).unwrap(), TimestampMethod::ReceiveTime)
    }

    pub(crate) fn event(topic: &str, seconds: f64, message: Value) -> MessageEvent {
        MessageEvent::new(topic, Time::from_seconds(seconds), message)
    }

    pub(crate) fn frame(messages: Vec<MessageEvent>, last_seek_time: u64) -> PlayerState {
        PlayerState::active(ActiveData {
            messages,
            start_time: Time::new(0, 0),
            end_time: Time::new(10, 0),
            current_time: Time::new(5, 0),
            last_seek_time,
        })
    }

    pub(crate) fn block(events: Vec<MessageEvent>) -> Option<Arc<MessageBlock>> {
        let mut block = MessageBlock::new();
        let mut topics: Vec<String> = events.iter().map(|event| event.topic.clone()).collect();
        topics.sort();
        topics.dedup();
        for topic in topics {
            let on_topic: Vec<_> =
                events.iter().filter(|event| event.topic == topic).cloned().collect();
            block = block.with_topic(topic, on_topic);
        }
        Some(Arc::new(block))
    }

    pub(crate) fn wide_viewport() -> Viewport {
        Viewport::from_x(Range::new(-1000.0, 1000.0), Size::new(800.0, 400.0))
    }
}
