//! tsplot turns streaming robotics messages into render-ready plot datasets.
//!
//! Player snapshots and preloaded message blocks flow through per-series
//! extraction into an accumulator running on its own worker thread. Reads
//! return viewport-scoped, down-sampled datasets, so drawing cost stays flat
//! no matter how much history has been recorded.

#![forbid(unsafe_code)]

pub mod accumulator;
pub mod builder;
pub mod config;
pub mod coordinator;
pub mod csv;
pub mod cursor;
mod datasource;
pub mod error;
pub mod extract;
pub mod geom;
pub mod interaction;
pub mod math;
pub mod message;
pub mod path;
pub mod renderer;
pub mod series;
pub mod sync;
pub mod time;
mod transform;
pub mod view;
mod worker;

pub use accumulator::{
    CsvDataset, Dataset, SeriesDescriptor, TimestampDatasets, UpdateDataAction, ViewportDatasets,
};
pub use builder::{
    CurrentCustomDatasetsBuilder, CustomDatasetsBuilder, DatasetsBuilder, IndexDatasetsBuilder,
    Progress, TimestampDatasetsBuilder, create_builder,
};
pub use config::{CoordinatorConfig, PlotConfig, PlotPath, XAxisMode, XAxisPath};
pub use coordinator::{CoordinatorEvent, PlotCoordinator};
pub use crate::csv::{csv_string, write_csv};
pub use cursor::BlockTopicCursor;
pub use datasource::AppendError;
pub use error::{ErrorHandler, PathParseError, PipelineError, UnknownMathFunction};
pub use extract::{Datum, chart_value, extract_indexed, extract_items};
pub use geom::{Point, ScreenPoint, Size};
pub use interaction::{InteractionEvent, ZoomMode};
pub use math::MathFunction;
pub use message::{ActiveData, Blocks, MessageBlock, MessageEvent, PlayerState};
pub use path::{FilterValue, MessagePath, PathSegment};
pub use renderer::{ChartRenderer, HoverElement, RenderFrame, RenderWorker};
pub use series::{SeriesConfig, SeriesKey, TimestampMethod, build_series_configs, series_key};
pub use sync::{BoundsSyncGroup, SyncKind, SyncMemberId, SyncUpdate};
pub use time::Time;
pub use view::{Bounds, Range, Viewport};
