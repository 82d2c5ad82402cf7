//! Dataset accumulator for the timestamp X axis modes.
//!
//! Each series keeps two buffers: a *full* buffer filled from preloaded blocks
//! and a *current* buffer filled from live playback frames. Mutations arrive as
//! batches of [`UpdateDataAction`]s; reads produce down-sampled datasets scoped
//! to a viewport.

use crate::datasource::{DecimationScratch, SampleView, SeriesStore, downsample};
use crate::extract::Datum;
use crate::series::SeriesKey;
use crate::view::{Range, Viewport};

/// Identity of a series as seen by the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDescriptor {
    /// Series key.
    pub key: SeriesKey,
    /// Position of the series in the settings list.
    pub index: usize,
    /// Legend label, used for CSV export.
    pub label: String,
}

/// One queued mutation of the accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateDataAction {
    /// Clear the live buffer of a series.
    ResetCurrent { series: SeriesKey },
    /// Clear the preloaded buffer of a series.
    ResetFull { series: SeriesKey },
    /// Append to the live buffer of a series.
    AppendCurrent { series: SeriesKey, items: Vec<Datum> },
    /// Append to the preloaded buffer of a series.
    AppendFull { series: SeriesKey, items: Vec<Datum> },
    /// Replace the set of series.
    UpdateSeriesConfig { series: Vec<SeriesDescriptor> },
}

/// Render-ready samples of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Position of the series in the settings list.
    pub series_index: usize,
    /// Series key.
    pub key: SeriesKey,
    /// Samples in X order.
    pub data: Vec<Datum>,
}

impl Dataset {
    /// Y extent of the samples, ignoring non-finite values.
    pub fn y_range(&self) -> Option<Range> {
        finite_y_range(&self.data)
    }
}

/// Viewport-scoped datasets in configuration order.
pub type ViewportDatasets = Vec<Dataset>;

/// Full-resolution samples of one series for export.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvDataset {
    /// Legend label of the series.
    pub label: String,
    /// Every sample.
    pub data: Vec<Datum>,
}

#[derive(Debug, Clone)]
struct SeriesBuffers {
    descriptor: SeriesDescriptor,
    full: SeriesStore,
    current: SeriesStore,
}

impl SeriesBuffers {
    fn new(descriptor: SeriesDescriptor) -> Self {
        Self {
            descriptor,
            full: SeriesStore::new(),
            current: SeriesStore::new(),
        }
    }

    fn view(&self) -> (SampleView<'_>, bool) {
        if self.full.is_monotonic() && self.current.is_monotonic() {
            (SampleView::merged(self.full.items(), self.current.items()), true)
        } else {
            (SampleView::chained(self.full.items(), self.current.items()), false)
        }
    }
}

/// Per-series full/current buffers keyed by series.
#[derive(Debug, Clone, Default)]
pub struct TimestampDatasets {
    series: Vec<SeriesBuffers>,
    scratch: DecimationScratch,
}

impl TimestampDatasets {
    /// Create an accumulator with no series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of actions in submission order.
    ///
    /// Actions naming a series that is not configured are skipped; the rest of
    /// the batch still applies.
    pub fn apply_actions(&mut self, actions: impl IntoIterator<Item = UpdateDataAction>) {
        for action in actions {
            self.apply(action);
        }
    }

    /// Apply one action.
    pub fn apply(&mut self, action: UpdateDataAction) {
        match action {
            UpdateDataAction::UpdateSeriesConfig { series } => self.update_series(series),
            UpdateDataAction::ResetCurrent { series } => {
                if let Some(buffers) = self.buffers_mut(&series) {
                    buffers.current.clear();
                }
            }
            UpdateDataAction::ResetFull { series } => {
                if let Some(buffers) = self.buffers_mut(&series) {
                    buffers.full.clear();
                }
            }
            UpdateDataAction::AppendCurrent { series, items } => {
                if let Some(buffers) = self.buffers_mut(&series)
                    && buffers.current.extend(items).is_err()
                {
                    tracing::debug!(series = %series, "current samples appended out of x order");
                }
            }
            UpdateDataAction::AppendFull { series, items } => {
                if let Some(buffers) = self.buffers_mut(&series)
                    && buffers.full.extend(items).is_err()
                {
                    tracing::debug!(series = %series, "full samples appended out of x order");
                }
            }
        }
    }

    /// Down-sampled datasets for every series, in configuration order.
    pub fn viewport_datasets(&mut self, viewport: &Viewport) -> ViewportDatasets {
        let x_range = viewport.bounds.x;
        let pixel_width = viewport.size.pixel_width();
        let scratch = &mut self.scratch;
        self.series
            .iter()
            .map(|buffers| {
                let data = if buffers.current.is_empty() {
                    buffers.full.decimate(x_range, pixel_width, scratch)
                } else if buffers.full.is_empty() {
                    buffers.current.decimate(x_range, pixel_width, scratch)
                } else {
                    let (view, monotonic) = buffers.view();
                    downsample(view, monotonic, None, x_range, pixel_width, scratch)
                };
                Dataset {
                    series_index: buffers.descriptor.index,
                    key: buffers.descriptor.key.clone(),
                    data,
                }
            })
            .collect()
    }

    /// Every accumulated sample per series, without down-sampling.
    pub fn csv_data(&self) -> Vec<CsvDataset> {
        self.series
            .iter()
            .map(|buffers| {
                let (view, _) = buffers.view();
                CsvDataset {
                    label: buffers.descriptor.label.clone(),
                    data: view.iter().cloned().collect(),
                }
            })
            .collect()
    }

    /// X extent of everything accumulated.
    pub fn x_range(&self) -> Option<Range> {
        self.series
            .iter()
            .flat_map(|buffers| [buffers.full.bounds(), buffers.current.bounds()])
            .flatten()
            .map(|bounds| bounds.x)
            .fold(None, |acc, range| Range::union_opt(acc, Some(range)))
    }

    /// Number of samples held for a series as `(full, current)`.
    pub fn series_len(&self, key: &SeriesKey) -> Option<(usize, usize)> {
        self.series
            .iter()
            .find(|buffers| &buffers.descriptor.key == key)
            .map(|buffers| (buffers.full.len(), buffers.current.len()))
    }

    fn update_series(&mut self, descriptors: Vec<SeriesDescriptor>) {
        let mut previous = std::mem::take(&mut self.series);
        self.series = descriptors
            .into_iter()
            .map(|descriptor| {
                match previous
                    .iter()
                    .position(|buffers| buffers.descriptor.key == descriptor.key)
                {
                    Some(position) => {
                        let mut buffers = previous.swap_remove(position);
                        buffers.descriptor = descriptor;
                        buffers
                    }
                    None => SeriesBuffers::new(descriptor),
                }
            })
            .collect();
        if !previous.is_empty() {
            tracing::debug!(dropped = previous.len(), "dropped buffers of removed series");
        }
    }

    fn buffers_mut(&mut self, key: &SeriesKey) -> Option<&mut SeriesBuffers> {
        let found = self
            .series
            .iter_mut()
            .find(|buffers| &buffers.descriptor.key == key);
        if found.is_none() {
            tracing::debug!(series = %key, "ignoring action for unknown series");
        }
        found
    }
}

pub(crate) fn finite_y_range(items: &[Datum]) -> Option<Range> {
    items
        .iter()
        .filter(|item| item.y.is_finite())
        .fold(None, |acc: Option<Range>, item| match acc {
            None => Some(Range::new(item.y, item.y)),
            Some(mut range) => {
                range.expand_to_include(item.y);
                Some(range)
            }
        })
}
