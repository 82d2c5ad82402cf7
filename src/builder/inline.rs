use std::collections::HashMap;

use crate::accumulator::{CsvDataset, Dataset};
use crate::builder::datasets_x_range;
use crate::datasource::{DecimationScratch, SampleView, downsample};
use crate::extract::Datum;
use crate::series::{SeriesConfig, SeriesKey};
use crate::view::{Range, Viewport};

/// Per-series samples kept on the calling thread.
///
/// Used by the modes whose data is replaced wholesale rather than accumulated
/// over a whole recording.
#[derive(Debug, Default)]
pub(crate) struct InlineDatasets {
    series: Vec<SeriesConfig>,
    data: HashMap<SeriesKey, Vec<Datum>>,
    scratch: DecimationScratch,
    destroyed: bool,
}

impl InlineDatasets {
    pub(crate) fn set_series(&mut self, series: &[SeriesConfig]) {
        self.data
            .retain(|key, _| series.iter().any(|entry| &entry.key == key));
        self.series = series.to_vec();
    }

    pub(crate) fn series(&self) -> &[SeriesConfig] {
        &self.series
    }

    pub(crate) fn replace(&mut self, key: &SeriesKey, items: Vec<Datum>) {
        self.data.insert(key.clone(), items);
    }

    pub(crate) fn viewport_datasets(&mut self, viewport: &Viewport) -> Option<Vec<Dataset>> {
        if self.destroyed {
            return None;
        }
        let pixel_width = viewport.size.pixel_width();
        let datasets = self
            .series
            .iter()
            .map(|series| {
                let items = self.data.get(&series.key).map(Vec::as_slice).unwrap_or_default();
                let monotonic = items.windows(2).all(|pair| pair[0].x <= pair[1].x);
                Dataset {
                    series_index: series.index,
                    key: series.key.clone(),
                    data: downsample(
                        SampleView::from_slice(items),
                        monotonic,
                        None,
                        viewport.bounds.x,
                        pixel_width,
                        &mut self.scratch,
                    ),
                }
            })
            .collect();
        Some(datasets)
    }

    pub(crate) fn csv_data(&self) -> Option<Vec<CsvDataset>> {
        if self.destroyed {
            return None;
        }
        Some(
            self.series
                .iter()
                .map(|series| CsvDataset {
                    label: series.label.clone(),
                    data: self.data.get(&series.key).cloned().unwrap_or_default(),
                })
                .collect(),
        )
    }

    pub(crate) fn x_range(&self) -> Option<Range> {
        if self.destroyed {
            return None;
        }
        datasets_x_range(self.data.values().map(Vec::as_slice))
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn destroy(&mut self) {
        self.destroyed = true;
        self.data.clear();
    }
}
