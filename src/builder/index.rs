use std::ops::ControlFlow;

use crate::accumulator::{CsvDataset, Dataset};
use crate::builder::inline::InlineDatasets;
use crate::builder::{DatasetsBuilder, Progress};
use crate::extract::{extract_indexed, last_event_on};
use crate::message::{Blocks, PlayerState};
use crate::series::SeriesConfig;
use crate::time::Time;
use crate::view::{Range, Viewport};

/// Builder for the index X axis mode.
///
/// Each series shows the values of the latest message on its topic, with X set
/// to the position of each value.
#[derive(Debug, Default)]
pub struct IndexDatasetsBuilder {
    datasets: InlineDatasets,
}

impl IndexDatasetsBuilder {
    /// Builder with no series.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatasetsBuilder for IndexDatasetsBuilder {
    fn set_series(&mut self, series: &[SeriesConfig]) {
        self.datasets.set_series(series);
    }

    fn handle_player_state(&mut self, state: &PlayerState) -> Option<Range> {
        let active = state.active_data.as_ref()?;
        if self.datasets.is_destroyed() {
            return None;
        }
        let updates: Vec<_> = self
            .datasets
            .series()
            .iter()
            .filter_map(|series| {
                let event = last_event_on(&active.messages, series.topic())?;
                Some((series.key.clone(), extract_indexed(event, &series.parsed_path, series.math)))
            })
            .collect();
        for (key, items) in updates {
            self.datasets.replace(&key, items);
        }
        None
    }

    fn handle_blocks(
        &mut self,
        _start_time: Time,
        _blocks: &Blocks,
        _progress: Progress<'_>,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn viewport_datasets(&mut self, viewport: &Viewport) -> Option<Vec<Dataset>> {
        self.datasets.viewport_datasets(viewport)
    }

    fn csv_data(&mut self) -> Option<Vec<CsvDataset>> {
        self.datasets.csv_data()
    }

    fn x_range(&mut self) -> Option<Range> {
        self.datasets.x_range()
    }

    fn destroy(&mut self) {
        self.datasets.destroy();
    }
}
