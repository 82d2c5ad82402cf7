use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::accumulator::{
    CsvDataset, Dataset, SeriesDescriptor, TimestampDatasets, UpdateDataAction,
};
use crate::builder::{DatasetsBuilder, Progress};
use crate::cursor::BlockTopicCursor;
use crate::error::{ErrorHandler, PipelineError};
use crate::extract::extract_items;
use crate::message::{Blocks, PlayerState};
use crate::series::{SeriesConfig, SeriesKey};
use crate::time::Time;
use crate::view::{Range, Viewport};
use crate::worker::Worker;

/// Builder for the timestamp X axis modes.
///
/// Mutations are queued locally and shipped to the accumulator worker as one
/// batch right before every read, so a read observes every mutation issued
/// before it, in order.
#[derive(Debug)]
pub struct TimestampDatasetsBuilder {
    worker: Worker<TimestampDatasets>,
    pending: Vec<UpdateDataAction>,
    series: Vec<SeriesConfig>,
    cursors: HashMap<SeriesKey, BlockTopicCursor>,
    last_seek_time: Option<u64>,
    block_start_time: Option<Time>,
    use_blocks: bool,
}

impl TimestampDatasetsBuilder {
    /// Builder plotting preloaded blocks and live frames.
    pub fn new(on_error: ErrorHandler) -> Result<Self, PipelineError> {
        Self::with_blocks(true, on_error)
    }

    /// Builder plotting live frames only.
    pub fn partial(on_error: ErrorHandler) -> Result<Self, PipelineError> {
        Self::with_blocks(false, on_error)
    }

    fn with_blocks(use_blocks: bool, on_error: ErrorHandler) -> Result<Self, PipelineError> {
        Ok(Self {
            worker: Worker::spawn("datasets", TimestampDatasets::new(), on_error)?,
            pending: Vec::new(),
            series: Vec::new(),
            cursors: HashMap::new(),
            last_seek_time: None,
            block_start_time: None,
            use_blocks,
        })
    }

    /// Actions queued since the last read.
    pub fn pending_actions(&self) -> &[UpdateDataAction] {
        &self.pending
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let actions = std::mem::take(&mut self.pending);
        tracing::trace!(count = actions.len(), "flushing dataset actions");
        self.worker.post(move |datasets| datasets.apply_actions(actions));
    }

    fn reset_blocks(&mut self) {
        for cursor in self.cursors.values_mut() {
            cursor.reset();
        }
        for series in &self.series {
            self.pending.push(UpdateDataAction::ResetFull {
                series: series.key.clone(),
            });
        }
    }
}

impl DatasetsBuilder for TimestampDatasetsBuilder {
    fn set_series(&mut self, series: &[SeriesConfig]) {
        self.cursors
            .retain(|key, _| series.iter().any(|entry| &entry.key == key));
        for entry in series {
            self.cursors
                .entry(entry.key.clone())
                .or_insert_with(|| BlockTopicCursor::new(entry.topic()));
        }
        self.series = series.to_vec();
        self.pending.push(UpdateDataAction::UpdateSeriesConfig {
            series: series
                .iter()
                .map(|entry| SeriesDescriptor {
                    key: entry.key.clone(),
                    index: entry.index,
                    label: entry.label.clone(),
                })
                .collect(),
        });
    }

    fn handle_player_state(&mut self, state: &PlayerState) -> Option<Range> {
        let active = state.active_data.as_ref()?;

        if self.last_seek_time != Some(active.last_seek_time) {
            tracing::debug!(
                last_seek_time = active.last_seek_time,
                "seek detected, resetting current data"
            );
            self.last_seek_time = Some(active.last_seek_time);
            for series in &self.series {
                self.pending.push(UpdateDataAction::ResetCurrent {
                    series: series.key.clone(),
                });
            }
        }

        for series in &self.series {
            let items = extract_items(
                &active.messages,
                &series.parsed_path,
                series.timestamp_method,
                active.start_time,
                series.math,
            );
            if items.is_empty() {
                continue;
            }
            self.pending.push(UpdateDataAction::AppendCurrent {
                series: series.key.clone(),
                items,
            });
        }

        Some(Range::new(0.0, active.end_time.seconds_since(active.start_time)))
    }

    fn handle_blocks(
        &mut self,
        start_time: Time,
        blocks: &Blocks,
        progress: Progress<'_>,
    ) -> ControlFlow<()> {
        if !self.use_blocks {
            return ControlFlow::Continue(());
        }
        if self.block_start_time != Some(start_time) {
            if self.block_start_time.is_some() {
                tracing::debug!(start = %start_time, "start time changed, resetting full data");
                self.reset_blocks();
            }
            self.block_start_time = Some(start_time);
        }

        loop {
            let mut done = 0;
            for series in &self.series {
                let Some(cursor) = self.cursors.get_mut(&series.key) else {
                    done += 1;
                    continue;
                };
                if cursor.next_will_reset(blocks) {
                    tracing::debug!(series = %series.key, "blocks replaced, resetting full data");
                    self.pending.push(UpdateDataAction::ResetFull {
                        series: series.key.clone(),
                    });
                }
                match cursor.next(blocks) {
                    None => done += 1,
                    Some(events) => {
                        let items = extract_items(
                            &events,
                            &series.parsed_path,
                            series.timestamp_method,
                            start_time,
                            series.math,
                        );
                        if !items.is_empty() {
                            self.pending.push(UpdateDataAction::AppendFull {
                                series: series.key.clone(),
                                items,
                            });
                        }
                    }
                }
                progress()?;
            }
            if done == self.series.len() {
                return ControlFlow::Continue(());
            }
        }
    }

    fn viewport_datasets(&mut self, viewport: &Viewport) -> Option<Vec<Dataset>> {
        self.flush();
        let viewport = *viewport;
        self.worker
            .query(move |datasets| datasets.viewport_datasets(&viewport))
    }

    fn csv_data(&mut self) -> Option<Vec<CsvDataset>> {
        self.flush();
        self.worker.query(|datasets| datasets.csv_data())
    }

    fn x_range(&mut self) -> Option<Range> {
        self.flush();
        self.worker.query(|datasets| datasets.x_range()).flatten()
    }

    fn destroy(&mut self) {
        self.pending.clear();
        self.worker.destroy();
    }
}
