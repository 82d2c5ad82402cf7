use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::accumulator::{CsvDataset, Dataset};
use crate::builder::inline::InlineDatasets;
use crate::builder::{DatasetsBuilder, Progress};
use crate::cursor::BlockTopicCursor;
use crate::extract::{Datum, extract_indexed, extract_items, last_event_on};
use crate::message::{Blocks, MessageEvent, PlayerState};
use crate::path::MessagePath;
use crate::series::{SeriesConfig, SeriesKey, TimestampMethod};
use crate::time::Time;
use crate::view::{Range, Viewport};

/// Pair the i-th X sample with the i-th Y sample.
fn pair_samples(xs: &[Datum], ys: &[Datum]) -> Vec<Datum> {
    xs.iter()
        .zip(ys)
        .map(|(x, y)| Datum {
            x: x.y,
            y: y.y,
            receive_time: y.receive_time,
            header_stamp: y.header_stamp,
            value: y.value.clone(),
        })
        .collect()
}

#[derive(Debug, Default)]
struct Streams {
    x: Vec<Datum>,
    y: HashMap<SeriesKey, Vec<Datum>>,
}

impl Streams {
    fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
    }

    fn series(&self, key: &SeriesKey) -> &[Datum] {
        self.y.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Builder for the custom X axis mode.
///
/// X values come from a second message path. Both X and Y streams accumulate
/// over the recording, from preloaded blocks (full) and live frames (current),
/// and are paired by position. Full data is used whenever it exists.
#[derive(Debug, Default)]
pub struct CustomDatasetsBuilder {
    x_path: Option<MessagePath>,
    x_cursor: Option<BlockTopicCursor>,
    cursors: HashMap<SeriesKey, BlockTopicCursor>,
    full: Streams,
    current: Streams,
    last_seek_time: Option<u64>,
    block_start_time: Option<Time>,
    dirty: bool,
    datasets: InlineDatasets,
}

impl CustomDatasetsBuilder {
    /// Builder reading X values from `x_path`; plots nothing without one.
    pub fn new(x_path: Option<MessagePath>) -> Self {
        Self {
            x_cursor: x_path
                .as_ref()
                .map(|path| BlockTopicCursor::new(path.topic_name.clone())),
            x_path,
            ..Self::default()
        }
    }

    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let mut updates = Vec::with_capacity(self.datasets.series().len());
        for series in self.datasets.series() {
            let full = self.full.series(&series.key);
            let pairs = if !self.full.x.is_empty() && !full.is_empty() {
                pair_samples(&self.full.x, full)
            } else {
                pair_samples(&self.current.x, self.current.series(&series.key))
            };
            updates.push((series.key.clone(), pairs));
        }
        for (key, pairs) in updates {
            self.datasets.replace(&key, pairs);
        }
    }

    fn extract(
        events: &[MessageEvent],
        path: &MessagePath,
        start_time: Time,
        series: Option<&SeriesConfig>,
    ) -> Vec<Datum> {
        match series {
            Some(series) => {
                extract_items(events, path, series.timestamp_method, start_time, series.math)
            }
            None => extract_items(events, path, TimestampMethod::ReceiveTime, start_time, None),
        }
    }
}

impl DatasetsBuilder for CustomDatasetsBuilder {
    fn set_series(&mut self, series: &[SeriesConfig]) {
        self.cursors
            .retain(|key, _| series.iter().any(|entry| &entry.key == key));
        for entry in series {
            self.cursors
                .entry(entry.key.clone())
                .or_insert_with(|| BlockTopicCursor::new(entry.topic()));
        }
        for streams in [&mut self.full, &mut self.current] {
            streams
                .y
                .retain(|key, _| series.iter().any(|entry| &entry.key == key));
        }
        self.datasets.set_series(series);
        self.dirty = true;
    }

    fn handle_player_state(&mut self, state: &PlayerState) -> Option<Range> {
        let active = state.active_data.as_ref()?;
        if self.datasets.is_destroyed() {
            return None;
        }
        let x_path = self.x_path.clone()?;

        if self.last_seek_time != Some(active.last_seek_time) {
            self.last_seek_time = Some(active.last_seek_time);
            self.current.clear();
        }

        let xs = Self::extract(&active.messages, &x_path, active.start_time, None);
        self.current.x.extend(xs);
        for series in self.datasets.series().to_vec() {
            let ys = Self::extract(
                &active.messages,
                &series.parsed_path,
                active.start_time,
                Some(&series),
            );
            self.current.y.entry(series.key).or_default().extend(ys);
        }
        self.dirty = true;
        None
    }

    fn handle_blocks(
        &mut self,
        start_time: Time,
        blocks: &Blocks,
        progress: Progress<'_>,
    ) -> ControlFlow<()> {
        if self.datasets.is_destroyed() {
            return ControlFlow::Continue(());
        }
        let Some(x_path) = self.x_path.clone() else {
            return ControlFlow::Continue(());
        };
        if self.block_start_time != Some(start_time) {
            if self.block_start_time.is_some() {
                self.full.clear();
                self.cursors.values_mut().for_each(BlockTopicCursor::reset);
                if let Some(cursor) = self.x_cursor.as_mut() {
                    cursor.reset();
                }
            }
            self.block_start_time = Some(start_time);
        }
        let series = self.datasets.series().to_vec();

        loop {
            let mut done = 0;
            if let Some(cursor) = self.x_cursor.as_mut() {
                if cursor.next_will_reset(blocks) {
                    tracing::debug!(
                        topic = cursor.topic(),
                        "blocks replaced, resetting custom x data"
                    );
                    self.full.x.clear();
                }
                match cursor.next(blocks) {
                    None => done += 1,
                    Some(events) => {
                        let xs = extract_items(
                            &events,
                            &x_path,
                            TimestampMethod::ReceiveTime,
                            start_time,
                            None,
                        );
                        self.full.x.extend(xs);
                        self.dirty = true;
                    }
                }
            }
            progress()?;

            for entry in &series {
                let Some(cursor) = self.cursors.get_mut(&entry.key) else {
                    done += 1;
                    continue;
                };
                if cursor.next_will_reset(blocks) {
                    tracing::debug!(series = %entry.key, "blocks replaced, resetting full data");
                    self.full.y.remove(&entry.key);
                }
                match cursor.next(blocks) {
                    None => done += 1,
                    Some(events) => {
                        let ys = extract_items(
                            &events,
                            &entry.parsed_path,
                            entry.timestamp_method,
                            start_time,
                            entry.math,
                        );
                        self.full.y.entry(entry.key.clone()).or_default().extend(ys);
                        self.dirty = true;
                    }
                }
                progress()?;
            }
            if done == series.len() + usize::from(self.x_cursor.is_some()) {
                return ControlFlow::Continue(());
            }
        }
    }

    fn viewport_datasets(&mut self, viewport: &Viewport) -> Option<Vec<Dataset>> {
        self.refresh();
        self.datasets.viewport_datasets(viewport)
    }

    fn csv_data(&mut self) -> Option<Vec<CsvDataset>> {
        self.refresh();
        self.datasets.csv_data()
    }

    fn x_range(&mut self) -> Option<Range> {
        self.refresh();
        self.datasets.x_range()
    }

    fn destroy(&mut self) {
        self.full.clear();
        self.current.clear();
        self.datasets.destroy();
    }
}

/// Builder for the current-custom X axis mode.
///
/// Pairs the values of the latest X message with the values of the latest
/// message of each series; nothing accumulates.
#[derive(Debug, Default)]
pub struct CurrentCustomDatasetsBuilder {
    x_path: Option<MessagePath>,
    latest_x: Vec<Datum>,
    latest_y: HashMap<SeriesKey, Vec<Datum>>,
    datasets: InlineDatasets,
}

impl CurrentCustomDatasetsBuilder {
    /// Builder pairing the latest `x_path` values with each series.
    pub fn new(x_path: Option<MessagePath>) -> Self {
        Self {
            x_path,
            ..Self::default()
        }
    }

    fn rebuild(&mut self) {
        let updates: Vec<_> = self
            .datasets
            .series()
            .iter()
            .map(|series| {
                let ys = self.latest_y.get(&series.key).map(Vec::as_slice).unwrap_or_default();
                (series.key.clone(), pair_samples(&self.latest_x, ys))
            })
            .collect();
        for (key, pairs) in updates {
            self.datasets.replace(&key, pairs);
        }
    }
}

impl DatasetsBuilder for CurrentCustomDatasetsBuilder {
    fn set_series(&mut self, series: &[SeriesConfig]) {
        self.latest_y
            .retain(|key, _| series.iter().any(|entry| &entry.key == key));
        self.datasets.set_series(series);
        self.rebuild();
    }

    fn handle_player_state(&mut self, state: &PlayerState) -> Option<Range> {
        let active = state.active_data.as_ref()?;
        let x_path = self.x_path.as_ref()?;
        if self.datasets.is_destroyed() {
            return None;
        }
        if let Some(event) = last_event_on(&active.messages, &x_path.topic_name) {
            self.latest_x = extract_indexed(event, x_path, None);
        }
        for series in self.datasets.series() {
            if let Some(event) = last_event_on(&active.messages, series.topic()) {
                let items = extract_indexed(event, &series.parsed_path, series.math);
                self.latest_y.insert(series.key.clone(), items);
            }
        }
        self.rebuild();
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
        self.latest_x.clear();
        self.latest_y.clear();
        self.datasets.destroy();
    }
}
