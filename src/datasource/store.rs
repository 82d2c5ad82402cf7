//! Series storage combining raw samples and summaries.

use crate::datasource::summary::{DecimationScratch, SummaryLevels, downsample};
use crate::datasource::{AppendError, SampleBuffer, SampleView};
use crate::extract::Datum;
use crate::view::{Bounds, Range};

const DEFAULT_BASE_CHUNK: usize = 64;

/// Append-only sample storage with summaries.
#[derive(Debug, Clone)]
pub(crate) struct SeriesStore {
    data: SampleBuffer,
    summary: SummaryLevels,
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesStore {
    pub(crate) fn new() -> Self {
        Self::with_base_chunk(DEFAULT_BASE_CHUNK)
    }

    pub(crate) fn with_base_chunk(base_chunk: usize) -> Self {
        Self {
            data: SampleBuffer::new(),
            summary: SummaryLevels::new(base_chunk),
        }
    }

    /// Append samples, keeping summaries in step.
    pub(crate) fn extend(&mut self, items: Vec<Datum>) -> Result<usize, AppendError> {
        if items.is_empty() {
            return Ok(0);
        }
        let start = self.data.len();
        let result = self.data.extend(items);
        for (offset, item) in self.data.items()[start..].iter().enumerate() {
            self.summary.push(start + offset, item);
        }
        result
    }

    /// Drop every sample.
    pub(crate) fn clear(&mut self) {
        if self.data.is_empty() {
            return;
        }
        self.data.clear();
        self.summary.clear();
    }

    pub(crate) fn items(&self) -> &[Datum] {
        self.data.items()
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn is_monotonic(&self) -> bool {
        self.data.is_monotonic()
    }

    pub(crate) fn bounds(&self) -> Option<Bounds> {
        self.data.bounds()
    }

    /// Down-sample the stored samples for an X range and pixel width.
    pub(crate) fn decimate(
        &self,
        x_range: Range,
        pixel_width: usize,
        scratch: &mut DecimationScratch,
    ) -> Vec<Datum> {
        let monotonic = self.data.is_monotonic();
        downsample(
            SampleView::from_slice(self.data.items()),
            monotonic,
            monotonic.then_some(&self.summary),
            x_range,
            pixel_width,
            scratch,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::datum;

    #[test]
    fn extend_tracks_bounds() {
        let mut store = SeriesStore::with_base_chunk(2);
        store.extend(vec![datum(0.0, 1.0), datum(1.0, -1.0)]).unwrap();
        assert_eq!(store.bounds().unwrap().y, Range::new(-1.0, 1.0));
        assert_eq!(store.extend(Vec::new()), Ok(0));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn clear_resets_summaries() {
        let mut store = SeriesStore::with_base_chunk(2);
        store
            .extend((0..64).map(|i| datum(i as f64, 1.0)).collect())
            .unwrap();
        store.clear();
        assert!(store.is_empty());
        store.extend(vec![datum(100.0, 3.0)]).unwrap();
        let mut scratch = DecimationScratch::default();
        let out = store.decimate(Range::new(0.0, 200.0), 1, &mut scratch);
        assert_eq!(out, vec![datum(100.0, 3.0)]);
    }

    #[test]
    fn decimate_uses_summaries_for_wide_views() {
        let mut store = SeriesStore::with_base_chunk(4);
        store
            .extend((0..4096).map(|i| datum(i as f64, (i % 17) as f64)).collect())
            .unwrap();
        let mut scratch = DecimationScratch::default();
        let out = store.decimate(Range::new(0.0, 4095.0), 16, &mut scratch);
        assert!(out.len() <= 16 * 4 + 8);
        assert_eq!(out.first().map(|item| item.x), Some(0.0));
        assert_eq!(out.last().map(|item| item.x), Some(4095.0));
    }
}
