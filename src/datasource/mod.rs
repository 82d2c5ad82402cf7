//! Sample storage and down-sampling.
//!
//! The data layer is optimized for append-mostly workloads and fast range
//! queries over X. It underpins every dataset builder and the decimation that
//! keeps render cost independent of how much history has been accumulated.

mod store;
mod summary;

pub(crate) use store::SeriesStore;
pub(crate) use summary::{DecimationScratch, downsample};

use thiserror::Error;

use crate::extract::Datum;
use crate::view::{Bounds, Range};

/// Errors reported when appending samples.
///
/// Appends always succeed in storing the samples; the error only reports that
/// fast range slicing has been disabled for the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppendError {
    /// X values are not monotonic.
    #[error("appended samples are not in non-decreasing x order")]
    NonMonotonicX,
}

/// Append-only sample storage with incremental bounds tracking.
#[derive(Debug, Clone, Default)]
pub(crate) struct SampleBuffer {
    items: Vec<Datum>,
    monotonic: bool,
    bounds: Option<Bounds>,
}

impl SampleBuffer {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            monotonic: true,
            bounds: None,
        }
    }

    /// Build a buffer from samples in any order.
    #[cfg(test)]
    pub(crate) fn from_items<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Datum>,
    {
        let mut buffer = Self::new();
        let _ = buffer.extend(iter);
        buffer
    }

    /// Append multiple samples.
    pub(crate) fn extend<I>(&mut self, items: I) -> Result<usize, AppendError>
    where
        I: IntoIterator<Item = Datum>,
    {
        let items = items.into_iter();
        let (reserve, _) = items.size_hint();
        self.items.reserve(reserve);

        let start_len = self.items.len();
        let mut last_x = self.items.last().map(|item| item.x);
        let mut non_monotonic = false;
        for item in items {
            if let Some(last_x) = last_x
                && item.x < last_x
            {
                self.monotonic = false;
                non_monotonic = true;
            }
            last_x = Some(item.x);
            self.update_bounds(&item);
            self.items.push(item);
        }

        if non_monotonic {
            Err(AppendError::NonMonotonicX)
        } else {
            Ok(self.items.len() - start_len)
        }
    }

    /// Drop every sample.
    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.monotonic = true;
        self.bounds = None;
    }

    pub(crate) fn items(&self) -> &[Datum] {
        &self.items
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub(crate) fn is_monotonic(&self) -> bool {
        self.monotonic
    }

    /// Find the index range that intersects the X range.
    #[cfg(test)]
    pub(crate) fn range_by_x(&self, range: Range) -> std::ops::Range<usize> {
        SampleView::from_slice(&self.items).range_by_x(range, self.monotonic)
    }

    fn update_bounds(&mut self, item: &Datum) {
        if !item.x.is_finite() || !item.y.is_finite() {
            return;
        }
        match self.bounds.as_mut() {
            None => {
                self.bounds = Some(Bounds::new(
                    Range::new(item.x, item.x),
                    Range::new(item.y, item.y),
                ));
            }
            Some(bounds) => {
                bounds.x.expand_to_include(item.x);
                bounds.y.expand_to_include(item.y);
            }
        }
    }
}

/// A read-only, logically concatenated view over up to three sample runs.
///
/// Positions in the view are "ordinals"; decimation works on ordinals so the
/// same code serves a single buffer and a merged full/current series.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SampleView<'a> {
    parts: [&'a [Datum]; 3],
}

impl<'a> SampleView<'a> {
    pub(crate) fn from_slice(items: &'a [Datum]) -> Self {
        Self {
            parts: [items, &[], &[]],
        }
    }

    /// Merge preloaded and live samples, letting live samples win over the X
    /// span they cover.
    ///
    /// Both inputs must be monotonic; the result then is too.
    pub(crate) fn merged(full: &'a [Datum], current: &'a [Datum]) -> Self {
        let (Some(first), Some(last)) = (current.first(), current.last()) else {
            return Self::from_slice(full);
        };
        let before = lower_bound(Self::from_slice(full), first.x);
        let after = upper_bound(Self::from_slice(full), last.x).max(before);
        Self {
            parts: [&full[..before], current, &full[after..]],
        }
    }

    /// Concatenate two runs without any precedence.
    pub(crate) fn chained(first: &'a [Datum], second: &'a [Datum]) -> Self {
        Self {
            parts: [first, second, &[]],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.parts.iter().map(|part| part.len()).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get(&self, mut ordinal: usize) -> &'a Datum {
        for part in self.parts {
            if ordinal < part.len() {
                return &part[ordinal];
            }
            ordinal -= part.len();
        }
        panic!("sample ordinal out of bounds");
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &'a Datum> + 'a {
        let [a, b, c] = self.parts;
        a.iter().chain(b).chain(c)
    }

    /// Ordinals whose X lies inside `range`; every ordinal when not monotonic.
    pub(crate) fn range_by_x(&self, range: Range, monotonic: bool) -> std::ops::Range<usize> {
        if self.is_empty() {
            return 0..0;
        }
        if !monotonic {
            return 0..self.len();
        }
        let start = lower_bound(*self, range.min);
        let end = upper_bound(*self, range.max).max(start);
        start..end
    }
}

fn lower_bound(view: SampleView<'_>, target: f64) -> usize {
    let mut left = 0;
    let mut right = view.len();
    while left < right {
        let mid = (left + right) / 2;
        if view.get(mid).x < target {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    left
}

fn upper_bound(view: SampleView<'_>, target: f64) -> usize {
    let mut left = 0;
    let mut right = view.len();
    while left < right {
        let mid = (left + right) / 2;
        if view.get(mid).x <= target {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    left
}

#[cfg(test)]
pub(crate) fn datum(x: f64, y: f64) -> Datum {
    Datum {
        x,
        y,
        receive_time: crate::time::Time::from_seconds(x.max(0.0)),
        header_stamp: None,
        value: serde_json::Value::from(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xs(view: SampleView<'_>) -> Vec<f64> {
        view.iter().map(|item| item.x).collect()
    }

    #[test]
    fn explicit_range_uses_binary_search() {
        let buffer = SampleBuffer::from_items([
            datum(0.0, 1.0),
            datum(1.0, 2.0),
            datum(2.0, 3.0),
            datum(3.0, 4.0),
        ]);
        let range = buffer.range_by_x(Range::new(0.5, 2.5));
        let slice = &buffer.items()[range];
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[0].x, 1.0);
        assert_eq!(slice[1].x, 2.0);
    }

    #[test]
    fn non_monotonic_append_still_stores_batch() {
        let mut buffer = SampleBuffer::new();
        let _ = buffer.extend([datum(1.0, 1.0), datum(2.0, 2.0)]);
        let result = buffer.extend([datum(1.5, 3.0), datum(4.0, 4.0)]);

        assert_eq!(result, Err(AppendError::NonMonotonicX));
        assert_eq!(buffer.len(), 4);
        assert!(!buffer.is_monotonic());
        assert_eq!(buffer.range_by_x(Range::new(3.0, 3.5)), 0..4);
    }

    #[test]
    fn clear_restores_fresh_state() {
        let mut buffer = SampleBuffer::from_items([datum(2.0, 1.0), datum(1.0, 5.0)]);
        assert!(!buffer.is_monotonic());
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.is_monotonic());
        assert_eq!(buffer.bounds(), None);
    }

    #[test]
    fn bounds_skip_non_finite_values() {
        let buffer =
            SampleBuffer::from_items([datum(0.0, f64::NAN), datum(1.0, 2.0), datum(3.0, -1.0)]);
        let bounds = buffer.bounds().unwrap();
        assert_eq!(bounds.x, Range::new(1.0, 3.0));
        assert_eq!(bounds.y, Range::new(-1.0, 2.0));
    }

    #[test]
    fn merged_view_prefers_current_samples() {
        let full = [
            datum(0.0, 0.0),
            datum(1.0, 0.0),
            datum(2.0, 0.0),
            datum(3.0, 0.0),
            datum(4.0, 0.0),
        ];
        let current = [datum(1.5, 9.0), datum(2.0, 9.0), datum(3.0, 9.0)];
        let view = SampleView::merged(&full, &current);
        assert_eq!(xs(view), vec![0.0, 1.0, 1.5, 2.0, 3.0, 4.0]);
        assert_eq!(view.get(3).y, 9.0);
        assert_eq!(view.get(5).y, 0.0);
    }

    #[test]
    fn merged_view_with_current_past_full() {
        let full = [datum(0.0, 0.0), datum(1.0, 0.0)];
        let current = [datum(5.0, 1.0)];
        let view = SampleView::merged(&full, &current);
        assert_eq!(xs(view), vec![0.0, 1.0, 5.0]);
        assert_eq!(view.range_by_x(Range::new(0.5, 5.0), true), 1..3);
    }
}
