//! Multi-level summaries and M4 decimation.
//!
//! Decimation keeps, per pixel column, the first, minimum, maximum, and last
//! sample. That preserves local extrema and the endpoints of the visible range,
//! so a decimated line is visually identical to the full one at that width.

use crate::datasource::SampleView;
use crate::extract::Datum;
use crate::view::Range;

/// Samples inside the requested range are returned unreduced when there are at
/// most this many per pixel column.
pub(crate) const POINTS_PER_PIXEL: usize = 4;

/// Extra samples kept outside each side of the requested range so lines reach
/// the plot edges.
pub(crate) const OVERSCAN_POINTS: usize = 1;

/// First/min/max/last envelope of a run of consecutive samples.
///
/// Indices are ordinals into the view or buffer the envelope was built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Envelope {
    first: usize,
    last: usize,
    min: usize,
    min_y: f64,
    max: usize,
    max_y: f64,
    x_range: Range,
}

impl Envelope {
    fn new(ordinal: usize, item: &Datum) -> Self {
        let finite = item.y.is_finite();
        Self {
            first: ordinal,
            last: ordinal,
            min: ordinal,
            min_y: if finite { item.y } else { f64::INFINITY },
            max: ordinal,
            max_y: if finite { item.y } else { f64::NEG_INFINITY },
            x_range: Range { min: item.x, max: item.x },
        }
    }

    fn push(&mut self, ordinal: usize, item: &Datum) {
        self.last = ordinal;
        self.x_range.min = self.x_range.min.min(item.x);
        self.x_range.max = self.x_range.max.max(item.x);
        if item.y < self.min_y {
            self.min = ordinal;
            self.min_y = item.y;
        }
        if item.y > self.max_y {
            self.max = ordinal;
            self.max_y = item.y;
        }
    }

    fn merge(a: Self, b: Self) -> Self {
        let (min, min_y) = if b.min_y < a.min_y {
            (b.min, b.min_y)
        } else {
            (a.min, a.min_y)
        };
        let (max, max_y) = if b.max_y > a.max_y {
            (b.max, b.max_y)
        } else {
            (a.max, a.max_y)
        };
        Self {
            first: a.first,
            last: b.last,
            min,
            min_y,
            max,
            max_y,
            x_range: Range::new(
                a.x_range.min.min(b.x_range.min),
                a.x_range.max.max(b.x_range.max),
            ),
        }
    }

    fn overlaps(&self, range: Range) -> bool {
        self.x_range.max >= range.min && self.x_range.min <= range.max
    }

    /// Push the envelope's distinct ordinals in sample order.
    fn push_ordered(&self, out: &mut Vec<usize>) {
        let mut ordinals = [self.first, self.min, self.max, self.last];
        ordinals.sort_unstable();
        for ordinal in ordinals {
            if out.last() != Some(&ordinal) {
                out.push(ordinal);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct SummaryLevel {
    chunk_size: usize,
    buckets: Vec<Envelope>,
}

/// Multi-level envelopes for append-only data.
///
/// Level `n` holds one envelope per `base_chunk << n` samples, so zoomed-out
/// views can be drawn from a level instead of scanning every sample.
#[derive(Debug, Clone)]
pub(crate) struct SummaryLevels {
    base_chunk: usize,
    levels: Vec<SummaryLevel>,
    partial: Option<(Envelope, usize)>,
}

impl SummaryLevels {
    pub(crate) fn new(base_chunk: usize) -> Self {
        Self {
            base_chunk: base_chunk.max(1),
            levels: Vec::new(),
            partial: None,
        }
    }

    pub(crate) fn base_chunk(&self) -> usize {
        self.base_chunk
    }

    pub(crate) fn clear(&mut self) {
        self.levels.clear();
        self.partial = None;
    }

    /// Push the sample at `ordinal`; ordinals must arrive consecutively.
    pub(crate) fn push(&mut self, ordinal: usize, item: &Datum) {
        match self.partial.as_mut() {
            None => self.partial = Some((Envelope::new(ordinal, item), 1)),
            Some((envelope, count)) => {
                envelope.push(ordinal, item);
                *count += 1;
            }
        }
        if let Some((envelope, count)) = self.partial
            && count >= self.base_chunk
        {
            self.partial = None;
            self.push_bucket(0, envelope);
        }
    }

    /// Collect envelopes covering every sample, at the coarsest level whose
    /// chunk is at least `target_chunk` (or the coarsest level available).
    ///
    /// Samples not yet merged into the chosen level are covered by the finer
    /// levels' trailing envelopes and the partial envelope.
    pub(crate) fn covering(&self, target_chunk: usize, out: &mut Vec<Envelope>) {
        out.clear();
        let Some(chosen) = self
            .levels
            .iter()
            .position(|level| level.chunk_size >= target_chunk.max(1))
            .or_else(|| self.levels.len().checked_sub(1))
        else {
            out.extend(self.partial.map(|(envelope, _)| envelope));
            return;
        };

        let level = &self.levels[chosen];
        out.extend_from_slice(&level.buckets);
        let mut covered = level.buckets.len() * level.chunk_size;
        for finer in self.levels[..chosen].iter().rev() {
            let start = covered / finer.chunk_size;
            if start < finer.buckets.len() {
                out.extend_from_slice(&finer.buckets[start..]);
            }
            covered = finer.buckets.len() * finer.chunk_size;
        }
        out.extend(self.partial.map(|(envelope, _)| envelope));
    }

    fn push_bucket(&mut self, level_index: usize, bucket: Envelope) {
        if self.levels.len() <= level_index {
            let chunk_size = self.base_chunk.saturating_mul(1 << level_index);
            self.levels.push(SummaryLevel {
                chunk_size,
                buckets: Vec::new(),
            });
        }
        let level = &mut self.levels[level_index];
        level.buckets.push(bucket);
        let len = level.buckets.len();
        if len % 2 == 0 {
            let merged = Envelope::merge(level.buckets[len - 2], level.buckets[len - 1]);
            self.push_bucket(level_index + 1, merged);
        }
    }
}

/// Reusable buffers for decimation.
#[derive(Debug, Default, Clone)]
pub(crate) struct DecimationScratch {
    buckets: Vec<Option<Envelope>>,
    envelopes: Vec<Envelope>,
    ordinals: Vec<usize>,
}

impl DecimationScratch {
    fn collect(&self, view: SampleView<'_>) -> Vec<Datum> {
        self.ordinals
            .iter()
            .map(|ordinal| view.get(*ordinal).clone())
            .collect()
    }
}

/// Reduce the samples of `view` inside `x_range` to a bounded, render-ready set.
///
/// At most [`POINTS_PER_PIXEL`] samples per pixel column are produced (plus the
/// overscan samples). `summary`, when given, must describe exactly the samples
/// of a monotonic `view` and is used for zoomed-out requests.
pub(crate) fn downsample(
    view: SampleView<'_>,
    monotonic: bool,
    summary: Option<&SummaryLevels>,
    x_range: Range,
    pixel_width: usize,
    scratch: &mut DecimationScratch,
) -> Vec<Datum> {
    scratch.ordinals.clear();
    if pixel_width == 0 || view.is_empty() {
        return Vec::new();
    }
    let budget = pixel_width.saturating_mul(POINTS_PER_PIXEL);

    if !monotonic {
        let inside = view
            .iter()
            .filter(|item| x_range.contains(item.x))
            .count();
        if inside <= budget {
            return view
                .iter()
                .filter(|item| x_range.contains(item.x))
                .cloned()
                .collect();
        }
        decimate_m4(view, 0..view.len(), x_range, pixel_width, scratch);
        return scratch.collect(view);
    }

    let inner = view.range_by_x(x_range, true);
    let start = inner.start.saturating_sub(OVERSCAN_POINTS);
    let end = inner.end.saturating_add(OVERSCAN_POINTS).min(view.len());
    if start >= end {
        return Vec::new();
    }
    if end - start <= budget {
        return (start..end).map(|ordinal| view.get(ordinal).clone()).collect();
    }

    let target_chunk = (inner.len() as f64 / pixel_width as f64).ceil() as usize;
    if let Some(summary) = summary
        && target_chunk >= summary.base_chunk()
    {
        summarized(summary, target_chunk, x_range, scratch);
        return scratch.collect(view);
    }

    let span = Range::new(view.get(start).x, view.get(end - 1).x);
    decimate_m4(view, start..end, span, pixel_width, scratch);
    scratch.collect(view)
}

fn summarized(
    summary: &SummaryLevels,
    target_chunk: usize,
    x_range: Range,
    scratch: &mut DecimationScratch,
) {
    let mut envelopes = std::mem::take(&mut scratch.envelopes);
    summary.covering(target_chunk, &mut envelopes);

    let first = envelopes.iter().position(|envelope| envelope.overlaps(x_range));
    let last = envelopes.iter().rposition(|envelope| envelope.overlaps(x_range));
    if let (Some(first), Some(last)) = (first, last) {
        let first = first.saturating_sub(OVERSCAN_POINTS);
        let last = (last + OVERSCAN_POINTS).min(envelopes.len() - 1);
        for envelope in &envelopes[first..=last] {
            envelope.push_ordered(&mut scratch.ordinals);
        }
    }
    scratch.envelopes = envelopes;
}

/// M4 decimation of `ordinals` of `view`, bucketing by X over `x_range`.
fn decimate_m4(
    view: SampleView<'_>,
    ordinals: std::ops::Range<usize>,
    x_range: Range,
    pixel_width: usize,
    scratch: &mut DecimationScratch,
) {
    scratch.ordinals.clear();
    scratch.buckets.clear();
    scratch.buckets.resize(pixel_width, None);

    let span = x_range.span();
    let width = pixel_width as f64;
    for ordinal in ordinals {
        let item = view.get(ordinal);
        if !item.x.is_finite() || !x_range.contains(item.x) {
            continue;
        }
        let index = if span > 0.0 {
            (((item.x - x_range.min) / span * width) as usize).min(pixel_width - 1)
        } else {
            0
        };
        match scratch.buckets[index].as_mut() {
            Some(bucket) => bucket.push(ordinal, item),
            None => scratch.buckets[index] = Some(Envelope::new(ordinal, item)),
        }
    }

    for bucket in scratch.buckets.iter().flatten() {
        bucket.push_ordered(&mut scratch.ordinals);
    }
    if !is_strictly_ascending(&scratch.ordinals) {
        scratch.ordinals.sort_unstable();
        scratch.ordinals.dedup();
    }
}

fn is_strictly_ascending(ordinals: &[usize]) -> bool {
    ordinals.windows(2).all(|pair| pair[0] < pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::datum;

    fn ramp(len: usize) -> Vec<Datum> {
        (0..len)
            .map(|i| datum(i as f64, ((i * 7919) % 101) as f64))
            .collect()
    }

    #[test]
    fn small_ranges_are_returned_verbatim() {
        let items = [datum(0.0, 1.0), datum(1.0, 2.0), datum(2.0, 3.0)];
        let mut scratch = DecimationScratch::default();
        let out = downsample(
            SampleView::from_slice(&items),
            true,
            None,
            Range::new(0.0, 2.0),
            100,
            &mut scratch,
        );
        assert_eq!(out, items.to_vec());
    }

    #[test]
    fn overscan_keeps_one_neighbour_each_side() {
        let items = ramp(10);
        let mut scratch = DecimationScratch::default();
        let out = downsample(
            SampleView::from_slice(&items),
            true,
            None,
            Range::new(3.5, 5.5),
            100,
            &mut scratch,
        );
        let xs: Vec<_> = out.iter().map(|item| item.x).collect();
        assert_eq!(xs, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn m4_preserves_extremes_and_endpoints() {
        let mut items = ramp(1000);
        items[500].y = 1e6;
        items[501].y = -1e6;
        let mut scratch = DecimationScratch::default();
        let out = downsample(
            SampleView::from_slice(&items),
            true,
            None,
            Range::new(0.0, 999.0),
            10,
            &mut scratch,
        );
        assert!(out.len() <= 40);
        assert_eq!(out.first(), items.first());
        assert_eq!(out.last(), items.last());
        assert!(out.iter().any(|item| item.y == 1e6));
        assert!(out.iter().any(|item| item.y == -1e6));
        assert!(out.windows(2).all(|pair| pair[0].x < pair[1].x));
    }

    #[test]
    fn summary_levels_cover_every_sample_once() {
        let items = ramp(75);
        let mut summary = SummaryLevels::new(4);
        for (ordinal, item) in items.iter().enumerate() {
            summary.push(ordinal, item);
        }
        let mut envelopes = Vec::new();
        summary.covering(16, &mut envelopes);
        let mut expected_first = 0;
        for envelope in &envelopes {
            assert_eq!(envelope.first, expected_first);
            expected_first = envelope.last + 1;
        }
        assert_eq!(expected_first, items.len());
    }

    #[test]
    fn summarized_path_preserves_endpoints() {
        let mut items = ramp(5000);
        items[1234].y = 999.0;
        let mut summary = SummaryLevels::new(8);
        for (ordinal, item) in items.iter().enumerate() {
            summary.push(ordinal, item);
        }
        let mut scratch = DecimationScratch::default();
        let out = downsample(
            SampleView::from_slice(&items),
            true,
            Some(&summary),
            Range::new(0.0, 4999.0),
            50,
            &mut scratch,
        );
        assert!(out.len() < items.len());
        assert_eq!(out.first(), items.first());
        assert_eq!(out.last(), items.last());
        assert!(out.iter().any(|item| item.y == 999.0));
    }

    #[test]
    fn non_monotonic_samples_are_filtered_by_range() {
        let items = [datum(3.0, 1.0), datum(1.0, 2.0), datum(9.0, 3.0), datum(2.0, 4.0)];
        let mut scratch = DecimationScratch::default();
        let out = downsample(
            SampleView::from_slice(&items),
            false,
            None,
            Range::new(0.0, 3.0),
            10,
            &mut scratch,
        );
        let xs: Vec<_> = out.iter().map(|item| item.x).collect();
        assert_eq!(xs, vec![3.0, 1.0, 2.0]);
    }
}
