use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::genomics::Locus;

/// Interval anchored at the locus where indel evidence was found.
///
/// Coordinates are 1-based and closed. A zero-length interval (an insertion
/// between two reference bases) has `start == end + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedInterval {
    tid: u32,
    contig: Arc<str>,
    start: u32,
    end: u32,
}

impl SeedInterval {
    /// Interval covering `length` bases starting at the locus (`length >= 1`).
    pub fn spanning(locus: &Locus, length: u32) -> Self {
        debug_assert!(length > 0, "use zero_length for insertions");
        Self {
            tid: locus.tid,
            contig: Arc::clone(&locus.contig),
            start: locus.position,
            end: locus.position.saturating_add(length.saturating_sub(1)),
        }
    }

    /// Zero-length interval just after the locus.
    pub fn zero_length(locus: &Locus) -> Self {
        Self {
            tid: locus.tid,
            contig: Arc::clone(&locus.contig),
            start: locus.position + 1,
            end: locus.position,
        }
    }

    /// First covered position.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last covered position.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Contig name.
    pub fn contig(&self) -> &Arc<str> {
        &self.contig
    }

    /// Number of covered bases (0 for insertions).
    pub fn length(&self) -> u32 {
        (self.end + 1).saturating_sub(self.start)
    }

    /// Extend `window` bases on both sides; the start never drops below 1.
    pub fn pad(&self, window: u32) -> EmittedInterval {
        EmittedInterval {
            tid: self.tid,
            contig: Arc::clone(&self.contig),
            start: self.start.saturating_sub(window).max(1),
            end: self.end.saturating_add(window),
        }
    }
}

/// Padded interval as written to the output.
///
/// Ordering is by contig index, then start, then end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmittedInterval {
    /// Contig index in the sequence dictionary.
    pub tid: u32,
    /// Contig name.
    pub contig: Arc<str>,
    /// 1-based first position.
    pub start: u32,
    /// 1-based last position (inclusive).
    pub end: u32,
}

impl EmittedInterval {
    /// Construct an interval directly.
    pub fn new(tid: u32, contig: impl Into<Arc<str>>, start: u32, end: u32) -> Self {
        Self {
            tid,
            contig: contig.into(),
            start,
            end,
        }
    }

    /// Number of covered bases.
    pub fn length(&self) -> u32 {
        (self.end + 1).saturating_sub(self.start)
    }

    /// Whether `next` (sorted after `self`) overlaps or directly follows `self`.
    fn touches(&self, next: &EmittedInterval) -> bool {
        self.tid == next.tid && next.start <= self.end.saturating_add(1)
    }
}

impl fmt::Display for EmittedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

/// Sort and collapse overlapping or abutting intervals into a minimal cover.
pub fn merge_intervals(mut intervals: Vec<EmittedInterval>) -> Vec<EmittedInterval> {
    intervals.sort_unstable();
    let mut merged: Vec<EmittedInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(current) if current.touches(&interval) => {
                current.end = current.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Thread-safe collection of padded intervals.
///
/// All insertions and merges go through one lock. `combine` is set union, so
/// partial accumulators can be joined in any grouping and order; `finalize`
/// collapses the collection in place and is idempotent.
#[derive(Debug, Default)]
pub struct IntervalAccumulator {
    intervals: Mutex<Vec<EmittedInterval>>,
}

impl IntervalAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pad `seed` by `window` and add it.
    pub fn add(&self, seed: &SeedInterval, window: u32) {
        self.insert(seed.pad(window));
    }

    /// Add an already padded interval.
    pub fn insert(&self, interval: EmittedInterval) {
        self.intervals.lock().push(interval);
    }

    /// Move every interval of `other` into `self`.
    pub fn absorb(&self, other: IntervalAccumulator) {
        let incoming = other.intervals.into_inner();
        self.intervals.lock().extend(incoming);
    }

    /// Union of two accumulators.
    pub fn combine(self, other: IntervalAccumulator) -> IntervalAccumulator {
        self.absorb(other);
        self
    }

    /// Number of stored intervals (before or after finalization).
    pub fn len(&self) -> usize {
        self.intervals.lock().len()
    }

    /// Whether nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.intervals.lock().is_empty()
    }

    /// Deduplicate and merge, keep the merged set, and return it sorted.
    pub fn finalize(&self) -> Vec<EmittedInterval> {
        let mut guard = self.intervals.lock();
        let merged = merge_intervals(std::mem::take(&mut *guard));
        guard.clone_from(&merged);
        merged
    }
}

/// Immutable merged interval set with locus membership queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<EmittedInterval>,
}

impl IntervalSet {
    /// Build a set from arbitrary intervals.
    pub fn from_intervals(intervals: impl IntoIterator<Item = EmittedInterval>) -> Self {
        Self {
            intervals: merge_intervals(intervals.into_iter().collect()),
        }
    }

    /// Whether `locus` falls inside any interval.
    pub fn contains(&self, locus: &Locus) -> bool {
        let idx = self
            .intervals
            .partition_point(|iv| (iv.tid, iv.end) < (locus.tid, locus.position));
        self.intervals
            .get(idx)
            .map_or(false, |iv| iv.tid == locus.tid && iv.start <= locus.position)
    }

    /// Merged intervals in order.
    pub fn intervals(&self) -> &[EmittedInterval] {
        &self.intervals
    }

    /// Total number of covered bases.
    pub fn total_bp(&self) -> u64 {
        self.intervals.iter().map(|iv| iv.length() as u64).sum()
    }
}
