use std::collections::BTreeMap;

use crate::genomics::{ElementKind, Locus, LocusColumn, SeedInterval};

/// Histogram of indel event lengths observed at one locus.
///
/// Bin 0 counts insertion markers; bin `N > 0` counts reads inside a deletion
/// of length `N`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndelEvidenceHistogram {
    counts: BTreeMap<u32, u32>,
}

impl IndelEvidenceHistogram {
    /// Empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count deletion and insertion evidence in a column.
    pub fn from_column(column: &LocusColumn) -> Self {
        let mut histogram = Self::new();
        for element in &column.elements {
            match element.kind {
                ElementKind::Deletion { length } => histogram.record_deletion(length),
                ElementKind::Base(_) if element.before_insertion => histogram.record_insertion(),
                ElementKind::Base(_) => {}
            }
        }
        histogram
    }

    /// Count one read inside a deletion of `length` bases.
    pub fn record_deletion(&mut self, length: u32) {
        if length > 0 {
            *self.counts.entry(length).or_insert(0) += 1;
        }
    }

    /// Count one insertion marker.
    pub fn record_insertion(&mut self) {
        *self.counts.entry(0).or_insert(0) += 1;
    }

    /// Insertion markers observed.
    pub fn insertion_count(&self) -> u32 {
        self.counts.get(&0).copied().unwrap_or(0)
    }

    /// Observations for a deletion length.
    pub fn deletion_count(&self, length: u32) -> u32 {
        if length == 0 {
            return 0;
        }
        self.counts.get(&length).copied().unwrap_or(0)
    }

    /// `(length, count)` for every deletion bin, shortest first.
    pub fn deletions(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.counts.range(1..).map(|(&length, &count)| (length, count))
    }

    /// Whether no indel evidence was recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Configuration of the indel region walker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndelRegionConfig {
    /// Minimum reads supporting one indel length for the locus to be reported.
    pub minimum_count: u32,
    /// Bases added on both sides of every reported interval.
    pub indel_window: u32,
}

impl Default for IndelRegionConfig {
    fn default() -> Self {
        Self {
            minimum_count: 1,
            indel_window: 5,
        }
    }
}

impl IndelRegionConfig {
    /// Set minimum supporting count.
    pub fn with_minimum_count(mut self, minimum_count: u32) -> Self {
        self.minimum_count = minimum_count;
        self
    }

    /// Set padding window.
    pub fn with_indel_window(mut self, indel_window: u32) -> Self {
        self.indel_window = indel_window;
        self
    }
}

/// Turns per-locus indel evidence into an unpadded seed interval.
///
/// A deletion of length `N` seeds `[pos, pos + N - 1]`, the bases it removes
/// when the locus is its first deleted base. The longest deletion with enough
/// support wins; insertions are only considered when no deletion qualifies and
/// seed a zero-length interval after the locus.
#[derive(Debug, Clone)]
pub struct IndelRegionDetector {
    minimum_count: u32,
}

impl IndelRegionDetector {
    /// Create a detector with the given evidence threshold.
    pub fn new(minimum_count: u32) -> Self {
        Self { minimum_count }
    }

    /// Evidence threshold.
    pub fn minimum_count(&self) -> u32 {
        self.minimum_count
    }

    /// Seed interval for `locus`, if its evidence qualifies.
    pub fn detect(&self, histogram: &IndelEvidenceHistogram, locus: &Locus) -> Option<SeedInterval> {
        let longest_deletion = histogram
            .deletions()
            .filter(|&(_, count)| count >= self.minimum_count)
            .map(|(length, _)| length)
            .max();

        if let Some(length) = longest_deletion {
            return Some(SeedInterval::spanning(locus, length));
        }

        let insertions = histogram.insertion_count();
        if insertions > 0 && insertions >= self.minimum_count {
            return Some(SeedInterval::zero_length(locus));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::PileupElement;

    fn locus() -> Locus {
        Locus::new(0, "chr1", 100)
    }

    fn histogram(deletions: &[(u32, u32)], insertions: u32) -> IndelEvidenceHistogram {
        let mut histogram = IndelEvidenceHistogram::new();
        for &(length, count) in deletions {
            for _ in 0..count {
                histogram.record_deletion(length);
            }
        }
        for _ in 0..insertions {
            histogram.record_insertion();
        }
        histogram
    }

    #[test]
    fn histogram_from_column() {
        let column = LocusColumn::new(
            locus(),
            b'A',
            vec![
                PileupElement::deletion("s", 3),
                PileupElement::deletion("s", 3),
                PileupElement::deletion("s", 1),
                PileupElement::insertion("s", b'A'),
                PileupElement::base("s", b'A'),
            ],
        );
        let histogram = IndelEvidenceHistogram::from_column(&column);
        assert_eq!(histogram.deletion_count(3), 2);
        assert_eq!(histogram.deletion_count(1), 1);
        assert_eq!(histogram.insertion_count(), 1);
        assert_eq!(histogram.deletions().collect::<Vec<_>>(), vec![(1, 1), (3, 2)]);
    }

    #[test]
    fn deletion_seeds_length_minus_one_extension() {
        let seed = IndelRegionDetector::new(2)
            .detect(&histogram(&[(3, 2)], 0), &locus())
            .unwrap();
        assert_eq!((seed.start(), seed.end()), (100, 102));
        assert_eq!(seed.pad(5).to_string(), "chr1:95-107");
    }

    #[test]
    fn longest_qualifying_deletion_wins() {
        let detector = IndelRegionDetector::new(2);
        let seed = detector
            .detect(&histogram(&[(2, 5), (4, 2), (9, 1)], 0), &locus())
            .unwrap();
        assert_eq!(seed.end(), 103);
    }

    #[test]
    fn deletions_take_precedence_over_insertions() {
        let detector = IndelRegionDetector::new(1);
        let seed = detector.detect(&histogram(&[(1, 1)], 10), &locus()).unwrap();
        assert_eq!((seed.start(), seed.end()), (100, 100));
    }

    #[test]
    fn insertions_seed_zero_length_interval() {
        let detector = IndelRegionDetector::new(2);
        let seed = detector.detect(&histogram(&[(5, 1)], 2), &locus()).unwrap();
        assert_eq!(seed.length(), 0);
        assert_eq!((seed.start(), seed.end()), (101, 100));
    }

    #[test]
    fn weak_evidence_yields_nothing() {
        let detector = IndelRegionDetector::new(3);
        assert!(detector.detect(&histogram(&[(2, 2)], 2), &locus()).is_none());
        assert!(IndelRegionDetector::new(0)
            .detect(&IndelEvidenceHistogram::new(), &locus())
            .is_none());
    }
}
