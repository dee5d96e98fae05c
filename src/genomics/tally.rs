use std::fmt;
use std::sync::Arc;

use crate::genomics::{Locus, LocusColumn};

const NUM_BASES: usize = 4; // A, C, G, T
const BASES: [u8; NUM_BASES] = [b'A', b'C', b'G', b'T'];

fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// A single base allele, flagged when it matches the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Allele {
    base: u8,
    is_reference: bool,
}

impl Allele {
    /// Reference allele for `base`.
    pub fn reference(base: u8) -> Self {
        Self {
            base: base.to_ascii_uppercase(),
            is_reference: true,
        }
    }

    /// Non-reference allele for `base`.
    pub fn alternate(base: u8) -> Self {
        Self {
            base: base.to_ascii_uppercase(),
            is_reference: false,
        }
    }

    /// Uppercase base value.
    pub fn base(&self) -> u8 {
        self.base
    }

    /// Whether this is the reference allele at its locus.
    pub fn is_reference(&self) -> bool {
        self.is_reference
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reference {
            write!(f, "{}*", self.base as char)
        } else {
            write!(f, "{}", self.base as char)
        }
    }
}

/// Per-locus base counts keyed by allele.
///
/// Only `ACGT` bases are tallied, so the sum of the counts is always the
/// depth. Every sample contributing an element to the column is remembered so
/// single-sample callers can reject mixed pileups.
#[derive(Debug, Clone, PartialEq)]
pub struct AlleleTally {
    locus: Locus,
    reference: Allele,
    reference_idx: usize,
    base_counts: [u32; NUM_BASES],
    depth: u32,
    samples: Vec<Arc<str>>,
}

impl AlleleTally {
    /// Empty tally at a locus; `None` when the reference base is ambiguous.
    pub fn new(locus: Locus, reference_base: u8) -> Option<Self> {
        let reference_idx = base_index(reference_base)?;
        Some(Self {
            locus,
            reference: Allele::reference(reference_base),
            reference_idx,
            base_counts: [0; NUM_BASES],
            depth: 0,
            samples: Vec::new(),
        })
    }

    /// Tally the base elements of a column; deletions only register their sample.
    pub fn from_column(column: &LocusColumn) -> Option<Self> {
        let mut tally = Self::new(column.locus.clone(), column.reference_base)?;
        for element in &column.elements {
            tally.record_sample(&element.sample);
            if let Some(base) = element.base_value() {
                tally.observe(base);
            }
        }
        Some(tally)
    }

    /// Count one observed base. Returns `false` for non-`ACGT` bases.
    pub fn observe(&mut self, base: u8) -> bool {
        match base_index(base) {
            Some(idx) => {
                self.base_counts[idx] += 1;
                self.depth += 1;
                true
            }
            None => false,
        }
    }

    /// Remember that `sample` contributed to this locus.
    pub fn record_sample(&mut self, sample: &Arc<str>) {
        if !self.samples.iter().any(|known| known == sample) {
            self.samples.push(Arc::clone(sample));
        }
    }

    /// Locus of the tally.
    pub fn locus(&self) -> &Locus {
        &self.locus
    }

    /// Reference allele at the locus.
    pub fn reference(&self) -> Allele {
        self.reference
    }

    /// Total tallied bases.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Samples seen at this locus, in order of first appearance.
    pub fn samples(&self) -> &[Arc<str>] {
        &self.samples
    }

    /// Observations of `allele` (0 if the reference flag does not match the locus).
    pub fn count(&self, allele: &Allele) -> u32 {
        match base_index(allele.base) {
            Some(idx) if (idx == self.reference_idx) == allele.is_reference => {
                self.base_counts[idx]
            }
            _ => 0,
        }
    }

    /// Observed alleles with their counts: reference first, then `A, C, G, T`.
    pub fn alleles(&self) -> Vec<(Allele, u32)> {
        let mut alleles = Vec::with_capacity(2);
        let ref_count = self.base_counts[self.reference_idx];
        if ref_count > 0 {
            alleles.push((self.reference, ref_count));
        }
        for (idx, &count) in self.base_counts.iter().enumerate() {
            if idx != self.reference_idx && count > 0 {
                alleles.push((Allele::alternate(BASES[idx]), count));
            }
        }
        alleles
    }

    /// Number of alleles with at least one observation.
    pub fn distinct_alleles(&self) -> usize {
        self.base_counts.iter().filter(|&&count| count > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::PileupElement;

    fn column(reference: u8, elements: Vec<PileupElement>) -> LocusColumn {
        LocusColumn::new(Locus::new(0, "chr1", 100), reference, elements)
    }

    #[test]
    fn tally_counts_bases_and_skips_deletions() {
        let tally = AlleleTally::from_column(&column(
            b'C',
            vec![
                PileupElement::base("s1", b'C'),
                PileupElement::base("s1", b'a'),
                PileupElement::deletion("s1", 2),
                PileupElement::base("s1", b'N'),
                PileupElement::base("s1", b'A'),
            ],
        ))
        .unwrap();

        assert_eq!(tally.depth(), 3);
        assert_eq!(tally.count(&Allele::reference(b'C')), 1);
        assert_eq!(tally.count(&Allele::alternate(b'A')), 2);
        assert_eq!(tally.count(&Allele::alternate(b'C')), 0);
        assert_eq!(
            tally.alleles(),
            vec![(Allele::reference(b'C'), 1), (Allele::alternate(b'A'), 2)]
        );
        let sum: u32 = tally.alleles().iter().map(|(_, count)| count).sum();
        assert_eq!(sum, tally.depth());
    }

    #[test]
    fn ambiguous_reference_has_no_tally() {
        assert!(AlleleTally::from_column(&column(b'N', Vec::new())).is_none());
    }

    #[test]
    fn samples_are_deduplicated() {
        let tally = AlleleTally::from_column(&column(
            b'G',
            vec![
                PileupElement::base("s1", b'G'),
                PileupElement::base("s2", b'G'),
                PileupElement::deletion("s1", 1),
            ],
        ))
        .unwrap();
        assert_eq!(tally.samples().len(), 2);
        assert_eq!(tally.distinct_alleles(), 1);
        assert_eq!(Allele::reference(b'g').to_string(), "G*");
    }
}
