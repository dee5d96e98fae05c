use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::genomics::{Allele, AlleleTally, Locus};

/// Reason a call failed one of the quality rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterLabel {
    /// Depth below the configured minimum coverage.
    LowCoverage,
    /// Two distinct alleles observed at the site.
    Polymorphic,
}

impl FilterLabel {
    /// Identifier used in the VCF FILTER column.
    pub fn vcf_id(&self) -> &'static str {
        match self {
            FilterLabel::LowCoverage => "LowCov",
            FilterLabel::Polymorphic => "Poly",
        }
    }
}

impl fmt::Display for FilterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.vcf_id())
    }
}

/// Which calls are handed to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OutputMode {
    /// Only informative calls with an empty filter set.
    #[default]
    ConfidentVariants,
    /// Every call, filtered and no-information ones included.
    AllSites,
}

impl OutputMode {
    /// Whether `call` should be written under this mode.
    pub fn emit(&self, call: &GenotypeCall) -> bool {
        match self {
            OutputMode::ConfidentVariants => call.is_informative() && call.filters().is_empty(),
            OutputMode::AllSites => true,
        }
    }

    /// Command-line spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::ConfidentVariants => "confident-variants",
            OutputMode::AllSites => "all-sites",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "confident-variants" | "confident" => Ok(OutputMode::ConfidentVariants),
            "all-sites" | "all" => Ok(OutputMode::AllSites),
            other => Err(format!(
                "unknown output mode '{}' (expected confident-variants or all-sites)",
                other
            )),
        }
    }
}

/// Single-sample diploid genotype call at one locus.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeCall {
    sample: Arc<str>,
    locus: Locus,
    reference: Allele,
    depth: u32,
    alleles: Option<[Allele; 2]>,
    allele_depths: Option<[u32; 2]>,
    filters: BTreeSet<FilterLabel>,
}

impl GenotypeCall {
    /// Sample the call belongs to.
    pub fn sample(&self) -> &Arc<str> {
        &self.sample
    }

    /// Position of the call.
    pub fn locus(&self) -> &Locus {
        &self.locus
    }

    /// Reference allele at the locus.
    pub fn reference(&self) -> Allele {
        self.reference
    }

    /// Total tallied depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Called allele pair; `None` for a no-information call.
    pub fn alleles(&self) -> Option<[Allele; 2]> {
        self.alleles
    }

    /// `[refCount, firstAltCount]` for informative calls.
    pub fn allele_depths(&self) -> Option<[u32; 2]> {
        self.allele_depths
    }

    /// Filters the call failed; empty means it passes.
    pub fn filters(&self) -> &BTreeSet<FilterLabel> {
        &self.filters
    }

    /// Whether any allele was called.
    pub fn is_informative(&self) -> bool {
        self.alleles.is_some()
    }

    /// Whether both called alleles are the same.
    pub fn is_homozygous(&self) -> bool {
        matches!(self.alleles, Some([a, b]) if a == b)
    }
}

/// Result of calling one tally.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// A call was produced (possibly a no-information one).
    Called(GenotypeCall),
    /// More than two alleles observed; the diploid model cannot represent the site.
    NoCall {
        /// Number of distinct alleles observed.
        distinct_alleles: usize,
    },
}

/// Errors raised by the genotype caller.
#[derive(Debug, Error)]
pub enum CallerError {
    /// Input does not contain exactly one sample.
    #[error("genotype calling only works with single-sample input, found {found} samples")]
    SampleCount {
        /// Samples present in the input.
        found: usize,
    },

    /// A pileup mixed reads from more than one sample.
    #[error("pileup at {locus} should be sample specific, found {samples} samples")]
    MultipleSamples {
        /// Offending locus.
        locus: Locus,
        /// Number of samples in the pileup.
        samples: usize,
    },

    /// A pileup came from a sample other than the one being called.
    #[error("pileup at {locus} belongs to sample {found}, expected {expected}")]
    SampleMismatch {
        /// Offending locus.
        locus: Locus,
        /// Sample the caller was configured for.
        expected: Arc<str>,
        /// Sample found in the pileup.
        found: Arc<str>,
    },

    /// Positive depth but no tallied allele.
    #[error("no alleles tallied at {locus} despite depth {depth}")]
    InconsistentTally {
        /// Offending locus.
        locus: Locus,
        /// Reported depth.
        depth: u32,
    },
}

/// Configuration of the genotype calling walker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallerConfig {
    /// Depth below which calls get `LowCoverage`.
    pub minimum_coverage: u32,
    /// Minimum base quality for a base to enter the pileup (applied by the supplier).
    pub minimum_base_quality: u8,
    /// Minimum mapping quality for a read to enter the pileup (applied by the supplier).
    pub minimum_mapping_quality: u8,
    /// Emission policy.
    pub output_mode: OutputMode,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            minimum_coverage: 1,
            minimum_base_quality: 1,
            minimum_mapping_quality: 1,
            output_mode: OutputMode::default(),
        }
    }
}

impl CallerConfig {
    /// Set minimum coverage.
    pub fn with_minimum_coverage(mut self, minimum_coverage: u32) -> Self {
        self.minimum_coverage = minimum_coverage;
        self
    }

    /// Set base and mapping quality thresholds.
    pub fn with_qualities(mut self, base_quality: u8, mapping_quality: u8) -> Self {
        self.minimum_base_quality = base_quality;
        self.minimum_mapping_quality = mapping_quality;
        self
    }

    /// Set output mode.
    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }
}

/// Deterministic single-sample diploid genotype caller.
#[derive(Debug, Clone)]
pub struct GenotypeCaller {
    sample: Arc<str>,
    minimum_coverage: u32,
}

impl GenotypeCaller {
    /// Create a caller for `sample`.
    pub fn new(sample: impl Into<Arc<str>>, minimum_coverage: u32) -> Self {
        Self {
            sample: sample.into(),
            minimum_coverage,
        }
    }

    /// Sample being called.
    pub fn sample(&self) -> &Arc<str> {
        &self.sample
    }

    /// Call the genotype for a tally.
    pub fn call(&self, tally: &AlleleTally) -> Result<CallOutcome, CallerError> {
        match tally.samples() {
            [] => {}
            [only] if *only == self.sample => {}
            [only] => {
                return Err(CallerError::SampleMismatch {
                    locus: tally.locus().clone(),
                    expected: Arc::clone(&self.sample),
                    found: Arc::clone(only),
                })
            }
            many => {
                return Err(CallerError::MultipleSamples {
                    locus: tally.locus().clone(),
                    samples: many.len(),
                })
            }
        }

        let depth = tally.depth();
        let reference = tally.reference();
        let mut filters = BTreeSet::new();
        let mut call = GenotypeCall {
            sample: Arc::clone(&self.sample),
            locus: tally.locus().clone(),
            reference,
            depth,
            alleles: None,
            allele_depths: None,
            filters: BTreeSet::new(),
        };

        if depth == 0 {
            return Ok(CallOutcome::Called(call));
        }
        if depth < self.minimum_coverage {
            filters.insert(FilterLabel::LowCoverage);
        }

        let observed = tally.alleles();
        let alleles = match observed.as_slice() {
            [] => {
                return Err(CallerError::InconsistentTally {
                    locus: call.locus,
                    depth,
                })
            }
            [(only, _)] => [*only, *only],
            [(first, _), (second, _)] => {
                filters.insert(FilterLabel::Polymorphic);
                [*first, *second]
            }
            more => {
                return Ok(CallOutcome::NoCall {
                    distinct_alleles: more.len(),
                })
            }
        };

        let ref_count = tally.count(&reference);
        let alt_count = observed
            .iter()
            .find(|(allele, _)| !allele.is_reference())
            .map(|(_, count)| *count)
            .unwrap_or(0);

        call.alleles = Some(alleles);
        call.allele_depths = Some([ref_count, alt_count]);
        call.filters = filters;
        Ok(CallOutcome::Called(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{LocusColumn, PileupElement};
    use test_case::test_case;

    fn tally(reference: u8, bases: &[(u8, usize)]) -> AlleleTally {
        let elements = bases
            .iter()
            .flat_map(|&(base, n)| std::iter::repeat(base).take(n))
            .map(|base| PileupElement::base("ancient", base))
            .collect();
        let column = LocusColumn::new(Locus::new(0, "chr1", 100), reference, elements);
        AlleleTally::from_column(&column).expect("known reference")
    }

    fn called(outcome: CallOutcome) -> GenotypeCall {
        match outcome {
            CallOutcome::Called(call) => call,
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn zero_depth_gives_no_information_call() {
        let caller = GenotypeCaller::new("ancient", 3);
        let call = called(caller.call(&tally(b'C', &[])).unwrap());
        assert!(!call.is_informative());
        assert!(call.filters().is_empty());
        assert_eq!(call.depth(), 0);
        assert_eq!(call.allele_depths(), None);
    }

    #[test]
    fn homozygous_alternate_call() {
        let caller = GenotypeCaller::new("ancient", 2);
        let call = called(caller.call(&tally(b'C', &[(b'A', 5)])).unwrap());
        assert_eq!(call.alleles(), Some([Allele::alternate(b'A'); 2]));
        assert!(call.is_homozygous());
        assert_eq!(call.depth(), 5);
        assert!(call.filters().is_empty());
        assert_eq!(call.allele_depths(), Some([0, 5]));
    }

    #[test]
    fn homozygous_reference_has_zero_alt_depth() {
        let caller = GenotypeCaller::new("ancient", 1);
        let call = called(caller.call(&tally(b'G', &[(b'G', 4)])).unwrap());
        assert_eq!(call.alleles(), Some([Allele::reference(b'G'); 2]));
        assert_eq!(call.allele_depths(), Some([4, 0]));
    }

    #[test_case(&[(b'T', 2)], 5, &[FilterLabel::LowCoverage] ; "low coverage homozygous")]
    #[test_case(&[(b'T', 2), (b'A', 3)], 1, &[FilterLabel::Polymorphic] ; "polymorphic")]
    #[test_case(&[(b'T', 1), (b'A', 1)], 3, &[FilterLabel::LowCoverage, FilterLabel::Polymorphic] ; "both filters")]
    #[test_case(&[(b'T', 6)], 6, &[] ; "depth equal to minimum")]
    fn filters_follow_thresholds(bases: &[(u8, usize)], min_cov: u32, expected: &[FilterLabel]) {
        let caller = GenotypeCaller::new("ancient", min_cov);
        let call = called(caller.call(&tally(b'T', bases)).unwrap());
        let filters: Vec<_> = call.filters().iter().copied().collect();
        assert_eq!(filters, expected);
    }

    #[test]
    fn heterozygous_depths_report_reference_then_first_alt() {
        let caller = GenotypeCaller::new("ancient", 1);
        let call = called(caller.call(&tally(b'C', &[(b'T', 2), (b'C', 7)])).unwrap());
        assert_eq!(
            call.alleles(),
            Some([Allele::reference(b'C'), Allele::alternate(b'T')])
        );
        assert_eq!(call.allele_depths(), Some([7, 2]));

        let call = called(caller.call(&tally(b'C', &[(b'G', 2), (b'A', 3)])).unwrap());
        assert_eq!(
            call.alleles(),
            Some([Allele::alternate(b'A'), Allele::alternate(b'G')])
        );
        assert_eq!(call.allele_depths(), Some([0, 3]));
    }

    #[test]
    fn triallelic_site_is_not_called() {
        let caller = GenotypeCaller::new("ancient", 1);
        let outcome = caller
            .call(&tally(b'C', &[(b'A', 2), (b'C', 2), (b'T', 1)]))
            .unwrap();
        assert_eq!(outcome, CallOutcome::NoCall { distinct_alleles: 3 });
    }

    #[test]
    fn mixed_samples_are_rejected() {
        let column = LocusColumn::new(
            Locus::new(0, "chr1", 5),
            b'A',
            vec![PileupElement::base("s1", b'A'), PileupElement::base("s2", b'A')],
        );
        let tally = AlleleTally::from_column(&column).unwrap();
        let err = GenotypeCaller::new("s1", 1).call(&tally).unwrap_err();
        assert!(matches!(err, CallerError::MultipleSamples { samples: 2, .. }));

        let single = LocusColumn::new(Locus::new(0, "chr1", 5), b'A', vec![PileupElement::base("s2", b'A')]);
        let err = GenotypeCaller::new("s1", 1)
            .call(&AlleleTally::from_column(&single).unwrap())
            .unwrap_err();
        assert!(matches!(err, CallerError::SampleMismatch { .. }));
    }

    #[test]
    fn output_mode_gates_emission() {
        let caller = GenotypeCaller::new("ancient", 10);
        let low = called(caller.call(&tally(b'A', &[(b'A', 3)])).unwrap());
        let empty = called(caller.call(&tally(b'A', &[])).unwrap());
        let good = called(GenotypeCaller::new("ancient", 1).call(&tally(b'A', &[(b'A', 3)])).unwrap());

        assert!(!OutputMode::ConfidentVariants.emit(&low));
        assert!(!OutputMode::ConfidentVariants.emit(&empty));
        assert!(OutputMode::ConfidentVariants.emit(&good));
        assert!(OutputMode::AllSites.emit(&low));
        assert!(OutputMode::AllSites.emit(&empty));
        assert_eq!(OutputMode::default(), OutputMode::ConfidentVariants);
    }

    #[test]
    fn output_mode_parses_cli_spellings() {
        assert_eq!("all-sites".parse::<OutputMode>(), Ok(OutputMode::AllSites));
        assert_eq!("CONFIDENT_VARIANTS".parse::<OutputMode>(), Ok(OutputMode::ConfidentVariants));
        assert!("everything".parse::<OutputMode>().is_err());
    }
}
