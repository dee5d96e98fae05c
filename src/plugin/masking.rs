use tracing::info;

use crate::framework::{LocusWalker, TraversalError, TreeReducible};
use crate::genomics::{GenotypeMasker, MissingGenotypes, SiteRecord};
use crate::plugin::AnalyzerPlugin;

/// Masked site and the genotypes it turned into no-calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedSite {
    /// Site to write, `None` when it was dropped.
    pub record: Option<SiteRecord>,
    /// Genotypes masked at this site.
    pub missing: MissingGenotypes,
}

/// Sites kept after masking plus per-sample missing counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskingSummary {
    /// Kept sites in input order.
    pub records: Vec<SiteRecord>,
    /// Masked genotypes per sample.
    pub missing: MissingGenotypes,
}

impl MaskingSummary {
    /// Concatenate `other` after `self` and add the tallies.
    pub fn combine(mut self, other: MaskingSummary) -> MaskingSummary {
        self.records.extend(other.records);
        self.missing = self.missing.combine(other.missing);
        self
    }
}

/// Sample-specific genotype masking over called sites.
#[derive(Debug)]
pub struct MaskingWalker {
    masker: GenotypeMasker,
}

impl MaskingWalker {
    /// Wrap a configured masker.
    pub fn new(masker: GenotypeMasker) -> Self {
        Self { masker }
    }

    /// The masker in use.
    pub fn masker(&self) -> &GenotypeMasker {
        &self.masker
    }
}

impl LocusWalker for MaskingWalker {
    type Locus = SiteRecord;
    type MapResult = MaskedSite;
    type ReduceType = MaskingSummary;
    type Output = MaskingSummary;

    fn map(&self, site: &SiteRecord) -> Result<MaskedSite, TraversalError> {
        let mut missing = MissingGenotypes::new();
        let record = self.masker.mask_site(site.clone(), &mut missing)?;
        Ok(MaskedSite { record, missing })
    }

    fn reduce_init(&self) -> MaskingSummary {
        MaskingSummary::default()
    }

    fn reduce(
        &self,
        value: MaskedSite,
        mut sum: MaskingSummary,
    ) -> Result<MaskingSummary, TraversalError> {
        sum.records.extend(value.record);
        sum.missing = sum.missing.combine(value.missing);
        Ok(sum)
    }

    fn on_traversal_done(&self, sum: MaskingSummary) -> Result<MaskingSummary, TraversalError> {
        info!(records = sum.records.len(), "records processed");
        for (sample, count) in sum.missing.iter() {
            info!(sample = %sample, missing = count, "genotypes called as missing");
        }
        Ok(sum)
    }
}

impl TreeReducible for MaskingWalker {
    fn tree_reduce(&self, lhs: MaskingSummary, rhs: MaskingSummary) -> MaskingSummary {
        lhs.combine(rhs)
    }
}

impl AnalyzerPlugin for MaskingWalker {
    const NAME: &'static str = "mask";
    const DESCRIPTION: &'static str =
        "Turn genotypes into no-calls inside (or outside) per-sample masks or below a depth.";
    const TREE_REDUCIBLE: bool = true;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::framework::{TraversalConfig, TraversalEngine};
    use crate::genomics::{EmittedInterval, IntervalSet, Locus, MaskingConfig, SampleGenotype};

    fn sites() -> Vec<SiteRecord> {
        (1..=20)
            .map(|position| {
                SiteRecord::new(
                    Locus::new(0, "chr1", position * 10),
                    "C",
                    vec!["T".to_string()],
                    vec![
                        SampleGenotype::called("s1", [0, 1], Some(position)),
                        SampleGenotype::called("s2", [1, 1], Some(10)),
                    ],
                )
            })
            .collect()
    }

    fn walker() -> MaskingWalker {
        let samples: Vec<Arc<str>> = vec![Arc::from("s1"), Arc::from("s2")];
        let mask = IntervalSet::from_intervals(vec![EmittedInterval::new(0, "chr1", 30, 100)]);
        let masker = GenotypeMasker::new(
            vec!["s2".to_string()],
            vec![mask],
            &samples,
            MaskingConfig::default().with_minimum_coverage(5),
        )
        .unwrap();
        MaskingWalker::new(masker)
    }

    #[test]
    fn masking_drops_all_missing_sites_and_counts() {
        let summary = TraversalEngine::default().run(&walker(), &sites()).unwrap().output;
        // s1 is below depth 5 at 10..40 and s2 is masked at 30..100.
        assert_eq!(summary.missing.get("s1"), 4);
        assert_eq!(summary.missing.get("s2"), 8);
        assert_eq!(summary.records.len(), 18);
        assert!(summary.records.iter().all(|r| r.locus.position != 30 && r.locus.position != 40));
    }

    #[test]
    fn parallel_masking_preserves_order() {
        let engine = TraversalEngine::new(TraversalConfig::with_window_size(3).unwrap());
        let sequential = engine.run(&walker(), &sites()).unwrap().output;
        let parallel = engine.run_parallel(&walker(), &sites()).unwrap().output;
        assert_eq!(sequential, parallel);
    }
}
