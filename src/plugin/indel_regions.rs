use tracing::info;

use crate::framework::{LocusWalker, TraversalError, TreeReducible};
use crate::genomics::{
    EmittedInterval, IndelEvidenceHistogram, IndelRegionConfig, IndelRegionDetector,
    IntervalAccumulator, LocusColumn, SeedInterval,
};
use crate::plugin::AnalyzerPlugin;

/// Merged indel intervals and the evidence behind them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndelRegions {
    /// Padded, merged intervals sorted by contig index and start.
    pub intervals: Vec<EmittedInterval>,
    /// Loci that produced a seed interval.
    pub positions: u64,
    /// Bases covered by `intervals`.
    pub total_bp: u64,
}

/// Finds loci with enough indel evidence and collects padded intervals
/// around them.
///
/// Every reduce adds into one shared accumulator, so the running sum is just
/// the number of contributing positions. Running the walker twice keeps
/// adding to the same accumulator.
#[derive(Debug)]
pub struct IndelRegionWalker {
    detector: IndelRegionDetector,
    indel_window: u32,
    accumulator: IntervalAccumulator,
}

impl IndelRegionWalker {
    /// Build the walker from its configuration.
    pub fn new(config: &IndelRegionConfig) -> Self {
        Self {
            detector: IndelRegionDetector::new(config.minimum_count),
            indel_window: config.indel_window,
            accumulator: IntervalAccumulator::new(),
        }
    }

    /// Intervals collected so far.
    pub fn accumulator(&self) -> &IntervalAccumulator {
        &self.accumulator
    }
}

impl LocusWalker for IndelRegionWalker {
    type Locus = LocusColumn;
    type MapResult = Option<SeedInterval>;
    type ReduceType = u64;
    type Output = IndelRegions;

    fn map(&self, column: &LocusColumn) -> Result<Option<SeedInterval>, TraversalError> {
        let histogram = IndelEvidenceHistogram::from_column(column);
        if histogram.is_empty() {
            return Ok(None);
        }
        Ok(self.detector.detect(&histogram, &column.locus))
    }

    fn reduce_init(&self) -> u64 {
        0
    }

    fn reduce(&self, value: Option<SeedInterval>, sum: u64) -> Result<u64, TraversalError> {
        match value {
            Some(seed) => {
                self.accumulator.add(&seed, self.indel_window);
                Ok(sum + 1)
            }
            None => Ok(sum),
        }
    }

    fn on_traversal_done(&self, positions: u64) -> Result<IndelRegions, TraversalError> {
        let intervals = self.accumulator.finalize();
        let total_bp = intervals.iter().map(|iv| iv.length() as u64).sum();
        info!(
            positions,
            intervals = intervals.len(),
            total_bp,
            "indel regions finalized"
        );
        Ok(IndelRegions {
            intervals,
            positions,
            total_bp,
        })
    }
}

impl TreeReducible for IndelRegionWalker {
    fn tree_reduce(&self, lhs: u64, rhs: u64) -> u64 {
        lhs + rhs
    }
}

impl AnalyzerPlugin for IndelRegionWalker {
    const NAME: &'static str = "indel-regions";
    const DESCRIPTION: &'static str =
        "Padded, merged intervals around loci with deletion or insertion evidence.";
    const TREE_REDUCIBLE: bool = true;
}
