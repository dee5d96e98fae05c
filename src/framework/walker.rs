use super::TraversalError;

/// Per-locus analysis step plus the accumulation it feeds.
///
/// `map` runs once per locus and must not depend on any other locus. `reduce`
/// folds one map result into a running accumulation that starts from
/// `reduce_init`. The engine makes no promise about which loci share a running
/// accumulation, only that each locus is mapped and reduced exactly once.
pub trait LocusWalker: Send + Sync {
    /// Per-locus input handed over by the supplier.
    type Locus: Sync;
    /// Result of analysing one locus.
    type MapResult: Send;
    /// Running accumulation.
    type ReduceType: Send;
    /// Final output produced once traversal is complete.
    type Output;

    /// Analyse a single locus.
    fn map(&self, locus: &Self::Locus) -> Result<Self::MapResult, TraversalError>;

    /// Identity element of the accumulation.
    fn reduce_init(&self) -> Self::ReduceType;

    /// Fold one map result into the accumulation.
    fn reduce(
        &self,
        value: Self::MapResult,
        sum: Self::ReduceType,
    ) -> Result<Self::ReduceType, TraversalError>;

    /// Consume the total accumulation after every locus has been reduced.
    fn on_traversal_done(&self, sum: Self::ReduceType) -> Result<Self::Output, TraversalError>;
}

/// Walkers whose partial accumulations can be combined pairwise.
///
/// `tree_reduce` must be associative and `reduce_init` must be its identity,
/// so any grouping of the same loci yields the same total.
pub trait TreeReducible: LocusWalker {
    /// Combine two partial accumulations.
    fn tree_reduce(&self, lhs: Self::ReduceType, rhs: Self::ReduceType) -> Self::ReduceType;
}
