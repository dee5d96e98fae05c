use std::ops::Add;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::framework::{LocusWalker, TraversalError};
use crate::genomics::{
    AlleleTally, CallOutcome, CallSink, CallerConfig, CallerError, GenotypeCall, GenotypeCaller,
    LocusColumn, OutputMode,
};
use crate::plugin::AnalyzerPlugin;

/// Counters kept while calling genotypes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Loci reduced.
    pub loci: u64,
    /// Calls handed to the sink.
    pub emitted: u64,
    /// Calls withheld by the output mode.
    pub suppressed: u64,
    /// Sites with more than two alleles.
    pub no_calls: u64,
    /// Loci skipped for an ambiguous reference base.
    pub ambiguous: u64,
}

impl Add for CallStats {
    type Output = CallStats;

    fn add(self, rhs: CallStats) -> CallStats {
        CallStats {
            loci: self.loci + rhs.loci,
            emitted: self.emitted + rhs.emitted,
            suppressed: self.suppressed + rhs.suppressed,
            no_calls: self.no_calls + rhs.no_calls,
            ambiguous: self.ambiguous + rhs.ambiguous,
        }
    }
}

/// What the caller made of one locus.
#[derive(Debug, Clone, PartialEq)]
pub enum LocusCall {
    /// Reference base is not `ACGT`.
    Ambiguous,
    /// More alleles than a diploid call can hold.
    Unsupported {
        /// Distinct alleles observed.
        distinct_alleles: usize,
    },
    /// A genotype call, not yet checked against the output mode.
    Called(GenotypeCall),
}

/// Single-sample genotype caller walker.
///
/// Emitted calls go to the sink from `reduce`, so the walker is only driven
/// sequentially and writes calls in locus order.
#[derive(Debug)]
pub struct GenotypeCallerWalker<S: CallSink> {
    caller: GenotypeCaller,
    output_mode: OutputMode,
    sink: S,
}

impl<S: CallSink> GenotypeCallerWalker<S> {
    /// Build the walker; the input must hold exactly one sample.
    pub fn new(config: &CallerConfig, samples: &[Arc<str>], sink: S) -> Result<Self, CallerError> {
        let sample = match samples {
            [only] => Arc::clone(only),
            other => return Err(CallerError::SampleCount { found: other.len() }),
        };
        info!(
            sample = %sample,
            minimum_coverage = config.minimum_coverage,
            output_mode = %config.output_mode,
            "calling genotypes"
        );
        Ok(Self {
            caller: GenotypeCaller::new(sample, config.minimum_coverage),
            output_mode: config.output_mode,
            sink,
        })
    }

    /// Sample being called.
    pub fn sample(&self) -> &Arc<str> {
        self.caller.sample()
    }

    /// Destination of emitted calls.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Recover the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: CallSink> LocusWalker for GenotypeCallerWalker<S> {
    type Locus = LocusColumn;
    type MapResult = LocusCall;
    type ReduceType = CallStats;
    type Output = CallStats;

    fn map(&self, column: &LocusColumn) -> Result<LocusCall, TraversalError> {
        let Some(tally) = AlleleTally::from_column(column) else {
            debug!(
                locus = %column.locus,
                reference = %(column.reference_base as char),
                "skipping ambiguous reference"
            );
            return Ok(LocusCall::Ambiguous);
        };
        match self.caller.call(&tally)? {
            CallOutcome::Called(call) => Ok(LocusCall::Called(call)),
            CallOutcome::NoCall { distinct_alleles } => {
                warn!(
                    locus = %column.locus,
                    distinct_alleles,
                    "more than two alleles; site not called"
                );
                Ok(LocusCall::Unsupported { distinct_alleles })
            }
        }
    }

    fn reduce_init(&self) -> CallStats {
        CallStats::default()
    }

    fn reduce(&self, value: LocusCall, mut sum: CallStats) -> Result<CallStats, TraversalError> {
        sum.loci += 1;
        match value {
            LocusCall::Ambiguous => sum.ambiguous += 1,
            LocusCall::Unsupported { .. } => sum.no_calls += 1,
            LocusCall::Called(call) if self.output_mode.emit(&call) => {
                self.sink.emit(&call)?;
                sum.emitted += 1;
            }
            LocusCall::Called(_) => sum.suppressed += 1,
        }
        Ok(sum)
    }

    fn on_traversal_done(&self, sum: CallStats) -> Result<CallStats, TraversalError> {
        info!(
            loci = sum.loci,
            emitted = sum.emitted,
            suppressed = sum.suppressed,
            no_calls = sum.no_calls,
            ambiguous = sum.ambiguous,
            "genotype calling finished"
        );
        Ok(sum)
    }
}

impl<S: CallSink + 'static> AnalyzerPlugin for GenotypeCallerWalker<S> {
    const NAME: &'static str = "call";
    const DESCRIPTION: &'static str =
        "Single-sample diploid genotype calls with low-coverage and polymorphism filters.";
    const TREE_REDUCIBLE: bool = false;
}
