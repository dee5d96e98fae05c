use std::error::Error;
use std::ops::Range;

use thiserror::Error;
use tracing::debug;

use super::{LocusWalker, TreeReducible};
use crate::genomics::{CallerError, InputError, IntervalWriteError, MaskError, SinkError};

/// Errors raised while driving a walker over loci.
#[derive(Debug, Error)]
pub enum TraversalError {
    /// Configuration invalid (e.g., zero window size).
    #[error("invalid traversal configuration: {0}")]
    InvalidConfiguration(String),

    /// Requested window index is out of range for the configured number of windows.
    #[error("window id {window_id} out of range (max {max_windows})")]
    WindowOutOfRange {
        /// Window identifier (1-indexed) that was requested.
        window_id: usize,
        /// Maximum valid window identifier.
        max_windows: usize,
    },

    /// Genotype caller precondition failed.
    #[error(transparent)]
    Caller(#[from] CallerError),

    /// Emitting a call failed.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Masking configuration or application failed.
    #[error(transparent)]
    Mask(#[from] MaskError),

    /// The locus supplier failed.
    #[error("locus supplier failed: {0}")]
    Supplier(#[from] InputError),

    /// Finalized intervals could not be written.
    #[error(transparent)]
    IntervalWrite(#[from] IntervalWriteError),

    /// Walker reported an error; aborts the traversal.
    #[error("walker error: {0}")]
    Walker(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl TraversalError {
    /// Helper for wrapping walker-originated errors.
    pub fn walker_failure(err: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        TraversalError::Walker(err.into())
    }
}

/// Configuration parameters for traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraversalConfig {
    /// Loci per leaf window of the reduction tree.
    pub window_size: usize,
    /// Loci buffered by a supplier before each traversal call.
    pub batch_size: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            batch_size: 65_536,
        }
    }
}

impl TraversalConfig {
    /// Construct configuration with explicit window size.
    pub fn with_window_size(window_size: usize) -> Result<Self, TraversalError> {
        if window_size == 0 {
            return Err(TraversalError::InvalidConfiguration(
                "window size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            window_size,
            ..Self::default()
        })
    }

    /// Set batch size (at least one locus).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Number of windows `W = ⌈n / w⌉` needed for `total_loci`.
    pub fn num_windows(&self, total_loci: usize) -> usize {
        (total_loci + self.window_size - 1) / self.window_size
    }

    /// Compute window context (start/end indices) for a given window id (1-indexed).
    pub fn window_context(
        &self,
        window_id: usize,
        total_loci: usize,
    ) -> Result<WindowContext, TraversalError> {
        let max_windows = self.num_windows(total_loci);
        if window_id == 0 || window_id > max_windows {
            return Err(TraversalError::WindowOutOfRange {
                window_id,
                max_windows,
            });
        }
        let start = (window_id - 1) * self.window_size;
        let end = (start + self.window_size).min(total_loci);
        Ok(WindowContext {
            window_id,
            range: start..end,
        })
    }
}

/// Per-window metadata.
#[derive(Debug, Clone)]
pub struct WindowContext {
    /// 1-indexed window identifier.
    pub window_id: usize,
    /// Range of loci covered by the window.
    pub range: Range<usize>,
}

impl WindowContext {
    /// Number of loci covered by this window.
    pub fn len(&self) -> usize {
        self.range.end.saturating_sub(self.range.start)
    }

    /// Whether the window covers no loci.
    pub fn is_empty(&self) -> bool {
        self.range.end <= self.range.start
    }
}

/// Inclusive run of 1-indexed window ids handled by one branch of the reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowSpan {
    first: usize,
    last: usize,
}

impl WindowSpan {
    /// Span over every window, or `None` when there are none.
    fn covering(num_windows: usize) -> Option<Self> {
        (num_windows > 0).then_some(Self {
            first: 1,
            last: num_windows,
        })
    }

    fn is_leaf(&self) -> bool {
        self.first == self.last
    }

    /// Midpoint split; the left half is never shorter than the right.
    fn split(&self) -> (Self, Self) {
        let mid = (self.first + self.last) / 2;
        (
            Self {
                first: self.first,
                last: mid,
            },
            Self {
                first: mid + 1,
                last: self.last,
            },
        )
    }

    /// Levels of `tree_reduce` above the deepest leaf.
    fn height(&self) -> usize {
        let mut span = *self;
        let mut height = 0;
        while !span.is_leaf() {
            span = span.split().0;
            height += 1;
        }
        height
    }
}

/// Result returned by a complete traversal.
#[derive(Debug)]
pub struct TraversalResult<O> {
    /// Output produced by `on_traversal_done`.
    pub output: O,
    /// Number of loci handed to `map`.
    pub loci_visited: usize,
    /// Number of leaf windows reduced (1 for sequential traversal).
    pub windows: usize,
}

/// Drives walkers over slices of loci.
#[derive(Debug, Clone, Default)]
pub struct TraversalEngine {
    config: TraversalConfig,
}

impl TraversalEngine {
    /// Create a new engine with the provided configuration.
    pub fn new(config: TraversalConfig) -> Self {
        Self { config }
    }

    /// Access configuration.
    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    /// Continue a running accumulation over `loci`, in order.
    pub fn fold<W: LocusWalker>(
        &self,
        walker: &W,
        loci: &[W::Locus],
        sum: W::ReduceType,
    ) -> Result<W::ReduceType, TraversalError> {
        loci.iter().try_fold(sum, |acc, locus| {
            let value = walker.map(locus)?;
            walker.reduce(value, acc)
        })
    }

    /// Sequentially map and reduce every locus from `reduce_init`.
    pub fn traverse<W: LocusWalker>(
        &self,
        walker: &W,
        loci: &[W::Locus],
    ) -> Result<W::ReduceType, TraversalError> {
        self.fold(walker, loci, walker.reduce_init())
    }

    /// Split `loci` into windows, reduce each window independently and
    /// combine the partial results along the reduction tree in parallel.
    pub fn traverse_parallel<W: TreeReducible>(
        &self,
        walker: &W,
        loci: &[W::Locus],
    ) -> Result<W::ReduceType, TraversalError> {
        let Some(root) = WindowSpan::covering(self.config.num_windows(loci.len())) else {
            return Ok(walker.reduce_init());
        };
        debug!(
            loci = loci.len(),
            windows = root.last,
            height = root.height(),
            "starting tree traversal"
        );
        self.evaluate_dfs(walker, root, loci)
    }

    /// Sequential traversal followed by `on_traversal_done`.
    pub fn run<W: LocusWalker>(
        &self,
        walker: &W,
        loci: &[W::Locus],
    ) -> Result<TraversalResult<W::Output>, TraversalError> {
        let sum = self.traverse(walker, loci)?;
        Ok(TraversalResult {
            output: walker.on_traversal_done(sum)?,
            loci_visited: loci.len(),
            windows: 1,
        })
    }

    /// Parallel traversal followed by `on_traversal_done`.
    pub fn run_parallel<W: TreeReducible>(
        &self,
        walker: &W,
        loci: &[W::Locus],
    ) -> Result<TraversalResult<W::Output>, TraversalError> {
        let sum = self.traverse_parallel(walker, loci)?;
        Ok(TraversalResult {
            output: walker.on_traversal_done(sum)?,
            loci_visited: loci.len(),
            windows: self.config.num_windows(loci.len()).max(1),
        })
    }

    fn evaluate_dfs<W: TreeReducible>(
        &self,
        walker: &W,
        span: WindowSpan,
        loci: &[W::Locus],
    ) -> Result<W::ReduceType, TraversalError> {
        if span.is_leaf() {
            let context = self.config.window_context(span.first, loci.len())?;
            return self.fold(walker, &loci[context.range], walker.reduce_init());
        }

        let (left, right) = span.split();
        let (left_summary, right_summary) = rayon::join(
            || self.evaluate_dfs(walker, left, loci),
            || self.evaluate_dfs(walker, right, loci),
        );

        Ok(walker.tree_reduce(left_summary?, right_summary?))
    }
}
