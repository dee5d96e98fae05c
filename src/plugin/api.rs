use std::sync::Arc;

use tracing::debug;

use crate::framework::{
    LocusWalker, TraversalConfig, TraversalEngine, TraversalError, TraversalResult, TreeReducible,
};

/// Trait implemented by analyzers that can be selected from the command line.
pub trait AnalyzerPlugin: LocusWalker + 'static {
    /// Unique analyzer name.
    const NAME: &'static str;
    /// Human-readable description.
    const DESCRIPTION: &'static str;
    /// Whether partial results may be combined in parallel.
    const TREE_REDUCIBLE: bool;
}

/// Groups a fallible stream of loci into owned batches.
///
/// An error discards the partially filled batch.
#[derive(Debug)]
pub struct Batches<I> {
    inner: I,
    batch_size: usize,
}

impl<I> Batches<I> {
    /// Batches of at most `batch_size` loci (at least one).
    pub fn new(inner: I, batch_size: usize) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
        }
    }
}

impl<I, T, E> Iterator for Batches<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<Vec<T>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.batch_size);
        for item in self.inner.by_ref() {
            match item {
                Ok(locus) => batch.push(locus),
                Err(err) => return Some(Err(err)),
            }
            if batch.len() == self.batch_size {
                break;
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}

/// Runs an analyzer over in-memory loci or over a stream of batches.
#[derive(Debug)]
pub struct PluginExecutor<P: AnalyzerPlugin> {
    plugin: Arc<P>,
    engine: TraversalEngine,
}

impl<P: AnalyzerPlugin> PluginExecutor<P> {
    /// Create a new executor for the supplied plugin.
    pub fn new(plugin: Arc<P>, config: TraversalConfig) -> Self {
        Self {
            plugin,
            engine: TraversalEngine::new(config),
        }
    }

    /// The analyzer being run.
    pub fn plugin(&self) -> &Arc<P> {
        &self.plugin
    }

    /// Sequentially traverse `loci`.
    pub fn run(&self, loci: &[P::Locus]) -> Result<TraversalResult<P::Output>, TraversalError> {
        self.engine.run(self.plugin.as_ref(), loci)
    }

    /// Sequentially traverse a stream of batches, continuing one accumulation.
    pub fn run_batches<I, E>(&self, batches: I) -> Result<TraversalResult<P::Output>, TraversalError>
    where
        I: IntoIterator<Item = Result<Vec<P::Locus>, E>>,
        TraversalError: From<E>,
    {
        let walker = self.plugin.as_ref();
        let mut sum = walker.reduce_init();
        let mut loci_visited = 0;
        for batch in batches {
            let batch = batch?;
            loci_visited += batch.len();
            sum = self.engine.fold(walker, &batch, sum)?;
            debug!(plugin = P::NAME, loci_visited, "batch reduced");
        }
        Ok(TraversalResult {
            output: walker.on_traversal_done(sum)?,
            loci_visited,
            windows: 1,
        })
    }
}

impl<P: AnalyzerPlugin + TreeReducible> PluginExecutor<P> {
    /// Traverse `loci` as a parallel tree-reduce.
    pub fn run_parallel(
        &self,
        loci: &[P::Locus],
    ) -> Result<TraversalResult<P::Output>, TraversalError> {
        self.engine.run_parallel(self.plugin.as_ref(), loci)
    }

    /// Tree-reduce each batch in parallel and combine the batch totals in order.
    pub fn run_batches_parallel<I, E>(
        &self,
        batches: I,
    ) -> Result<TraversalResult<P::Output>, TraversalError>
    where
        I: IntoIterator<Item = Result<Vec<P::Locus>, E>>,
        TraversalError: From<E>,
    {
        let walker = self.plugin.as_ref();
        let mut sum = walker.reduce_init();
        let mut loci_visited = 0;
        let mut windows = 0;
        for batch in batches {
            let batch = batch?;
            loci_visited += batch.len();
            windows += self.engine.config().num_windows(batch.len());
            let partial = self.engine.traverse_parallel(walker, &batch)?;
            sum = walker.tree_reduce(sum, partial);
            debug!(plugin = P::NAME, loci_visited, windows, "batch reduced");
        }
        Ok(TraversalResult {
            output: walker.on_traversal_done(sum)?,
            loci_visited,
            windows: windows.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_split_and_stop_on_error() {
        let items: Vec<Result<u32, String>> = vec![Ok(1), Ok(2), Err("boom".into()), Ok(4)];
        let mut batches = Batches::new(items.into_iter(), 2);
        assert_eq!(batches.next(), Some(Ok(vec![1, 2])));
        assert_eq!(batches.next(), Some(Err("boom".to_string())));
        assert_eq!(batches.next(), Some(Ok(vec![4])));
        assert_eq!(batches.next(), None);
    }

    #[test]
    fn zero_batch_size_still_makes_progress() {
        let items: Vec<Result<u32, String>> = vec![Ok(1), Ok(2)];
        assert_eq!(Batches::new(items.into_iter(), 0).count(), 2);
    }
}
