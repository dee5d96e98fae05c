//! Locus traversal framework.
//!
//! Walkers describe a per-locus `map` step and an accumulation over its
//! results. The engine folds windows of loci independently and, for
//! tree-reducible walkers, combines the partial accumulations pairwise along a
//! balanced reduction tree, so the total never depends on how loci were
//! partitioned.

mod traversal;
mod walker;

pub use traversal::{
    TraversalConfig, TraversalEngine, TraversalError, TraversalResult, WindowContext,
};
pub use walker::{LocusWalker, TreeReducible};
