//! # locuswalk
//!
//! Per-locus analyzers for aligned sequencing data, written against a small
//! map/reduce traversal contract.
//!
//! ## Core Idea
//!
//! 1. **Map**: every locus is analysed on its own (a genotype call, an indel
//!    seed interval, a masked site)
//! 2. **Reduce**: map results are folded into an explicit accumulation
//! 3. **Tree-reduce**: partial accumulations combine associatively, so windows
//!    of loci can be processed in parallel and joined in any grouping
//!
//! ## Usage Example
//!
//! ```ignore
//! use locuswalk::framework::TraversalEngine;
//! use locuswalk::genomics::IndelRegionConfig;
//! use locuswalk::plugin::IndelRegionWalker;
//!
//! let walker = IndelRegionWalker::new(&IndelRegionConfig::default());
//! let result = TraversalEngine::default().run_parallel(&walker, &columns)?;
//! for interval in &result.output.intervals {
//!     println!("{}", interval);
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod framework; // Traversal contract and engine
pub mod genomics;  // Tallies, callers, intervals, readers and writers
pub mod plugin;    // Analyzers and their registry

// Re-exports for convenience
pub use framework::{LocusWalker, TraversalConfig, TraversalEngine, TraversalError, TreeReducible};
pub use genomics::{GenotypeCall, GenotypeCaller, IntervalAccumulator, OutputMode};
pub use plugin::{GenotypeCallerWalker, IndelRegionWalker, MaskingWalker, WalkerRegistry};
