//! Analyzers ("walkers") built on the traversal framework, plus the
//! executor and registry the command line uses to run them.

mod api;
mod caller;
mod indel_regions;
mod masking;
mod registry;

pub use api::{AnalyzerPlugin, Batches, PluginExecutor};
pub use caller::{CallStats, GenotypeCallerWalker, LocusCall};
pub use indel_regions::{IndelRegions, IndelRegionWalker};
pub use masking::{MaskedSite, MaskingSummary, MaskingWalker};
pub use registry::{PluginInfo, WalkerRegistry};
