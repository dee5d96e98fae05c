use std::collections::BTreeMap;

use crate::genomics::VcfWriter;
use crate::plugin::{AnalyzerPlugin, GenotypeCallerWalker, IndelRegionWalker, MaskingWalker};

/// Metadata describing a registered analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Analyzer name, also its CLI subcommand.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Whether the analyzer runs as a parallel tree-reduce.
    pub tree_reducible: bool,
}

/// Registry of selectable analyzers.
#[derive(Debug, Default)]
pub struct WalkerRegistry {
    entries: BTreeMap<String, PluginInfo>,
}

impl WalkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every analyzer shipped with the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register::<GenotypeCallerWalker<VcfWriter<std::io::Stdout>>>();
        registry.register::<IndelRegionWalker>();
        registry.register::<MaskingWalker>();
        registry
    }

    /// Register an analyzer type; a later registration under the same name wins.
    pub fn register<P: AnalyzerPlugin>(&mut self) -> &PluginInfo {
        let info = PluginInfo {
            name: P::NAME.to_string(),
            description: P::DESCRIPTION.to_string(),
            tree_reducible: P::TREE_REDUCIBLE,
        };
        self.entries.insert(info.name.clone(), info);
        &self.entries[P::NAME]
    }

    /// Look up an analyzer by name.
    pub fn get(&self, name: &str) -> Option<&PluginInfo> {
        self.entries.get(name)
    }

    /// All analyzers sorted by name.
    pub fn list(&self) -> Vec<PluginInfo> {
        self.entries.values().cloned().collect()
    }
}
