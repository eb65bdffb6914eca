//! JSON module graph handed over by the host bundler

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{Module, ModuleCache, ModuleId, module_cache};

/// Root module ids plus every module reachable from them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGraph {
    pub roots: Vec<ModuleId>,
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl ModuleGraph {
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("Failed to parse module graph")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read module graph: {}", path.display()))?;
        Self::from_json_str(&source)
            .with_context(|| format!("Invalid module graph: {}", path.display()))
    }

    /// Split into roots and a module cache. Modules without a name are named
    /// after their id.
    pub fn into_cache(self) -> (Vec<ModuleId>, ModuleCache) {
        let modules = self.modules.into_iter().map(|mut module| {
            if module.name.is_empty() {
                module.name = module.id.to_string();
            }
            module
        });
        (self.roots, module_cache(modules))
    }
}
