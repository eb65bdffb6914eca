//! Shared type definitions for the shardkit crate
//!
//! The module graph itself belongs to the host bundler. These types are the
//! read-only view of it that the shard engine works with, plus the hasher
//! aliases used for every ordered collection in the crate.

use std::{fmt, hash::BuildHasherDefault, path::Path};

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

/// Type alias for FxHasher-based IndexMap
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Type alias for FxHasher-based IndexSet
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Module cache handed over by the host bundler, keyed by module id
pub type ModuleCache = FxIndexMap<ModuleId, Module>;

/// Unique, stable identifier of a module in the host bundler's graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A dependency edge from one module to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDep {
    pub id: ModuleId,
    /// Specifier the dependency was required with
    #[serde(default)]
    pub name: String,
    /// Whether the dependency is loaded on demand (`import()`)
    #[serde(default)]
    pub dynamic: bool,
}

impl ModuleDep {
    pub fn new(id: impl Into<ModuleId>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            dynamic: false,
        }
    }

    pub fn dynamic(id: impl Into<ModuleId>) -> Self {
        Self {
            dynamic: true,
            ..Self::new(id)
        }
    }
}

/// A resolved module as seen by the shard engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Only set for modules synthesized by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub deps: Vec<ModuleDep>,
}

impl Module {
    /// Create a module whose name is its id
    pub fn new(id: impl Into<ModuleId>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            path: None,
            source: None,
            deps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_dep(mut self, dep: ModuleDep) -> Self {
        self.deps.push(dep);
        self
    }

    /// Dependencies that are bundled eagerly with the requiring module
    pub fn static_deps(&self) -> impl Iterator<Item = &ModuleDep> {
        self.deps.iter().filter(|dep| !dep.dynamic)
    }

    /// Dependencies loaded on demand
    pub fn dynamic_deps(&self) -> impl Iterator<Item = &ModuleDep> {
        self.deps.iter().filter(|dep| dep.dynamic)
    }

    /// Look up a matchable attribute by name.
    ///
    /// `filename` is derived from `path` (or the id when there is no path).
    /// Unknown attributes yield `None`, which never matches a rule.
    pub fn attribute(&self, attribute: &str) -> Option<&str> {
        match attribute {
            "id" => Some(self.id.as_str()),
            "name" => Some(&self.name),
            "path" => self.path.as_deref(),
            "filename" => Path::new(self.path.as_deref().unwrap_or(self.id.as_str()))
                .file_name()
                .and_then(|name| name.to_str()),
            _ => None,
        }
    }

    /// Copy of this module with every edge to `target` redirected to `replacement`
    #[must_use]
    pub fn with_dep_replaced(&self, target: &ModuleId, replacement: &ModuleDep) -> Self {
        let mut module = self.clone();
        for dep in &mut module.deps {
            if dep.id == *target {
                *dep = replacement.clone();
            }
        }
        module
    }
}

/// Build a module cache from a list of modules, keeping their order
pub fn module_cache(modules: impl IntoIterator<Item = Module>) -> ModuleCache {
    modules
        .into_iter()
        .map(|module| (module.id.clone(), module))
        .collect()
}
