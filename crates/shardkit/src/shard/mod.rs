//! Shards: the output partitions of a module graph
//!
//! A build creates shards on first reference and then only ever grows them
//! through [`ShardUpdate`] merges, so revisiting a shard with the same
//! information is harmless. The passes that follow tree building live in the
//! submodules, in the order the orchestrator runs them.

pub mod common;
pub mod dynamic;
pub mod load_order;
pub mod node_builder;
pub mod repository;
pub mod static_loader;
pub mod tree_builder;

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{FxIndexSet, ModuleId};

static FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+\.\w+$").expect("file name pattern is a valid regex"));

/// Whether a shard name can be used as its output path (`vendor.js`)
pub fn looks_like_file_name(name: &str) -> bool {
    FILE_NAME.is_match(name)
}

/// One output partition of the module graph and its edges in the shard graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shard {
    pub name: String,
    /// Output path; `None` when no file is emitted
    pub dest: Option<String>,
    /// Modules that are split points or roots of this shard
    pub entries: FxIndexSet<ModuleId>,
    /// Modules assigned to this shard
    pub modules: FxIndexSet<ModuleId>,
    /// Modules outside this shard depending on one of its entries
    pub references: FxIndexSet<ModuleId>,
    pub parents: FxIndexSet<String>,
    pub children: FxIndexSet<String>,
    /// Shards to load before this one, deepest dependency first
    pub load_order: FxIndexSet<String>,
    pub is_main: bool,
    pub is_dynamic: bool,
    /// Dynamic shard created for a dynamic import no splitter claimed
    pub is_implicit: bool,
    /// Literal artifact body for generated shards
    pub content: Option<String>,
}

impl Shard {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            dest: looks_like_file_name(&name).then(|| name.clone()),
            name,
            ..Self::default()
        }
    }

    /// Union set-valued fields, overwrite the scalars the update carries
    pub fn merge(&mut self, update: &ShardUpdate) {
        self.entries.extend(update.entries.iter().cloned());
        self.modules.extend(update.modules.iter().cloned());
        self.references.extend(update.references.iter().cloned());
        self.parents.extend(update.parents.iter().cloned());
        self.children.extend(update.children.iter().cloned());
        self.load_order.extend(update.load_order.iter().cloned());

        if let Some(dest) = &update.dest {
            self.dest.clone_from(dest);
        }
        if let Some(content) = &update.content {
            self.content.clone_from(content);
        }
        if let Some(is_main) = update.is_main {
            self.is_main = is_main;
        }
        if let Some(is_dynamic) = update.is_dynamic {
            self.is_dynamic = is_dynamic;
        }
        if let Some(is_implicit) = update.is_implicit {
            self.is_implicit = is_implicit;
        }
    }

    /// Whether the shard produces an artifact
    pub fn has_output(&self) -> bool {
        !self.modules.is_empty() || self.content.is_some()
    }

    /// Root shards get their own load order and loader
    pub fn is_root(&self) -> bool {
        self.is_main || self.is_dynamic
    }

    pub fn to_descriptor(&self) -> ShardDescriptor {
        ShardDescriptor {
            name: self.name.clone(),
            modules: self.modules.iter().cloned().collect(),
            entries: if self.is_root() {
                self.entries.iter().cloned().collect()
            } else {
                Vec::new()
            },
            dest: self.dest.clone(),
            content: self.content.clone(),
        }
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} entries, {} modules)",
            self.name,
            self.entries.len(),
            self.modules.len()
        )
    }
}

/// Partial shard applied with merge semantics.
///
/// Unset scalar fields leave the stored shard untouched; list fields are
/// unioned. Applying the same update twice is the same as applying it once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardUpdate {
    pub name: String,
    pub dest: Option<Option<String>>,
    pub entries: Vec<ModuleId>,
    pub modules: Vec<ModuleId>,
    pub references: Vec<ModuleId>,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub load_order: Vec<String>,
    pub is_main: Option<bool>,
    pub is_dynamic: Option<bool>,
    pub is_implicit: Option<bool>,
    pub content: Option<Option<String>>,
}

impl ShardUpdate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn dest(mut self, dest: Option<String>) -> Self {
        self.dest = Some(dest);
        self
    }

    #[must_use]
    pub fn entry(mut self, id: ModuleId) -> Self {
        self.entries.push(id);
        self
    }

    #[must_use]
    pub fn entries(mut self, ids: impl IntoIterator<Item = ModuleId>) -> Self {
        self.entries.extend(ids);
        self
    }

    #[must_use]
    pub fn module(mut self, id: ModuleId) -> Self {
        self.modules.push(id);
        self
    }

    #[must_use]
    pub fn modules(mut self, ids: impl IntoIterator<Item = ModuleId>) -> Self {
        self.modules.extend(ids);
        self
    }

    #[must_use]
    pub fn reference(mut self, id: ModuleId) -> Self {
        self.references.push(id);
        self
    }

    #[must_use]
    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parents.push(name.into());
        self
    }

    #[must_use]
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.children.push(name.into());
        self
    }

    #[must_use]
    pub fn load_order(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.load_order.extend(names);
        self
    }

    #[must_use]
    pub fn main(mut self, is_main: bool) -> Self {
        self.is_main = Some(is_main);
        self
    }

    #[must_use]
    pub fn dynamic(mut self, is_dynamic: bool) -> Self {
        self.is_dynamic = Some(is_dynamic);
        self
    }

    #[must_use]
    pub fn implicit(mut self, is_implicit: bool) -> Self {
        self.is_implicit = Some(is_implicit);
        self
    }

    #[must_use]
    pub fn content(mut self, content: Option<String>) -> Self {
        self.content = Some(content);
        self
    }
}

impl From<&Shard> for ShardUpdate {
    fn from(shard: &Shard) -> Self {
        Self {
            name: shard.name.clone(),
            dest: Some(shard.dest.clone()),
            entries: shard.entries.iter().cloned().collect(),
            modules: shard.modules.iter().cloned().collect(),
            references: shard.references.iter().cloned().collect(),
            parents: shard.parents.iter().cloned().collect(),
            children: shard.children.iter().cloned().collect(),
            load_order: shard.load_order.iter().cloned().collect(),
            is_main: Some(shard.is_main),
            is_dynamic: Some(shard.is_dynamic),
            is_implicit: Some(shard.is_implicit),
            content: Some(shard.content.clone()),
        }
    }
}

/// What the host bundler receives for each shard it has to serialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub name: String,
    pub modules: Vec<ModuleId>,
    /// Only populated for the main shard and dynamic shards
    pub entries: Vec<ModuleId>,
    pub dest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
