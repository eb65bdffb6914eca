//! Drains one shard's module queue, assigning modules and discovering split
//! points.

use std::collections::VecDeque;

use anyhow::Result;
use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{ShardUpdate, repository::ShardRepository};
use crate::{
    error::CircularReferenceError,
    hash::module_hash,
    splitter::{Splitter, find_splitter},
    types::{FxIndexMap, FxIndexSet, Module, ModuleCache, ModuleDep, ModuleId},
};

/// For every module placed so far, the shards it was kept in.
///
/// A module recorded under more than one shard is a common module.
pub type ModuleStats = FxIndexMap<ModuleId, FxIndexSet<String>>;

/// Queue item: a module and the module whose static dependency brought it in
type WorkItem = (ModuleId, Option<ModuleId>);

/// Assigns modules to shards one shard at a time.
///
/// The builder is stateful across shards: module stats are global to the
/// build, and every shard remembers which of its entries were already drained
/// so it can be revisited when another shard adds entries to it.
#[derive(Debug)]
pub struct NodeBuilder<'a> {
    cache: &'a ModuleCache,
    splitters: &'a [Splitter],
    root_dir: &'a str,
    stats: ModuleStats,
    drained: FxHashMap<String, FxHashSet<ModuleId>>,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(cache: &'a ModuleCache, splitters: &'a [Splitter], root_dir: &'a str) -> Self {
        Self {
            cache,
            splitters,
            root_dir,
            stats: ModuleStats::default(),
            drained: FxHashMap::default(),
        }
    }

    pub fn stats(&self) -> &ModuleStats {
        &self.stats
    }

    pub fn into_stats(self) -> ModuleStats {
        self.stats
    }

    /// Drain the pending entries of `shard_name`.
    ///
    /// Returns the names of shards that received new entries and therefore
    /// need to be drained themselves.
    pub fn build_node(
        &mut self,
        repository: &mut ShardRepository,
        shard_name: &str,
    ) -> Result<Vec<String>> {
        let Some(shard) = repository.get_shard(shard_name) else {
            return Ok(Vec::new());
        };

        let drained = self.drained.entry(shard_name.to_owned()).or_default();
        let mut worklist: VecDeque<WorkItem> = shard
            .entries
            .iter()
            .filter(|id| drained.insert((*id).clone()))
            .map(|id| (id.clone(), None))
            .collect();

        if worklist.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Building shard '{shard_name}' from {} pending entries",
            worklist.len()
        );

        let own_entries: FxHashSet<ModuleId> = shard.entries.iter().cloned().collect();
        let cache = self.cache;
        let splitters = self.splitters;
        let mut kept = Vec::new();
        let mut discovered = FxIndexSet::default();

        while let Some((id, referrer)) = worklist.pop_front() {
            let Some(module) = cache.get(&id) else {
                trace!("Module '{id}' is not in the module cache, skipping");
                continue;
            };

            if let Some(shards) = self.stats.get_mut(&id) {
                // Seen before: either already here, or a common module.
                if shards.insert(shard_name.to_owned()) {
                    trace!("Module '{id}' is shared with shard '{shard_name}'");
                    kept.push(id);
                    enqueue_static_deps(&mut worklist, module);
                }
                continue;
            }

            let split = if own_entries.contains(&id) {
                None
            } else {
                find_splitter(splitters, module).filter(|splitter| splitter.name != shard_name)
            };

            if let Some(splitter) = split {
                if self.split_module(repository, shard_name, module, referrer, splitter)? {
                    discovered.insert(splitter.name.clone());
                }
                continue;
            }

            self.stats.insert(
                id.clone(),
                std::iter::once(shard_name.to_owned()).collect(),
            );
            kept.push(id);
            enqueue_static_deps(&mut worklist, module);

            for dep in module.dynamic_deps() {
                if let Some(name) = self.link_dynamic(repository, shard_name, module, dep) {
                    discovered.insert(name);
                }
            }
        }

        repository.set_shard(ShardUpdate::new(shard_name).modules(kept));

        Ok(discovered.into_iter().collect())
    }

    /// Divert `module` into the shard of `splitter`.
    ///
    /// Returns whether the target shard gained a new entry.
    fn split_module(
        &self,
        repository: &mut ShardRepository,
        shard_name: &str,
        module: &Module,
        referrer: Option<ModuleId>,
        splitter: &Splitter,
    ) -> Result<bool> {
        if !splitter.dynamic && repository.static_ancestors(shard_name).contains(&splitter.name) {
            return Err(CircularReferenceError {
                from: shard_name.to_owned(),
                to: splitter.name.clone(),
            }
            .into());
        }

        let is_new = !has_entry(repository, &splitter.name, &module.id);
        if is_new {
            trace!(
                "Module '{}' splits from '{shard_name}' into '{}'",
                module.id, splitter.name
            );
        }

        let mut target = ShardUpdate::new(&splitter.name)
            .dest(splitter.dest.clone())
            .dynamic(splitter.dynamic)
            .entry(module.id.clone())
            .parent(shard_name);
        if splitter.dynamic {
            target = target.implicit(false);
            if let Some(referrer) = referrer {
                target = target.reference(referrer);
            }
        }

        repository.set_shard(target);
        repository.set_shard(ShardUpdate::new(shard_name).child(&splitter.name));

        Ok(is_new)
    }

    /// Create or reuse the dynamic shard loading `dep` on demand.
    ///
    /// Returns the shard name when it gained a new entry.
    fn link_dynamic(
        &self,
        repository: &mut ShardRepository,
        shard_name: &str,
        module: &Module,
        dep: &ModuleDep,
    ) -> Option<String> {
        let Some(target) = self.cache.get(&dep.id) else {
            trace!("Dynamic dependency '{}' is not in the module cache", dep.id);
            return None;
        };

        let mut update = match find_splitter(self.splitters, target) {
            Some(splitter) if splitter.dynamic => ShardUpdate::new(&splitter.name)
                .dest(splitter.dest.clone())
                .implicit(false),
            _ => ShardUpdate::new(module_hash(target, self.root_dir)).implicit(true),
        };

        if update.name == shard_name {
            return None;
        }

        let name = update.name.clone();
        let is_new = !has_entry(repository, &name, &dep.id);

        update = update
            .dynamic(true)
            .entry(dep.id.clone())
            .parent(shard_name)
            .reference(module.id.clone());

        repository.set_shard(update);
        repository.set_shard(ShardUpdate::new(shard_name).child(&name));

        is_new.then_some(name)
    }
}

fn enqueue_static_deps(worklist: &mut VecDeque<WorkItem>, module: &Module) {
    worklist.extend(
        module
            .static_deps()
            .map(|dep| (dep.id.clone(), Some(module.id.clone()))),
    );
}

fn has_entry(repository: &ShardRepository, shard_name: &str, id: &ModuleId) -> bool {
    repository
        .get_shard(shard_name)
        .is_some_and(|shard| shard.entries.contains(id))
}
