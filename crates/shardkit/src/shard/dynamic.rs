//! Loader shims for dynamically imported modules
//!
//! A dynamic import of `m` is redirected to a small synthesized module that
//! fetches every shard `m` needs and only then requires `m`. The shim and the
//! runtime loader it relies on are plain modules placed in the earliest
//! loading shard that requests them, so the host bundler emits each of them
//! exactly once like any other module.

use log::{debug, trace};

use super::{Shard, ShardUpdate, load_order::build_load_order, repository::ShardRepository};
use crate::{
    hash::module_hash,
    paths,
    types::{FxIndexMap, FxIndexSet, Module, ModuleCache, ModuleDep, ModuleId},
};

/// Module id of the runtime loader every shim requires
pub const DYNAMIC_LOADER_ID: &str = "$dl$";

const DYNAMIC_LOADER_SOURCE: &str = include_str!("../../assets/dynamic_loader.js");

/// The runtime module resolving a list of shard urls to a promise
pub fn dynamic_loader_module() -> Module {
    Module {
        source: Some(DYNAMIC_LOADER_SOURCE.to_owned()),
        ..Module::new(DYNAMIC_LOADER_ID)
    }
}

/// A shim waiting for its placement
#[derive(Debug)]
struct PendingShim<'a> {
    target: &'a Module,
    dynamic: String,
    /// Root shard that first reached the dynamic shard
    root: String,
    /// Shards holding a module that requests the shim
    holders: FxIndexSet<String>,
}

/// Inject loader shims for every dynamic shard reachable from a root shard.
///
/// Every module referencing a dynamic entry gets its dependency rewritten to
/// the shim, wherever the common pass left it. Each shim goes to the earliest
/// loading shard holding one of its requesters (or to the root reaching the
/// dynamic shard when none is held), and the runtime loader to the earliest
/// shard receiving a shim. Returns the shims, the rewritten requesters and
/// the runtime loader when at least one shim was placed.
pub fn build_dynamic_shards(
    repository: &mut ShardRepository,
    cache: &ModuleCache,
    root_dir: &str,
) -> Vec<Module> {
    let order = loading_order(repository);
    let mut rewritten: FxIndexMap<ModuleId, Module> = FxIndexMap::default();
    let shims = plan_shims(repository, cache, root_dir, &order, &mut rewritten);

    let mut output: FxIndexMap<ModuleId, Module> = FxIndexMap::default();
    let mut placements: FxIndexMap<String, FxIndexSet<ModuleId>> = FxIndexMap::default();

    for (shim_id, shim) in shims {
        let holder = shim
            .holders
            .iter()
            .min_by_key(|holder| rank(&order, holder))
            .cloned()
            .unwrap_or(shim.root);
        let from_dir = output_dir(repository, &holder).to_owned();
        let shard_paths = shard_paths(repository, &shim.dynamic, &from_dir);

        trace!("Placing loader shim '{shim_id}' in shard '{holder}'");
        output.insert(
            shim_id.clone(),
            shim_module(shim.target, shim_id.clone(), &shard_paths),
        );
        placements.entry(holder).or_default().insert(shim_id);
    }
    output.extend(rewritten);

    placements.sort_by(|left, _, right, _| rank(&order, left).cmp(&rank(&order, right)));
    let mut loader_placed = false;
    for (holder, shims) in placements {
        let mut update = ShardUpdate::new(holder.as_str()).modules(shims);
        if !loader_placed {
            debug!("Placing dynamic loader in shard '{holder}'");
            update = update.module(ModuleId::from(DYNAMIC_LOADER_ID));
            loader_placed = true;
        }
        repository.set_shard(update);
    }

    if loader_placed {
        let loader = dynamic_loader_module();
        output.insert(loader.id.clone(), loader);
    }

    debug!("Dynamic shard pass produced {} modules", output.len());

    output.into_values().collect()
}

/// One pending shim per dynamic entry, rewriting its requesters on the way
fn plan_shims<'a>(
    repository: &ShardRepository,
    cache: &'a ModuleCache,
    root_dir: &str,
    order: &FxIndexSet<String>,
    rewritten: &mut FxIndexMap<ModuleId, Module>,
) -> FxIndexMap<ModuleId, PendingShim<'a>> {
    let mut shims: FxIndexMap<ModuleId, PendingShim<'a>> = FxIndexMap::default();

    for root in repository.get_entry_shards() {
        for dynamic in repository.get_shards(reachable_dynamic_shards(repository, &root.name)) {
            for entry in &dynamic.entries {
                let Some(module) = cache.get(entry) else {
                    trace!("Dynamic entry '{entry}' is not in the module cache");
                    continue;
                };

                let shim_id = ModuleId::from(module_hash(module, root_dir));
                let replacement = ModuleDep {
                    id: shim_id.clone(),
                    name: module.name.clone(),
                    dynamic: false,
                };
                let holders = rewrite_references(
                    repository,
                    cache,
                    order,
                    dynamic,
                    entry,
                    &replacement,
                    rewritten,
                );

                shims
                    .entry(shim_id)
                    .or_insert_with(|| PendingShim {
                        target: module,
                        dynamic: dynamic.name.clone(),
                        root: root.name.clone(),
                        holders: FxIndexSet::default(),
                    })
                    .holders
                    .extend(holders);
            }
        }
    }

    shims
}

/// Point every reference of `dynamic` that depends on `entry` at the shim.
///
/// Returns the shards holding a rewritten module.
fn rewrite_references(
    repository: &ShardRepository,
    cache: &ModuleCache,
    order: &FxIndexSet<String>,
    dynamic: &Shard,
    entry: &ModuleId,
    replacement: &ModuleDep,
    rewritten: &mut FxIndexMap<ModuleId, Module>,
) -> Vec<String> {
    let mut holders = Vec::new();

    for reference in &dynamic.references {
        let Some(referrer) = rewritten.get(reference).or_else(|| cache.get(reference)) else {
            continue;
        };
        if !referrer
            .deps
            .iter()
            .any(|dep| dep.id == *entry || dep.id == replacement.id)
        {
            continue;
        }

        let referrer = referrer.with_dep_replaced(entry, replacement);
        rewritten.insert(reference.clone(), referrer);

        match holder_of(repository, order, reference) {
            Some(holder) => holders.push(holder),
            None => trace!("Module '{reference}' is not held by any shard"),
        }
    }

    holders
}

/// Every shard in loading order: each root's load order followed by the root,
/// main first
fn loading_order(repository: &ShardRepository) -> FxIndexSet<String> {
    let mut order = FxIndexSet::default();
    for root in repository.get_entry_shards() {
        order.extend(root.load_order.iter().cloned());
        order.extend(build_load_order(&[root.name.as_str()], repository));
        order.insert(root.name.clone());
    }
    order
}

fn rank(order: &FxIndexSet<String>, name: &str) -> usize {
    order.get_index_of(name).unwrap_or(usize::MAX)
}

/// Shard holding `module`, earliest loading first
fn holder_of(
    repository: &ShardRepository,
    order: &FxIndexSet<String>,
    module: &ModuleId,
) -> Option<String> {
    repository
        .get_all_shards()
        .filter(|shard| shard.modules.contains(module))
        .min_by_key(|shard| rank(order, &shard.name))
        .map(|shard| shard.name.clone())
}

fn output_dir<'a>(repository: &'a ShardRepository, name: &str) -> &'a str {
    repository
        .get_shard(name)
        .and_then(|shard| shard.dest.as_deref())
        .map_or(".", paths::dirname)
}

/// Dynamic shards loaded from `root` or from any shard it loads statically
fn reachable_dynamic_shards(repository: &ShardRepository, root: &str) -> Vec<String> {
    let mut visited = FxIndexSet::default();
    visited.insert(root.to_owned());
    let mut dynamic = FxIndexSet::default();

    let mut index = 0;
    while let Some(name) = visited.get_index(index).cloned() {
        index += 1;
        let Some(shard) = repository.get_shard(&name) else {
            continue;
        };
        for child in repository.get_shards(&shard.children) {
            if child.is_dynamic {
                dynamic.insert(child.name.clone());
            } else {
                visited.insert(child.name.clone());
            }
        }
    }

    dynamic.into_iter().collect()
}

/// Quoted urls of the shards to fetch before `dynamic_name` can run, relative
/// to `from_dir`
fn shard_paths(repository: &ShardRepository, dynamic_name: &str, from_dir: &str) -> Vec<String> {
    build_load_order(&[dynamic_name], repository)
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(dynamic_name))
        .filter_map(|name| repository.get_shard(name))
        .filter(|shard| shard.has_output())
        .filter_map(|shard| shard.dest.as_deref())
        .map(|dest| format!("\"./{}\"", paths::relative(from_dir, dest)))
        .collect()
}

fn shim_module(module: &Module, id: ModuleId, shard_paths: &[String]) -> Module {
    let source = format!(
        "module.exports = require(\"{DYNAMIC_LOADER_ID}\")([{}])\
         .then(function() {{ return require(\"{}\"); }});",
        shard_paths.join(","),
        module.name
    );

    Module {
        id,
        name: module.name.clone(),
        path: None,
        source: Some(source),
        deps: vec![
            ModuleDep::new(DYNAMIC_LOADER_ID),
            ModuleDep {
                id: module.id.clone(),
                name: module.name.clone(),
                dynamic: true,
            },
        ],
    }
}
