//! End-to-end shard graph construction

use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    paths,
    shard::{
        ShardDescriptor, ShardUpdate,
        common::{CommonPolicy, build_common_shards},
        dynamic::build_dynamic_shards,
        load_order::build_load_order,
        looks_like_file_name,
        repository::{MAIN_SHARD_NAME, ShardRepository},
        static_loader::build_static_loaders,
        tree_builder::{ShardTree, TreeBuilder},
    },
    splitter::Splitter,
    types::{FxIndexSet, Module, ModuleCache, ModuleId},
};

/// Build-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Output path of the main shard; other default paths are placed next to it
    pub main_dest: Option<String>,
    /// Stripped from module paths before hashing
    pub root_dir: String,
    pub hoist_dynamic_common: bool,
    /// Name of a dedicated shard receiving every common module, loaded first
    pub common_shard: Option<String>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            main_dest: None,
            root_dir: String::new(),
            hoist_dynamic_common: true,
            common_shard: None,
        }
    }
}

/// Everything the host bundler needs to emit the build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitResult {
    /// Shards producing an artifact, loaders included
    pub shards: Vec<ShardDescriptor>,
    /// Synthesized modules and modules whose dependencies were rewritten
    pub modules: Vec<Module>,
}

impl SplitResult {
    pub fn shard(&self, name: &str) -> Option<&ShardDescriptor> {
        self.shards.iter().find(|shard| shard.name == name)
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.iter().find(|module| module.id.as_str() == id)
    }
}

/// Partition the module graph reachable from `roots` into shards.
///
/// Fails only when the splitters form a static cycle between shards.
pub fn split_graph(
    cache: &ModuleCache,
    roots: &[ModuleId],
    splitters: &[Splitter],
    options: &SplitOptions,
) -> Result<SplitResult> {
    for root in roots.iter().filter(|root| !cache.contains_key(*root)) {
        warn!("Root module '{root}' is not in the module cache");
    }

    let ShardTree {
        mut repository,
        stats,
    } = TreeBuilder::new(cache, splitters, &options.root_dir)
        .build_tree(roots, options.main_dest.as_deref())?;

    let output_dir = options.main_dest.as_deref().map(paths::dirname);
    if let Some(dir) = output_dir {
        assign_implicit_dests(&mut repository, dir);
    }

    let common_shard = options
        .common_shard
        .as_deref()
        .map(|name| create_common_shard(&mut repository, name, output_dir));

    configure_load_orders(&mut repository, common_shard.as_deref());

    let candidates = common_candidates(&repository, common_shard.as_deref());
    let report = build_common_shards(
        &mut repository,
        common_shard.as_deref().unwrap_or(MAIN_SHARD_NAME),
        &candidates,
        &stats,
        CommonPolicy {
            hoist_dynamic_common: options.hoist_dynamic_common,
            hoist_all: common_shard.is_some(),
        },
    );
    debug!("{} common modules hoisted", report.hoisted.len());

    let modules = build_dynamic_shards(&mut repository, cache, &options.root_dir);
    let loaders = build_static_loaders(&mut repository);

    let shards: Vec<ShardDescriptor> = repository
        .get_all_shards()
        .filter(|shard| shard.has_output())
        .map(|shard| shard.to_descriptor())
        .collect();

    info!(
        "Split {} modules into {} shards ({} loaders, {} synthesized modules)",
        stats.len(),
        shards.len(),
        loaders.len(),
        modules.len()
    );

    Ok(SplitResult { shards, modules })
}

/// Implicit dynamic shards are written next to the main shard
fn assign_implicit_dests(repository: &mut ShardRepository, dir: &str) {
    let updates: Vec<ShardUpdate> = repository
        .get_all_shards()
        .filter(|shard| shard.is_dynamic && shard.is_implicit)
        .map(|shard| {
            let file = shard.dest.as_deref().unwrap_or(&shard.name);
            ShardUpdate::new(shard.name.as_str()).dest(Some(paths::join(dir, file)))
        })
        .collect();

    for update in updates {
        repository.set_shard(update);
    }
}

fn create_common_shard(repository: &mut ShardRepository, name: &str, dir: Option<&str>) -> String {
    let dest = dir
        .map(|dir| paths::join(dir, paths::basename(name)))
        .or_else(|| looks_like_file_name(name).then(|| name.to_owned()));

    debug!("Creating common shard '{name}'");
    repository.set_shard(ShardUpdate::new(name).dest(dest)).name.clone()
}

/// Root shards load their static dependency shards, the common shard first
fn configure_load_orders(repository: &mut ShardRepository, common_shard: Option<&str>) {
    let roots: Vec<(String, bool)> = repository
        .get_entry_shards()
        .into_iter()
        .map(|shard| (shard.name.clone(), shard.is_main))
        .collect();

    for (name, is_main) in roots {
        let order = build_load_order(&[name.as_str()], repository);
        let common = common_shard.filter(|_| is_main).map(str::to_owned);
        repository.set_load_order(&name, common.into_iter().chain(order));
    }
}

/// Every shard loaded by a root, in load order, plus the roots themselves
fn common_candidates(repository: &ShardRepository, common_shard: Option<&str>) -> Vec<String> {
    let mut candidates = FxIndexSet::default();
    for root in repository.get_entry_shards() {
        candidates.extend(
            root.load_order
                .iter()
                .filter(|name| Some(name.as_str()) != common_shard)
                .cloned(),
        );
        candidates.insert(root.name.clone());
    }
    candidates.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        hash::module_hash,
        matcher::{Matcher, Rule},
        types::{ModuleDep, module_cache},
    };

    fn modules(result: &SplitResult, shard: &str) -> Vec<String> {
        result
            .shard(shard)
            .map(|shard| shard.modules.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_implicit_shard_is_written_next_to_main() {
        let cache = module_cache([
            Module::new("a").with_dep(ModuleDep::dynamic("c")),
            Module::new("c").with_path("/app/src/c.js"),
        ]);
        let options = SplitOptions {
            main_dest: Some("dist/main.js".into()),
            root_dir: "/app".into(),
            ..SplitOptions::default()
        };

        let result = split_graph(&cache, &["a".into()], &[], &options).unwrap();

        let implicit = module_hash(&cache[&ModuleId::from("c")], "/app");
        let shard = result.shard(&implicit).unwrap();
        assert_eq!(shard.dest.as_deref(), Some(format!("dist/{implicit}").as_str()));
        assert_eq!(shard.entries, [ModuleId::from("c")]);
    }

    #[test]
    fn test_common_shard_is_loaded_first() {
        let cache = module_cache([
            Module::new("a")
                .with_dep(ModuleDep::new("vendor-lib"))
                .with_dep(ModuleDep::new("x")),
            Module::new("vendor-lib").with_dep(ModuleDep::new("x")),
            Module::new("x"),
        ]);
        let splitters = vec![
            Splitter::new(
                "vendor.js",
                Matcher::from_attributes([("id", Rule::literal("vendor-lib"))]),
            )
            .with_dest(Some("dist/vendor.js".into())),
        ];
        let options = SplitOptions {
            main_dest: Some("dist/main.js".into()),
            common_shard: Some("common-main.js".into()),
            ..SplitOptions::default()
        };

        let result = split_graph(&cache, &["a".into()], &splitters, &options).unwrap();

        assert_eq!(modules(&result, "common-main.js"), ["x"]);
        assert_eq!(modules(&result, "vendor.js"), ["vendor-lib"]);
        assert_eq!(modules(&result, "main"), ["a"]);

        let loader = result.shard("loader-main.js").unwrap();
        assert!(
            loader
                .content
                .as_deref()
                .unwrap()
                .ends_with(";load([\"./common-main.js\",\"./vendor.js\"]);\n})();")
        );
    }

    #[test]
    fn test_empty_shards_are_omitted() {
        let cache = module_cache([Module::new("a")]);
        let splitters = vec![Splitter::new(
            "unused",
            Matcher::from_attributes([("id", Rule::literal("nothing"))]),
        )];

        let result =
            split_graph(&cache, &["a".into()], &splitters, &SplitOptions::default()).unwrap();

        let names: Vec<&str> = result.shards.iter().map(|shard| shard.name.as_str()).collect();
        assert_eq!(names, ["main"]);
        assert!(result.modules.is_empty());
    }
}
