use std::collections::VecDeque;

use anyhow::Result;
use log::{debug, info};
use rustc_hash::FxHashSet;

use super::{
    ShardUpdate,
    node_builder::{ModuleStats, NodeBuilder},
    repository::{MAIN_SHARD_NAME, ShardRepository},
};
use crate::{
    splitter::Splitter,
    types::{ModuleCache, ModuleId},
};

/// Result of tree building: every discovered shard plus per-module membership
#[derive(Debug)]
pub struct ShardTree {
    pub repository: ShardRepository,
    pub stats: ModuleStats,
}

/// Builds the shard graph breadth first, starting at the main shard
#[derive(Debug)]
pub struct TreeBuilder<'a> {
    cache: &'a ModuleCache,
    splitters: &'a [Splitter],
    root_dir: &'a str,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(cache: &'a ModuleCache, splitters: &'a [Splitter], root_dir: &'a str) -> Self {
        Self {
            cache,
            splitters,
            root_dir,
        }
    }

    pub fn build_tree(&self, roots: &[ModuleId], main_dest: Option<&str>) -> Result<ShardTree> {
        let mut repository = ShardRepository::new();
        let mut main = ShardUpdate::new(MAIN_SHARD_NAME)
            .main(true)
            .entries(roots.iter().cloned());
        if let Some(dest) = main_dest {
            main = main.dest(Some(dest.to_owned()));
        }
        repository.set_shard(main);

        let mut node_builder = NodeBuilder::new(self.cache, self.splitters, self.root_dir);
        let mut queue = VecDeque::from([MAIN_SHARD_NAME.to_owned()]);
        let mut queued: FxHashSet<String> = queue.iter().cloned().collect();

        while let Some(shard_name) = queue.pop_front() {
            queued.remove(&shard_name);

            for discovered in node_builder.build_node(&mut repository, &shard_name)? {
                if queued.insert(discovered.clone()) {
                    debug!("Queueing shard '{discovered}' discovered from '{shard_name}'");
                    queue.push_back(discovered);
                }
            }
        }

        info!(
            "Built shard tree with {} shards from {} root modules",
            repository.len(),
            roots.len()
        );

        Ok(ShardTree {
            repository,
            stats: node_builder.into_stats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        matcher::{Matcher, Rule},
        types::{Module, ModuleDep, module_cache},
    };

    fn names(tree: &ShardTree) -> Vec<&str> {
        tree.repository
            .get_all_shards()
            .map(|shard| shard.name.as_str())
            .collect()
    }

    #[test]
    fn test_main_shard_only() {
        let cache = module_cache([
            Module::new("a").with_dep(ModuleDep::new("b")),
            Module::new("b"),
        ]);

        let tree = TreeBuilder::new(&cache, &[], "")
            .build_tree(&["a".into()], Some("dist/main.js"))
            .unwrap();

        assert_eq!(names(&tree), ["main"]);
        let main = tree.repository.get_main_shard().unwrap();
        assert!(main.is_main);
        assert_eq!(main.dest.as_deref(), Some("dist/main.js"));
        assert_eq!(main.modules.len(), 2);
    }

    #[test]
    fn test_split_shards_are_drained() {
        let cache = module_cache([
            Module::new("a").with_dep(ModuleDep::new("react")),
            Module::new("react")
                .with_path("/node_modules/react/index.js")
                .with_dep(ModuleDep::new("scheduler")),
            Module::new("scheduler").with_path("/node_modules/scheduler/index.js"),
        ]);
        let splitters = vec![Splitter::new(
            "vendor",
            Matcher::from_paths([Rule::pattern("/node_modules/").unwrap()]),
        )];

        let tree = TreeBuilder::new(&cache, &splitters, "")
            .build_tree(&["a".into()], None)
            .unwrap();

        assert_eq!(names(&tree), ["main", "vendor"]);
        let vendor = tree.repository.get_shard("vendor").unwrap();
        assert_eq!(vendor.modules.len(), 2);
        assert!(vendor.parents.contains("main"));
        assert_eq!(tree.stats.len(), 3);
    }

    #[test]
    fn test_shard_revisited_for_late_entries() {
        // "vendor" is drained once from main, then receives another entry
        // from "pages" and has to be drained again.
        let cache = module_cache([
            Module::new("a")
                .with_dep(ModuleDep::new("lib-a"))
                .with_dep(ModuleDep::new("page")),
            Module::new("page").with_dep(ModuleDep::new("lib-b")),
            Module::new("lib-a"),
            Module::new("lib-b"),
        ]);
        let splitters = vec![
            Splitter::new(
                "vendor",
                Matcher::from_attributes([("id", Rule::pattern("^lib-").unwrap())]),
            ),
            Splitter::new("pages", Matcher::from_attributes([("id", Rule::literal("page"))])),
        ];

        let tree = TreeBuilder::new(&cache, &splitters, "")
            .build_tree(&["a".into()], None)
            .unwrap();

        let vendor = tree.repository.get_shard("vendor").unwrap();
        let modules: Vec<_> = vendor.modules.iter().map(ModuleId::as_str).collect();
        assert_eq!(modules, ["lib-a", "lib-b"]);
        assert!(vendor.parents.contains("pages"));
    }

    #[test]
    fn test_dynamic_cycle_terminates() {
        let cache = module_cache([
            Module::new("a").with_dep(ModuleDep::dynamic("b")),
            Module::new("b").with_dep(ModuleDep::dynamic("a")),
        ]);

        let tree = TreeBuilder::new(&cache, &[], "")
            .build_tree(&["a".into()], None)
            .unwrap();

        assert_eq!(tree.repository.get_dynamic_shards().len(), 2);
    }
}
