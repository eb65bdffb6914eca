//! Store of every shard in one build, keyed by name

use std::collections::VecDeque;

use log::trace;

use super::{Shard, ShardUpdate};
use crate::types::{FxIndexMap, FxIndexSet, ModuleId};

/// Name of the shard seeded with the build's root modules
pub const MAIN_SHARD_NAME: &str = "main";

/// Arena of shards keyed by name. Graph edges are stored as name sets on the
/// shards themselves, so nothing here holds references between shards.
#[derive(Debug, Clone, Default)]
pub struct ShardRepository {
    shards: FxIndexMap<String, Shard>,
}

impl ShardRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_shard(&self, name: &str) -> Option<&Shard> {
        self.shards.get(name)
    }

    /// Shards for `names`, skipping unknown names
    pub fn get_shards<'a, S: AsRef<str>>(
        &'a self,
        names: impl IntoIterator<Item = S>,
    ) -> Vec<&'a Shard> {
        names
            .into_iter()
            .filter_map(|name| self.shards.get(name.as_ref()))
            .collect()
    }

    /// Merge `update` into the named shard, creating it when absent
    pub fn set_shard(&mut self, update: ShardUpdate) -> &Shard {
        let shard = self.shards.entry(update.name.clone()).or_insert_with(|| {
            trace!("Creating shard '{}'", update.name);
            Shard::new(update.name.clone())
        });
        shard.merge(&update);
        shard
    }

    /// Keep only the modules of `name` for which `keep` returns true.
    ///
    /// This is the only way a shard's module set can shrink.
    pub fn retain_modules(&mut self, name: &str, keep: impl FnMut(&ModuleId) -> bool) {
        if let Some(shard) = self.shards.get_mut(name) {
            shard.modules.retain(keep);
        }
    }

    /// Replace the load order of `name`
    pub fn set_load_order(&mut self, name: &str, load_order: impl IntoIterator<Item = String>) {
        if let Some(shard) = self.shards.get_mut(name) {
            shard.load_order = load_order.into_iter().collect();
        }
    }

    pub fn get_all_shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards.values()
    }

    pub fn get_main_shard(&self) -> Option<&Shard> {
        self.shards
            .values()
            .find(|shard| shard.is_main)
            .or_else(|| self.shards.get(MAIN_SHARD_NAME))
    }

    pub fn get_dynamic_shards(&self) -> Vec<&Shard> {
        self.shards.values().filter(|shard| shard.is_dynamic).collect()
    }

    /// Root shards: the main shard first, then every dynamic shard
    pub fn get_entry_shards(&self) -> Vec<&Shard> {
        self.get_main_shard()
            .into_iter()
            .chain(
                self.shards
                    .values()
                    .filter(|shard| shard.is_dynamic && !shard.is_main),
            )
            .collect()
    }

    /// Non-dynamic children of `name`
    pub fn static_children(&self, name: &str) -> Vec<&Shard> {
        self.shards
            .get(name)
            .map(|shard| {
                self.get_shards(&shard.children)
                    .into_iter()
                    .filter(|child| !child.is_dynamic)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every shard `name` is statically loaded after.
    ///
    /// An edge into a dynamic shard is a dynamic edge, so the walk never
    /// climbs above a dynamic shard.
    pub fn static_ancestors(&self, name: &str) -> FxIndexSet<String> {
        let mut ancestors = FxIndexSet::default();
        let mut queue = VecDeque::from([name.to_owned()]);

        while let Some(current) = queue.pop_front() {
            let Some(shard) = self.shards.get(&current) else {
                continue;
            };
            if shard.is_dynamic {
                continue;
            }
            for parent in &shard.parents {
                if ancestors.insert(parent.clone()) {
                    queue.push_back(parent.clone());
                }
            }
        }

        ancestors
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shards.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn id(value: &str) -> ModuleId {
        ModuleId::from(value)
    }

    fn names(shards: &[&Shard]) -> Vec<String> {
        shards.iter().map(|shard| shard.name.clone()).collect()
    }

    #[test]
    fn test_set_shard_creates_then_merges() {
        let mut repository = ShardRepository::new();
        repository.set_shard(ShardUpdate::new("vendor").entry(id("a")));
        let shard = repository.set_shard(ShardUpdate::new("vendor").entry(id("b")));

        assert_eq!(shard.entries.len(), 2);
        assert_eq!(repository.len(), 1);
    }

    #[test]
    fn test_set_shard_twice_is_idempotent() {
        let update = ShardUpdate::new("vendor")
            .entry(id("a"))
            .module(id("a"))
            .parent("main")
            .dest(Some("dist/vendor.js".into()));

        let mut once = ShardRepository::new();
        once.set_shard(update.clone());

        let mut twice = ShardRepository::new();
        twice.set_shard(update.clone());
        twice.set_shard(update);

        assert_eq!(once.get_shard("vendor"), twice.get_shard("vendor"));
    }

    #[test]
    fn test_full_shard_round_trips_through_update() {
        let mut repository = ShardRepository::new();
        let original = repository
            .set_shard(
                ShardUpdate::new("lazy.js")
                    .entry(id("c"))
                    .dynamic(true)
                    .implicit(true),
            )
            .clone();

        let mut copy = ShardRepository::new();
        copy.set_shard(ShardUpdate::from(&original));
        assert_eq!(copy.get_shard("lazy.js"), Some(&original));
    }

    #[test]
    fn test_entry_shards_are_main_then_dynamic() {
        let mut repository = ShardRepository::new();
        repository.set_shard(ShardUpdate::new("lazy").dynamic(true));
        repository.set_shard(ShardUpdate::new("vendor"));
        repository.set_shard(ShardUpdate::new(MAIN_SHARD_NAME).main(true));

        assert_eq!(names(&repository.get_entry_shards()), ["main", "lazy"]);
        assert_eq!(names(&repository.get_dynamic_shards()), ["lazy"]);
        assert_eq!(
            repository.get_main_shard().map(|shard| shard.name.as_str()),
            Some("main")
        );
    }

    #[test]
    fn test_retain_modules() {
        let mut repository = ShardRepository::new();
        repository.set_shard(ShardUpdate::new("main").modules([id("a"), id("b")]));
        repository.retain_modules("main", |module| *module != id("a"));

        let main = repository.get_shard("main").unwrap();
        assert_eq!(main.modules.iter().collect::<Vec<_>>(), [&id("b")]);
    }

    #[test]
    fn test_static_ancestors_stop_at_dynamic_shards() {
        let mut repository = ShardRepository::new();
        repository.set_shard(ShardUpdate::new("main").main(true).child("lazy"));
        repository.set_shard(ShardUpdate::new("lazy").dynamic(true).parent("main").child("a"));
        repository.set_shard(ShardUpdate::new("a").parent("lazy").child("b"));
        repository.set_shard(ShardUpdate::new("b").parent("a"));

        let ancestors: Vec<_> = repository.static_ancestors("b").into_iter().collect();
        assert_eq!(ancestors, ["a", "lazy"]);
        assert!(repository.static_ancestors("lazy").is_empty());
    }

    #[test]
    fn test_static_children_skip_dynamic() {
        let mut repository = ShardRepository::new();
        repository.set_shard(ShardUpdate::new("main").child("vendor").child("lazy"));
        repository.set_shard(ShardUpdate::new("vendor"));
        repository.set_shard(ShardUpdate::new("lazy").dynamic(true));

        assert_eq!(names(&repository.static_children("main")), ["vendor"]);
    }
}
