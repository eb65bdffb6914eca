use rustc_hash::FxHashSet;

use super::repository::ShardRepository;
use crate::types::FxIndexSet;

/// Order in which the static dependency shards of `roots` must be loaded.
///
/// Children are expanded breadth first without a visited set, so a shard shows
/// up once per path reaching it. Keeping only its last position and reading
/// the list backwards places every shard before everything depending on it.
/// Dynamic children are never followed and the roots are not part of their
/// own order.
pub fn build_load_order<S: AsRef<str>>(roots: &[S], repository: &ShardRepository) -> Vec<String> {
    let mut shard_list: Vec<String> = roots.iter().map(|root| root.as_ref().to_owned()).collect();

    let mut index = 0;
    while index < shard_list.len() {
        let children: Vec<String> = repository
            .static_children(&shard_list[index])
            .into_iter()
            .map(|child| child.name.clone())
            .collect();
        shard_list.extend(children);
        index += 1;
    }

    let excluded: FxHashSet<&str> = roots.iter().map(|root| root.as_ref()).collect();
    let mut load_order = FxIndexSet::default();
    for name in shard_list.iter().rev() {
        if !excluded.contains(name.as_str()) {
            load_order.insert(name.clone());
        }
    }

    load_order.into_iter().collect()
}
