//! `loader-<file>` artifacts fetching a root shard's static dependencies

use log::debug;

use super::{ShardUpdate, repository::ShardRepository};
use crate::paths;

const STATIC_LOADER_PRELUDE: &str = include_str!("../../assets/static_loader.js");

/// Name prefix of generated loader shards
pub const LOADER_PREFIX: &str = "loader-";

/// Emit one loader shard per root shard that has a dest and modules.
///
/// The loader lists the root's load order as urls relative to its own
/// directory; the root shard itself is not part of it. Returns the names of
/// the loader shards.
pub fn build_static_loaders(repository: &mut ShardRepository) -> Vec<String> {
    let loaders: Vec<ShardUpdate> = repository
        .get_entry_shards()
        .into_iter()
        .filter(|shard| !shard.modules.is_empty())
        .filter_map(|shard| {
            let dest = shard.dest.as_deref()?;
            let dir = paths::dirname(dest);
            let name = format!("{LOADER_PREFIX}{}", paths::basename(dest));

            let shard_paths: Vec<String> = repository
                .get_shards(&shard.load_order)
                .into_iter()
                .filter(|dependency| dependency.has_output())
                .filter_map(|dependency| dependency.dest.as_deref())
                .map(|path| format!("\"./{}\"", paths::relative(dir, path)))
                .collect();

            debug!(
                "Loader '{name}' for shard '{}' fetches {} shards",
                shard.name,
                shard_paths.len()
            );

            Some(
                ShardUpdate::new(name.as_str())
                    .dest(Some(paths::join(dir, &name)))
                    .content(Some(loader_content(&shard_paths))),
            )
        })
        .collect();

    loaders
        .into_iter()
        .map(|loader| repository.set_shard(loader).name.clone())
        .collect()
}

fn loader_content(shard_paths: &[String]) -> String {
    format!(
        "(function(){{\n{STATIC_LOADER_PRELUDE}\n;load([{}]);\n}})();",
        shard_paths.join(",")
    )
}
