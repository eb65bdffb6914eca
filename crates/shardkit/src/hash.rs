//! Content hashes used for implicit shard names and shim module ids

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::types::Module;

/// Number of hex characters kept by [`short_hash`]
pub const SHORT_HASH_LEN: usize = 7;

/// SHA-256 of `input`, hex-encoded
pub fn long_hash(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// First [`SHORT_HASH_LEN`] characters of [`long_hash`]
pub fn short_hash(input: &str) -> String {
    let mut hash = long_hash(input);
    hash.truncate(SHORT_HASH_LEN);
    hash
}

/// Path of a module relative to `root_dir`, falling back to its id.
///
/// Absolute checkout locations must never leak into hashes, otherwise two
/// machines building the same graph would produce different shard names.
pub fn normalized_module_path<'a>(module: &'a Module, root_dir: &str) -> &'a str {
    let path = module.path.as_deref().unwrap_or(module.id.as_str());
    let root = root_dir.trim_end_matches('/');

    if root.is_empty() {
        path
    } else {
        path.strip_prefix(root).unwrap_or(path)
    }
}

/// Stable identity of a module: short hash of its normalized path plus the
/// path's extension (`"1e466af.js"`)
pub fn module_hash(module: &Module, root_dir: &str) -> String {
    let path = normalized_module_path(module, root_dir);
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    format!("{}{extension}", short_hash(path))
}
