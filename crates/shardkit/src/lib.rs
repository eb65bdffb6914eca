//! Shard graph construction for a JavaScript bundler.
//!
//! Given the host bundler's resolved module graph and an ordered list of
//! [`Splitter`]s, [`split_graph`] partitions the modules into shards, works out
//! the order shards must load in, deduplicates modules shared between shards,
//! and synthesizes the loader code for on-demand shards.

pub mod config;
pub mod error;
pub mod graph;
pub mod hash;
pub mod matcher;
pub mod orchestrator;
pub mod paths;
pub mod shard;
pub mod splitter;
pub mod types;

pub use error::CircularReferenceError;
pub use matcher::{Matcher, Rule};
pub use orchestrator::{SplitOptions, SplitResult, split_graph};
pub use shard::{Shard, ShardDescriptor};
pub use splitter::Splitter;
pub use types::{Module, ModuleCache, ModuleDep, ModuleId};
