//! Deduplication of modules kept by more than one shard

use log::{debug, trace};

use super::{ShardUpdate, node_builder::ModuleStats, repository::ShardRepository};
use crate::types::ModuleId;

/// How common modules without an owning entry are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonPolicy {
    /// Modules shared only by dynamic shards go to the target shard instead
    /// of the first dynamic shard in load order
    pub hoist_dynamic_common: bool,
    /// Every common module goes to the target shard
    pub hoist_all: bool,
}

impl Default for CommonPolicy {
    fn default() -> Self {
        Self {
            hoist_dynamic_common: true,
            hoist_all: false,
        }
    }
}

/// What the common pass did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommonShardReport {
    /// Modules moved into the target shard
    pub hoisted: Vec<ModuleId>,
    /// Every deduplicated module with the shard that now owns it
    pub owners: Vec<(ModuleId, String)>,
}

/// Leave every module shared by several `candidates` in exactly one of them.
///
/// `candidates` must be in load order: the first holder of a module is the
/// earliest loaded one and keeps it unless another holder declares it as an
/// entry.
pub fn build_common_shards(
    repository: &mut ShardRepository,
    target: &str,
    candidates: &[String],
    stats: &ModuleStats,
    policy: CommonPolicy,
) -> CommonShardReport {
    let mut report = CommonShardReport::default();

    for (module_id, shards) in stats.iter().filter(|(_, shards)| shards.len() > 1) {
        let holders: Vec<&str> = candidates
            .iter()
            .map(String::as_str)
            .filter(|name| {
                shards.contains(*name)
                    && repository
                        .get_shard(name)
                        .is_some_and(|shard| shard.modules.contains(module_id))
            })
            .collect();

        if holders.len() < 2 {
            continue;
        }

        let entry_owner = holders.iter().copied().find(|name| {
            repository
                .get_shard(name)
                .is_some_and(|shard| shard.entries.contains(module_id))
        });

        let owner = match entry_owner {
            Some(owner) => owner,
            None if policy.hoist_all
                || (policy.hoist_dynamic_common && all_dynamic(repository, &holders)) =>
            {
                trace!("Hoisting common module '{module_id}' into '{target}'");
                repository.set_shard(ShardUpdate::new(target).module(module_id.clone()));
                report.hoisted.push(module_id.clone());
                target
            }
            None => holders[0],
        };

        for holder in holders.iter().filter(|holder| **holder != owner) {
            repository.retain_modules(holder, |id| id != module_id);
        }

        report.owners.push((module_id.clone(), owner.to_owned()));
    }

    debug!(
        "Deduplicated {} common modules, hoisted {} into '{target}'",
        report.owners.len(),
        report.hoisted.len()
    );

    report
}

fn all_dynamic(repository: &ShardRepository, names: &[&str]) -> bool {
    names.iter().all(|name| {
        repository
            .get_shard(name)
            .is_some_and(|shard| shard.is_dynamic)
    })
}
