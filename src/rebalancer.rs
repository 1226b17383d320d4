//! Key migration on topology change.
//!
//! Adding a node only moves keys out of the arcs the new positions carve out
//! of their previous owners; the stores are read by position range, so the
//! cost follows the size of those arcs, not the whole key space. Removing a
//! node copies nothing by itself: keys only the removed node held become
//! unavailable unless the node is drained first.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use tracing::debug;

use crate::hashring::HashRing;
use crate::hashring::ranges::OwnedRange;
use crate::store::NodeStore;

/// Counters describing one migration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entries read from the source nodes.
    pub scanned: usize,
    /// Copies written to their new owners.
    pub copied: usize,
    /// Keys deleted from a source after the copy (ownership transferred).
    pub moved: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rebalancer {
    replication_factor: usize,
}

impl Rebalancer {
    pub fn new(replication_factor: usize) -> Rebalancer {
        Rebalancer { replication_factor }
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Copy into `added` every key it owns in `ring` that the owners in
    /// `previous` hold. `ring` is `previous` plus `added`.
    ///
    /// Only the ranges `added` takes over are read, each from the nodes that
    /// owned it before the join: for a node's own arcs that is the successor
    /// of each new position. Without replication ownership transfers and the
    /// source copy is deleted; with replication the source keeps it as a
    /// replica.
    pub fn migrate_added<K, V, T, P, Q, S>(
        &self,
        previous: &HashRing<T, Q>,
        ring: &HashRing<T, P>,
        stores: &HashMap<T, S>,
        added: &T,
    ) -> MigrationReport
    where
        T: Hash + Eq + Clone + Debug + Display,
        S: NodeStore<K, V>,
    {
        let mut report = MigrationReport::default();

        let target = match stores.get(added) {
            Some(target) => target,
            None => return report,
        };

        for OwnedRange { range, nodes } in ring.transfer_plan(added, previous, previous.nodes()) {
            for source_node in &nodes {
                let source = match stores.get(source_node) {
                    Some(source) => source,
                    None => continue,
                };

                for (position, key, value) in source.range(range.clone()) {
                    report.scanned += 1;

                    if self.replication_factor == 0 {
                        source.remove(position, &key);
                        report.moved += 1;
                    } else if target.get(position, &key).is_some() {
                        continue;
                    }
                    target.put(position, key, value);
                    report.copied += 1;
                }
            }

            debug!(?range, sources = ?nodes, target = %added, "migrated range");
        }

        report
    }

    /// Copy every key held by a leaving node to the nodes that own it once
    /// the node is gone. `ring` must no longer contain the leaving node.
    pub fn migrate_removed<K, V, T, P, S>(
        &self,
        ring: &HashRing<T, P>,
        stores: &HashMap<T, S>,
        leaving: &S,
    ) -> MigrationReport
    where
        K: Clone,
        V: Clone,
        T: Hash + Eq + Clone,
        S: NodeStore<K, V>,
    {
        let mut report = MigrationReport::default();

        for (position, key, value) in leaving.entries() {
            report.scanned += 1;

            for owner in ring.owners_at(position, self.replication_factor + 1) {
                if let Some(store) = stores.get(&owner) {
                    if store.get(position, &key).is_none() {
                        store.put(position, key.clone(), value.clone());
                        report.copied += 1;
                    }
                }
            }
            report.moved += 1;
        }

        report
    }
}
