//! Consistent-hash key/value store: routes data keys to per-node stores and
//! migrates keys when nodes join.
//!
//! # Locking
//!
//! The ring and the per-node stores sit behind one `parking_lot::RwLock`.
//! `put`, `get` and lookups take the read lock, so they run concurrently and
//! always observe a complete topology. `add_node`, `remove_node` and drains
//! take the write lock and run their migration copy inside the same critical
//! section: no reader sees a ring whose new positions exist but whose keys
//! have not been copied yet. A topology change is not interruptible once it
//! holds the lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::RingConfig;
use crate::error::{Error, Result};
use crate::hashring::HashRing;
use crate::hashring::placement::{GapBisection, HashedPlacement, PlacementPolicy};
use crate::hashring::ranges::OwnedRange;
use crate::node::Node;
use crate::rebalancer::{MigrationReport, Rebalancer};
use crate::router::{HashedKeys, KeyPosition, KeyRouter, ModuloKeys};
use crate::store::{MemoryStore, NodeStore};

/// Result of a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PutOutcome {
    /// Owners that received the value.
    pub written: usize,
    /// Owners missing because the ring has fewer than `R + 1` nodes.
    pub under_replicated: usize,
}

/// Small bounded ring with gap-bisection placement and `key mod space` routing.
pub type BoundedStore<K, V> = ConsistentHashStore<K, V, GapBisection, ModuloKeys>;

/// Hashed ring with virtual nodes and hashed keys.
pub type HashedStore<K, V> = ConsistentHashStore<K, V, HashedPlacement, HashedKeys>;

struct Topology<P, S> {
    ring: HashRing<Node, P>,
    stores: HashMap<Node, S>,
}

/// Key-value store partitioned over the nodes of a [`HashRing`], each key
/// kept on its primary owner and `R` replicas.
pub struct ConsistentHashStore<K, V, P, H, S = MemoryStore<K, V>> {
    topology: RwLock<Topology<P, S>>,
    router: KeyRouter<H>,
    rebalancer: Rebalancer,
    _entries: PhantomData<fn() -> (K, V)>,
}

impl<K, V> BoundedStore<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
    ModuloKeys: KeyPosition<K>,
{
    /// Bounded store with in-memory node stores.
    pub fn bounded(config: RingConfig, nodes: Vec<Node>) -> Result<BoundedStore<K, V>> {
        ConsistentHashStore::new(config, GapBisection, KeyRouter::modulo(), nodes)
    }
}

impl<K, V> HashedStore<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Hashed store with in-memory node stores.
    pub fn hashed(config: RingConfig, nodes: Vec<Node>) -> Result<HashedStore<K, V>> {
        ConsistentHashStore::new(config, HashedPlacement::default(), KeyRouter::hashed(), nodes)
    }
}

impl<K, V, P, H, S> ConsistentHashStore<K, V, P, H, S>
where
    K: Clone,
    V: Clone,
    P: PlacementPolicy + Clone,
    H: KeyPosition<K>,
    S: NodeStore<K, V> + Default,
{
    /// Build a store over `nodes`, each getting a fresh default store.
    pub fn new(
        config: RingConfig,
        placement: P,
        router: KeyRouter<H>,
        nodes: Vec<Node>,
    ) -> Result<ConsistentHashStore<K, V, P, H, S>> {
        let nodes = nodes.into_iter().map(|n| (n, S::default())).collect();
        ConsistentHashStore::with_stores(config, placement, router, nodes)
    }

    /// Add `node` with an empty default store and migrate its arcs.
    pub fn add_node(&self, node: Node) -> Result<MigrationReport> {
        self.add_node_with_store(node, S::default())
    }
}

impl<K, V, P, H, S> ConsistentHashStore<K, V, P, H, S>
where
    K: Clone,
    V: Clone,
    P: PlacementPolicy + Clone,
    H: KeyPosition<K>,
    S: NodeStore<K, V>,
{
    /// Build a store over `nodes` with the given per-node stores.
    ///
    /// Fails with `InvalidConfig` for an empty node list or fewer than
    /// `replication_factor + 1` nodes.
    pub fn with_stores(
        config: RingConfig,
        placement: P,
        router: KeyRouter<H>,
        nodes: Vec<(Node, S)>,
    ) -> Result<ConsistentHashStore<K, V, P, H, S>> {
        if nodes.is_empty() {
            return Err(Error::InvalidConfig("node list is empty".into()));
        }
        if nodes.len() < config.owner_count() {
            return Err(Error::InvalidConfig(format!(
                "replication factor {} needs at least {} nodes, got {}",
                config.replication_factor,
                config.owner_count(),
                nodes.len()
            )));
        }

        let rebalancer = Rebalancer::new(config.replication_factor);
        let mut topology = Topology {
            ring: HashRing::with_placement(config, placement)?,
            stores: HashMap::new(),
        };

        for (node, store) in nodes {
            let count = topology.ring.positions_for_weight(node.weight());
            topology.ring.add_node_with_count(node.clone(), count)?;
            topology.stores.insert(node, store);
        }

        info!(
            nodes = topology.ring.node_count(),
            positions = topology.ring.position_count(),
            "initialized consistent hash store"
        );

        Ok(ConsistentHashStore {
            topology: RwLock::new(topology),
            router,
            rebalancer,
            _entries: PhantomData,
        })
    }

    /// Add `node` backed by `store`, then copy the keys of the arcs it takes over.
    pub fn add_node_with_store(&self, node: Node, store: S) -> Result<MigrationReport> {
        let mut topology = self.topology.write();

        let count = topology.ring.positions_for_weight(node.weight());
        let previous = topology.ring.clone();

        let positions = topology.ring.add_node_with_count(node.clone(), count)?;
        topology.stores.insert(node.clone(), store);

        let report =
            self.rebalancer
                .migrate_added(&previous, &topology.ring, &topology.stores, &node);

        info!(
            %node,
            ?positions,
            scanned = report.scanned,
            copied = report.copied,
            moved = report.moved,
            "node joined"
        );
        Ok(report)
    }

    /// Remove `node` without copying anything. Keys only this node held
    /// become unavailable. Returns the detached store.
    pub fn remove_node(&self, node: &Node) -> Result<S> {
        let mut topology = self.topology.write();
        Self::detach(&mut topology, node)
    }

    /// Remove the node owning the highest ring position.
    pub fn remove_last(&self) -> Result<Node> {
        let mut topology = self.topology.write();
        let node = match topology.ring.last() {
            Some((_, node)) => node.clone(),
            None => return Err(Error::NoNodesAvailable),
        };
        Self::detach(&mut topology, &node)?;
        Ok(node)
    }

    /// Copy every key of `node` to its post-removal owners, then remove it.
    pub fn drain_and_remove(&self, node: &Node) -> Result<MigrationReport> {
        let mut topology = self.topology.write();

        topology.ring.remove_node(node)?;
        let leaving = match topology.stores.remove(node) {
            Some(store) => store,
            None => return Err(Error::UnknownNode(node.to_string())),
        };

        let report =
            self.rebalancer
                .migrate_removed(&topology.ring, &topology.stores, &leaving);

        if topology.ring.is_empty() && !leaving.is_empty() {
            warn!(%node, keys = leaving.len(), "drained last node, keys have no owner left");
        }
        info!(%node, scanned = report.scanned, copied = report.copied, "node drained and left");
        Ok(report)
    }

    fn detach(topology: &mut Topology<P, S>, node: &Node) -> Result<S> {
        topology.ring.remove_node(node)?;
        let store = match topology.stores.remove(node) {
            Some(store) => store,
            None => return Err(Error::UnknownNode(node.to_string())),
        };

        if store.is_empty() {
            info!(%node, "node left");
        } else {
            warn!(%node, keys = store.len(), "node left without drain, its keys are unavailable unless replicated");
        }
        Ok(store)
    }

    /// Write `value` to every owner of `key`.
    ///
    /// A ring with fewer than `R + 1` nodes still accepts the write; the
    /// missing replicas are reported in [`PutOutcome::under_replicated`].
    pub fn put(&self, key: K, value: V) -> Result<PutOutcome> {
        let topology = self.topology.read();

        let position = self.router.key_position(&topology.ring, &key);
        let owners = self.router.owners(&topology.ring, &key);
        if owners.is_empty() {
            return Err(Error::NoNodesAvailable);
        }

        let mut written = 0;
        for owner in &owners {
            if let Some(store) = topology.stores.get(owner) {
                store.put(position, key.clone(), value.clone());
                written += 1;
            }
        }

        let under_replicated = self.rebalancer.replication_factor() + 1 - written;
        if under_replicated > 0 {
            warn!(written, under_replicated, "write is under-replicated");
        }
        debug!(position, ?owners, "stored key");

        Ok(PutOutcome {
            written,
            under_replicated,
        })
    }

    /// Read `key` from its primary owner only.
    pub fn get(&self, key: &K) -> Result<V> {
        let topology = self.topology.read();

        let position = self.router.key_position(&topology.ring, key);
        let primary = self.router.primary_owner(&topology.ring, key)?;
        topology
            .stores
            .get(primary)
            .and_then(|store| store.get(position, key))
            .ok_or(Error::NotFound)
    }

    /// Read `key` from its owners in ring order, returning the first hit.
    pub fn get_with_fallback(&self, key: &K) -> Result<V> {
        let topology = self.topology.read();

        let position = self.router.key_position(&topology.ring, key);
        let owners = self.router.owners(&topology.ring, key);
        if owners.is_empty() {
            return Err(Error::NoNodesAvailable);
        }

        owners
            .iter()
            .filter_map(|owner| topology.stores.get(owner))
            .find_map(|store| store.get(position, key))
            .ok_or(Error::NotFound)
    }

    /// Delete `key` from every node holding it. Returns the number of copies removed.
    pub fn remove(&self, key: &K) -> usize {
        let topology = self.topology.read();
        let position = self.router.key_position(&topology.ring, key);
        topology
            .stores
            .values()
            .filter_map(|store| store.remove(position, key))
            .count()
    }

    /// Primary and replica owners of `key`.
    pub fn owners(&self, key: &K) -> Result<Vec<Node>> {
        let topology = self.topology.read();
        let owners = self.router.owners(&topology.ring, key);
        if owners.is_empty() {
            return Err(Error::NoNodesAvailable);
        }
        Ok(owners)
    }

    /// Ring position of `key`.
    pub fn key_position(&self, key: &K) -> u64 {
        let topology = self.topology.read();
        self.router.key_position(&topology.ring, key)
    }

    /// Owned ranges of the current ring, with the configured replication factor.
    pub fn ownership(&self) -> Vec<OwnedRange<Node>> {
        let topology = self.topology.read();
        topology
            .ring
            .owned_ranges(self.rebalancer.replication_factor())
    }

    /// Number of keys `node` currently holds.
    pub fn key_count(&self, node: &Node) -> Result<usize> {
        let topology = self.topology.read();
        topology
            .stores
            .get(node)
            .map(|store| store.len())
            .ok_or_else(|| Error::UnknownNode(node.to_string()))
    }

    /// Ring positions of `node`.
    pub fn positions_of(&self, node: &Node) -> Vec<u64> {
        self.topology.read().ring.positions_of(node)
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.topology.read().ring.nodes().to_vec()
    }

    pub fn node_count(&self) -> usize {
        self.topology.read().ring.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.read().ring.is_empty()
    }

    pub fn replication_factor(&self) -> usize {
        self.rebalancer.replication_factor()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn abc() -> Vec<Node> {
        vec![Node::new("A"), Node::new("B"), Node::new("C")]
    }

    #[test]
    fn construction_rejects_too_few_nodes() {
        let result: Result<BoundedStore<i32, String>> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 2), vec![Node::new("A")]);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let result: Result<BoundedStore<i32, String>> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 0), vec![]);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let result: Result<BoundedStore<i32, String>> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 10), abc());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn bounded_scenario_without_replication() {
        let store: BoundedStore<i32, String> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 0), abc()).unwrap();

        assert_eq!(store.positions_of(&Node::new("A")), vec![4]);
        assert_eq!(store.positions_of(&Node::new("B")), vec![7]);
        assert_eq!(store.positions_of(&Node::new("C")), vec![1]);

        let outcome = store.put(5, "x".to_string()).unwrap();
        assert_eq!(
            PutOutcome {
                written: 1,
                under_replicated: 0,
            },
            outcome
        );
        assert_eq!(store.owners(&5).unwrap(), vec![Node::new("B")]);
        assert_eq!(store.get(&5), Ok("x".to_string()));

        store.remove_node(&Node::new("B")).unwrap();
        assert_eq!(store.owners(&5).unwrap(), vec![Node::new("C")]);
        assert_eq!(store.get(&5), Err(Error::NotFound));
    }

    #[test]
    fn bounded_scenario_with_replication() {
        let store: BoundedStore<i32, String> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 1), abc()).unwrap();

        store.put(5, "x".to_string()).unwrap();
        assert_eq!(
            store.owners(&5).unwrap(),
            vec![Node::new("B"), Node::new("C")]
        );

        let detached = store.remove_node(&Node::new("B")).unwrap();
        assert_eq!(detached.get(5, &5), Some("x".to_string()));
        assert_eq!(store.get(&5), Ok("x".to_string()));
    }

    #[test]
    fn get_with_fallback_reads_replicas() {
        // only the replica C holds key 5, primary B never saw the write
        let replica = MemoryStore::new();
        replica.put(5, 5, "x".to_string());

        let store: BoundedStore<i32, String> = ConsistentHashStore::with_stores(
            RingConfig::bounded(10, 10, 1),
            GapBisection,
            KeyRouter::modulo(),
            vec![
                (Node::new("A"), MemoryStore::new()),
                (Node::new("B"), MemoryStore::new()),
                (Node::new("C"), replica),
            ],
        )
        .unwrap();

        assert_eq!(
            store.owners(&5).unwrap(),
            vec![Node::new("B"), Node::new("C")]
        );
        assert_eq!(store.get(&5), Err(Error::NotFound));
        assert_eq!(store.get_with_fallback(&5), Ok("x".to_string()));
        assert_eq!(store.get_with_fallback(&6), Err(Error::NotFound));
    }

    #[test]
    fn under_replicated_writes_are_reported() {
        let store: BoundedStore<i32, String> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 2), abc()).unwrap();

        store.remove_node(&Node::new("A")).unwrap();

        let outcome = store.put(3, "y".to_string()).unwrap();
        assert_eq!(
            PutOutcome {
                written: 2,
                under_replicated: 1,
            },
            outcome
        );
        assert_eq!(store.get(&3), Ok("y".to_string()));
    }

    #[test]
    fn empty_ring_reports_no_nodes() {
        let store: BoundedStore<i32, String> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 0), vec![Node::new("A")]).unwrap();

        store.remove_last().unwrap();
        assert!(store.is_empty());

        assert_eq!(store.put(1, "z".to_string()), Err(Error::NoNodesAvailable));
        assert_eq!(store.get(&1), Err(Error::NoNodesAvailable));
        assert_eq!(store.get_with_fallback(&1), Err(Error::NoNodesAvailable));
        assert_eq!(store.remove_last(), Err(Error::NoNodesAvailable));
    }

    #[test]
    fn drain_keeps_keys_available() {
        let store: BoundedStore<i32, String> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 0), abc()).unwrap();

        for key in 0..10 {
            store.put(key, format!("value{key}")).unwrap();
        }

        let report = store.drain_and_remove(&Node::new("B")).unwrap();
        assert_eq!(report.copied, 3);

        for key in 0..10 {
            assert_eq!(store.get(&key), Ok(format!("value{key}")));
        }
        assert_eq!(store.key_count(&Node::new("C")).unwrap(), 7);
        assert_eq!(
            store.key_count(&Node::new("B")),
            Err(Error::UnknownNode("B".to_string()))
        );
    }

    #[test]
    fn remove_deletes_every_copy() {
        let store: BoundedStore<i32, String> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 2), abc()).unwrap();

        store.put(5, "x".to_string()).unwrap();
        assert_eq!(store.remove(&5), 3);
        assert_eq!(store.get_with_fallback(&5), Err(Error::NotFound));
        assert_eq!(store.remove(&5), 0);
    }

    #[test]
    fn bounded_nodes_keep_one_position_whatever_their_weight() {
        let store: BoundedStore<i32, String> = BoundedStore::bounded(
            RingConfig::bounded(10, 3, 0),
            vec![Node::with_weight("A", 3), Node::new("B")],
        )
        .unwrap();

        assert_eq!(store.positions_of(&Node::new("A")), vec![4]);
        assert_eq!(store.positions_of(&Node::new("B")), vec![7]);

        store.add_node(Node::with_weight("C", 5)).unwrap();
        assert_eq!(store.positions_of(&Node::new("C")), vec![1]);
        assert_eq!(store.ownership().len(), 4);
    }

    #[test]
    fn join_only_reads_the_arcs_it_takes_over() {
        let nodes = (0..5).map(|i| Node::new(format!("n{i}"))).collect();
        let store: HashedStore<u64, u64> =
            HashedStore::hashed(RingConfig::default(), nodes).unwrap();

        for key in 0..10_000_u64 {
            store.put(key, key).unwrap();
        }

        let report = store.add_node(Node::new("n5")).unwrap();

        // every entry read belongs to the new node, about a sixth of the keys
        assert_eq!(report.scanned, report.copied);
        assert_eq!(report.copied, report.moved);
        assert!(report.scanned > 0);
        assert!(report.scanned < 10_000 / 3, "scanned {}", report.scanned);
        assert_eq!(store.key_count(&Node::new("n5")), Ok(report.copied));

        for key in 0..10_000_u64 {
            assert_eq!(store.get(&key), Ok(key));
        }
    }

    #[test]
    fn ring_full_is_reported() {
        let store: BoundedStore<i32, String> =
            BoundedStore::bounded(RingConfig::bounded(10, 3, 0), abc()).unwrap();

        assert_eq!(
            store.add_node(Node::new("D")),
            Err(Error::RingFull { capacity: 3 })
        );
        assert_eq!(store.node_count(), 3);
    }

    #[test]
    fn ownership_covers_the_space() {
        let store: BoundedStore<i32, String> =
            BoundedStore::bounded(RingConfig::bounded(10, 10, 0), abc()).unwrap();

        let covered: u64 = store
            .ownership()
            .iter()
            .map(|r| r.range.end() - r.range.start() + 1)
            .sum();
        assert_eq!(covered, 10);
    }

    #[test]
    fn hashed_store_round_trip() {
        let nodes = (1..=4).map(|i| Node::new(format!("cache-{i}"))).collect();
        let store: HashedStore<String, u64> = HashedStore::hashed(
            RingConfig::default()
                .with_virtual_nodes(64)
                .with_replication_factor(1),
            nodes,
        )
        .unwrap();

        for i in 0..500_u64 {
            let outcome = store.put(format!("key-{i}"), i).unwrap();
            assert_eq!(outcome.written, 2);
        }
        for i in 0..500_u64 {
            assert_eq!(store.get(&format!("key-{i}")), Ok(i));
        }
    }
}
