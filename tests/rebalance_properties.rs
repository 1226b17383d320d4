use std::collections::HashSet;

use hashring_router::{
    BoundedStore, ConsistentHashBalancer, Error, HashRing, HashedStore, KeyRouter, Node,
    RingConfig,
};
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng, rngs::StdRng};

const KEYS: usize = 10_000;

fn hashed_ring(nodes: usize, replication_factor: usize) -> HashRing<Node> {
    let config = RingConfig::default().with_replication_factor(replication_factor);
    let mut ring = HashRing::new(config).unwrap();
    for i in 0..nodes {
        ring.add_node(Node::new(format!("node-{i}"))).unwrap();
    }
    ring
}

fn keys() -> Vec<String> {
    (0..KEYS).map(|i| format!("key-{i}")).collect()
}

fn primaries(ring: &HashRing<Node>, keys: &[String]) -> Vec<Node> {
    let router = KeyRouter::hashed();
    keys.iter()
        .map(|key| router.primary_owner(ring, key.as_str()).unwrap().clone())
        .collect()
}

#[test]
fn adding_a_node_only_moves_keys_to_it() {
    let keys = keys();
    let mut ring = hashed_ring(5, 0);
    let before = primaries(&ring, &keys);

    let joined = Node::new("node-5");
    ring.add_node(joined.clone()).unwrap();
    let after = primaries(&ring, &keys);

    let mut moved = 0;
    for (old, new) in before.iter().zip(after.iter()) {
        if old != new {
            assert_eq!(&joined, new);
            moved += 1;
        }
    }

    // expected share is 1 / 6 of the keys
    assert!(moved > 0);
    assert!(moved <= 2 * KEYS / 6, "{moved} keys moved");
}

#[test]
fn removing_a_node_only_moves_its_keys() {
    let keys = keys();
    let mut ring = hashed_ring(6, 0);
    let before = primaries(&ring, &keys);

    let leaving = Node::new("node-2");
    ring.remove_node(&leaving).unwrap();
    let after = primaries(&ring, &keys);

    for (old, new) in before.iter().zip(after.iter()) {
        assert_ne!(&leaving, new);
        if old != &leaving {
            assert_eq!(old, new);
        }
    }
}

#[test]
fn owners_are_distinct_and_capped_by_node_count() {
    let router = KeyRouter::hashed();
    let mut rng = StdRng::seed_from_u64(42);

    for nodes in 1..=5 {
        let ring = hashed_ring(nodes, 2);
        for _ in 0..200 {
            let key: u64 = rng.random_range(0..u64::MAX);
            let owners = router.owners(&ring, &key);

            let distinct: HashSet<&Node> = owners.iter().collect();
            assert_eq!(owners.len(), distinct.len());
            assert_eq!(owners.len(), nodes.min(3));
            assert_eq!(&owners[0], router.primary_owner(&ring, &key).unwrap());
        }
    }
}

#[test]
fn replicas_survive_removal_of_the_primary() {
    let mut rng = StdRng::seed_from_u64(7);
    let nodes: Vec<Node> = (0..5).map(|i| Node::new(format!("node-{i}"))).collect();
    let config = RingConfig::default()
        .with_virtual_nodes(50)
        .with_replication_factor(1);
    let store: HashedStore<u64, u64> = HashedStore::hashed(config, nodes.clone()).unwrap();

    let keys: Vec<u64> = (0..2000).map(|_| rng.random_range(0..1_000_000)).collect();
    for key in &keys {
        store.put(*key, key * 2).unwrap();
    }

    let leaving = &nodes[rng.random_range(0..nodes.len())];
    store.remove_node(leaving).unwrap();

    for key in &keys {
        assert_eq!(store.get(key), Ok(key * 2));
    }
}

#[test]
fn joins_keep_every_key_readable() {
    let config = RingConfig::default().with_virtual_nodes(50);
    let store: HashedStore<u64, u64> = HashedStore::hashed(
        config,
        vec![Node::new("a"), Node::new("b"), Node::new("c")],
    )
    .unwrap();

    for key in 0..3000 {
        store.put(key, key + 1).unwrap();
    }

    let report = store.add_node(Node::new("d")).unwrap();
    assert_eq!(report.copied, report.moved);
    assert!(report.copied > 0);

    // without replication every key lives on exactly one node
    let total: usize = store
        .nodes()
        .iter()
        .map(|node| store.key_count(node).unwrap())
        .sum();
    assert_eq!(total, 3000);
    assert_eq!(store.key_count(&Node::new("d")), Ok(report.copied));

    for key in 0..3000 {
        assert_eq!(store.get(&key), Ok(key + 1));
    }
}

#[test]
fn weighted_nodes_take_a_larger_share() {
    let config = RingConfig::default().with_virtual_nodes(100);
    let store: HashedStore<u64, u64> = HashedStore::hashed(
        config,
        vec![
            Node::new("small"),
            Node::new("medium"),
            Node::with_weight("large", 4),
        ],
    )
    .unwrap();

    assert_eq!(store.positions_of(&Node::new("large")).len(), 400);

    for key in 0..6000 {
        store.put(key, key).unwrap();
    }
    let large = store.key_count(&Node::new("large")).unwrap();
    let small = store.key_count(&Node::new("small")).unwrap();
    assert!(large > 2 * small, "large {large}, small {small}");
}

#[test]
fn gap_bisection_depends_only_on_join_order() {
    let build = || {
        let mut ring: HashRing<Node, _> =
            HashRing::bounded(RingConfig::bounded(1000, 10, 0)).unwrap();
        for i in 0..10 {
            ring.add_node(Node::new(format!("cache-{i}"))).unwrap();
        }
        ring
    };

    let first = build();
    let second = build();

    let positions: Vec<u64> = first.iter().map(|(position, _)| position).collect();
    assert_eq!(
        positions,
        second.iter().map(|(position, _)| position).collect::<Vec<_>>()
    );
    assert_eq!(positions.len(), 10);
    assert_eq!(first.positions_of(&Node::new("cache-0")), vec![499]);

    let mut full = first;
    assert_eq!(
        full.add_node(Node::new("cache-10")),
        Err(Error::RingFull { capacity: 10 })
    );
}

#[test]
fn bounded_store_rejects_nodes_past_capacity() {
    let store: BoundedStore<u32, &str> = BoundedStore::bounded(
        RingConfig::bounded(10, 3, 0),
        vec![Node::new("A"), Node::new("B"), Node::new("C")],
    )
    .unwrap();

    assert_eq!(
        store.add_node(Node::new("D")),
        Err(Error::RingFull { capacity: 3 })
    );
    assert_eq!(store.node_count(), 3);

    assert_eq!(store.remove_last(), Ok(Node::new("B")));
    store.add_node(Node::new("D")).unwrap();
    assert_eq!(store.node_count(), 3);
}

#[test]
fn weighted_nodes_on_a_bounded_ring_take_one_position() {
    let store: BoundedStore<u32, &str> = BoundedStore::bounded(
        RingConfig::bounded(10, 3, 0),
        vec![Node::with_weight("A", 3), Node::new("B")],
    )
    .unwrap();
    store.add_node(Node::with_weight("C", 2)).unwrap();

    let positions: Vec<u64> = store
        .nodes()
        .iter()
        .flat_map(|node| store.positions_of(node))
        .collect();
    assert_eq!(positions, vec![4, 7, 1]);
}

#[test]
fn construction_needs_enough_owners_for_the_replication_factor() {
    let config = RingConfig::default().with_replication_factor(5);

    assert!(matches!(
        ConsistentHashBalancer::with_servers(config.clone(), ["s1", "s2"]),
        Err(Error::InvalidConfig(_))
    ));

    let store: Result<HashedStore<u64, u64>, Error> =
        HashedStore::hashed(config, vec![Node::new("a"), Node::new("b")]);
    assert!(matches!(store, Err(Error::InvalidConfig(_))));
}

#[test]
fn joins_read_about_their_share_of_the_keys() {
    let mut rng = StdRng::seed_from_u64(11);
    let nodes: Vec<Node> = (0..5).map(|i| Node::new(format!("node-{i}"))).collect();
    let store: HashedStore<u64, u64> = HashedStore::hashed(RingConfig::default(), nodes).unwrap();

    let keys: HashSet<u64> = (0..KEYS).map(|_| rng.random_range(0..u64::MAX)).collect();
    for key in &keys {
        store.put(*key, *key).unwrap();
    }

    let report = store.add_node(Node::new("node-5")).unwrap();
    assert!(report.scanned <= 2 * keys.len() / 6, "{report:?}");
    assert_eq!(report.scanned, report.moved);
}
