//! brief example how the ring keeps a cluster consistent if
//! - nodes join the cluster
//! - nodes are drained and leave the cluster
//! - a new cluster is deployed and every range has to be fetched from the old one
//!
//! and how request traffic is spread with the consistent hash and least connections balancers

use hashring_router::{
    Balancer, ConsistentHashBalancer, HashRing, HashedStore, LeastConnectionsBalancer, Node,
    OwnedRange, RequestContext, RingConfig,
};
use rand::{Rng, distr::Alphanumeric};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

fn main() -> hashring_router::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // each key is stored on 1 + 2 nodes, 20 positions per node
    let config = RingConfig::default()
        .with_virtual_nodes(20)
        .with_replication_factor(2);

    let store: HashedStore<String, String> = HashedStore::hashed(
        config.clone(),
        ["127.0.0.1", "127.0.0.2", "127.0.0.3", "127.0.0.4", "127.0.0.5"]
            .into_iter()
            .map(Node::new)
            .collect(),
    )?;

    let mut known_keys = vec![];
    for _ in 0..10000 {
        let value = random_string();
        let key = format!("key_{value}");
        known_keys.push(key.clone());
        store.put(key, value)?;
    }
    check_all(&store, &known_keys);

    let report = store.add_node(Node::new("127.0.0.6"))?;
    println!("\n# 127.0.0.6 joined: {report:?}");
    print_utilization(&store);
    check_all(&store, &known_keys);

    let report = store.drain_and_remove(&Node::new("127.0.0.3"))?;
    println!("\n# 127.0.0.3 drained and left: {report:?}");
    print_utilization(&store);
    check_all(&store, &known_keys);

    // a replacement deployment with different node ids gets entirely different
    // ranges, every node of it fetches crisscross from the old cluster
    let mut previous: HashRing<Node> = HashRing::new(config.clone())?;
    for node in store.nodes() {
        previous.add_node(node)?;
    }
    let mut replacement: HashRing<Node> = HashRing::new(config)?;
    for id in ["127.0.0.11", "127.0.0.12", "127.0.0.13", "127.0.0.14"] {
        replacement.add_node(Node::new(id))?;
    }

    println!("\n# transfers into the replacement cluster");
    for target in replacement.nodes() {
        let plan = replacement.transfer_plan(target, &previous, previous.nodes());
        let covered: u64 = plan
            .iter()
            .map(|OwnedRange { range, .. }| range.end() - range.start() + 1)
            .sum();
        println!(
            "{target} fetches {} ranges covering {covered} positions",
            plan.len()
        );
    }

    balance_requests()
}

fn balance_requests() -> hashring_router::Result<()> {
    let servers = ["10.0.0.1", "10.0.0.2", "10.0.0.3"];

    let hashed = ConsistentHashBalancer::with_servers(RingConfig::default(), servers)?;
    let mut per_server: HashMap<String, usize> = HashMap::new();
    for i in 0..3000 {
        let server = hashed.select_server(&RequestContext::new(format!("session-{i}")))?;
        *per_server.entry(server).or_default() += 1;
    }
    println!("\n# sessions per server on the ring: {per_server:?}");

    let least = LeastConnectionsBalancer::new(servers);
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let least = &least;
            scope.spawn(move || {
                for i in 0..50 {
                    let request = RequestContext::new(format!("worker-{worker}-{i}"));
                    match least.acquire(&request) {
                        Ok(connection) => {
                            std::thread::sleep(std::time::Duration::from_millis(1));
                            drop(connection);
                        }
                        Err(err) => println!("error: {err}"),
                    }
                }
            });
        }
    });
    for server in servers {
        println!(
            "{server} has {:?} open connections",
            least.active_connections(server)
        );
    }

    Ok(())
}

/// every key must be readable from its primary
fn check_all(store: &HashedStore<String, String>, keys: &[String]) {
    for key in keys {
        match store.get(key) {
            Ok(value) if format!("key_{value}") == *key => (),
            Ok(value) => println!("error: {key} holds unexpected value {value}"),
            Err(err) => println!("error: {key}: {err}"),
        }
    }
}

fn print_utilization(store: &HashedStore<String, String>) {
    for node in store.nodes() {
        match store.key_count(&node) {
            Ok(count) => println!("{node} contains {count} values"),
            Err(err) => println!("error: {err}"),
        }
    }
}

/// generate a random String to test that values are stored, retrieved and replicated correctly
fn random_string() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}
