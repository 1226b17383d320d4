//! basic example: a small bounded ring of three caches, one key, one cache leaving
//!
//! run with `RUST_LOG=debug cargo run --example simple` to see placement and migration

use hashring_router::{BoundedStore, Node, RingConfig};
use tracing_subscriber::EnvFilter;

fn main() -> hashring_router::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 10 positions, at most 10 caches, keys kept on primary plus one replica
    let store: BoundedStore<i32, String> = BoundedStore::bounded(
        RingConfig::bounded(10, 10, 1),
        vec![Node::new("A"), Node::new("B"), Node::new("C")],
    )?;

    for node in store.nodes() {
        println!("{node} placed at {:?}", store.positions_of(&node));
    }

    store.put(5, "x".to_string())?;
    println!(
        "key 5 at position {} owned by {:?}",
        store.key_position(&5),
        store.owners(&5)?
    );

    for range in store.ownership() {
        println!("{:?} -> {:?}", range.range, range.nodes);
    }

    store.remove_node(&Node::new("B"))?;
    println!(
        "after B left, key 5 owned by {:?}, value {:?}",
        store.owners(&5)?,
        store.get(&5)
    );

    let report = store.add_node(Node::new("D"))?;
    println!(
        "D joined at {:?}, {} keys copied",
        store.positions_of(&Node::new("D")),
        report.copied
    );

    Ok(())
}
