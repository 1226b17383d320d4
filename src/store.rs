//! Per-node key/value storage used by the consistent-hash store.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::ops::RangeInclusive;

use parking_lot::RwLock;

use crate::hashring::Position;

/// Storage held by one node of the ring.
///
/// The ring only decides which node holds a key; how the node keeps it is up
/// to the implementation. Every entry is stored with the ring position of its
/// key, so a migration can read one arc without scanning the whole store.
/// All implementations must be `Send + Sync`.
pub trait NodeStore<K, V>: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, position: Position, key: K, value: V);

    fn get(&self, position: Position, key: &K) -> Option<V>;

    /// Remove `key`, returning the value it held.
    fn remove(&self, position: Position, key: &K) -> Option<V>;

    /// Entries whose position lies in `range`, ascending by position.
    fn range(&self, range: RangeInclusive<Position>) -> Vec<(Position, K, V)>;

    /// Snapshot of every stored entry, ascending by position.
    fn entries(&self) -> Vec<(Position, K, V)> {
        self.range(0..=Position::MAX)
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Entries<K, V> {
    by_position: BTreeMap<Position, HashMap<K, V>>,
    len: usize,
}

/// In-memory node store: a `BTreeMap` of positions, each holding the keys
/// that hash to it.
#[derive(Debug)]
pub struct MemoryStore<K, V> {
    entries: RwLock<Entries<K, V>>,
}

impl<K, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Entries {
                by_position: BTreeMap::new(),
                len: 0,
            }),
        }
    }
}

impl<K, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> NodeStore<K, V> for MemoryStore<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn put(&self, position: Position, key: K, value: V) {
        let mut entries = self.entries.write();
        let replaced = entries
            .by_position
            .entry(position)
            .or_default()
            .insert(key, value);
        if replaced.is_none() {
            entries.len += 1;
        }
    }

    fn get(&self, position: Position, key: &K) -> Option<V> {
        self.entries
            .read()
            .by_position
            .get(&position)
            .and_then(|keys| keys.get(key))
            .cloned()
    }

    fn remove(&self, position: Position, key: &K) -> Option<V> {
        let mut entries = self.entries.write();
        let keys = entries.by_position.get_mut(&position)?;
        let removed = keys.remove(key)?;
        if keys.is_empty() {
            entries.by_position.remove(&position);
        }
        entries.len -= 1;
        Some(removed)
    }

    fn range(&self, range: RangeInclusive<Position>) -> Vec<(Position, K, V)> {
        self.entries
            .read()
            .by_position
            .range(range)
            .flat_map(|(position, keys)| {
                keys.iter()
                    .map(move |(k, v)| (*position, k.clone(), v.clone()))
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn put_get_remove() {
        let store: MemoryStore<i32, String> = MemoryStore::new();
        assert!(store.is_empty());

        store.put(1, 1, "one".to_string());
        store.put(2, 2, "two".to_string());
        store.put(1, 1, "uno".to_string());

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1, &1), Some("uno".to_string()));
        assert_eq!(store.remove(1, &1), Some("uno".to_string()));
        assert_eq!(store.get(1, &1), None);
        assert_eq!(store.remove(1, &1), None);
        assert_eq!(store.len(), 1);

        assert_eq!(store.entries(), vec![(2, 2, "two".to_string())]);
    }

    #[test]
    fn range_only_reads_the_requested_positions() {
        let store: MemoryStore<&str, u32> = MemoryStore::new();
        store.put(3, "a", 1);
        store.put(3, "b", 2);
        store.put(7, "c", 3);
        store.put(u64::MAX, "d", 4);

        let mut found = store.range(2..=4);
        found.sort();
        assert_eq!(vec![(3, "a", 1), (3, "b", 2)], found);

        assert_eq!(store.range(8..=9), vec![]);
        assert_eq!(store.range(7..=u64::MAX).len(), 2);
        assert_eq!(store.len(), 4);
    }
}
