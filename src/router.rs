//! Key routing: map a key to a ring position and walk the ring to its owners.

use std::hash::{BuildHasher, Hash};

use crate::error::{Error, Result};
use crate::hashring::{DefaultHashBuilder, HashRing, Position};

/// Computes the ring position of a key. Independent of node placement.
pub trait KeyPosition<K: ?Sized> {
    fn key_position(&self, key: &K, space: u64) -> Position;
}

/// `hash(key) mod space`.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct HashedKeys<S = DefaultHashBuilder> {
    hash_builder: S,
}

impl<S> HashedKeys<S> {
    pub fn with_hasher(hash_builder: S) -> HashedKeys<S> {
        HashedKeys { hash_builder }
    }
}

impl<K, S> KeyPosition<K> for HashedKeys<S>
where
    K: Hash + ?Sized,
    S: BuildHasher,
{
    fn key_position(&self, key: &K, space: u64) -> Position {
        self.hash_builder.hash_one(key) % space
    }
}

/// `key mod space` for integer keys.
///
/// Not a hash: adjacent keys land on adjacent positions and cluster
/// predictably. Kept for the small bounded ring, where placement of integer
/// keys must stay exactly as observed. Negative keys wrap with Euclidean
/// remainder.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ModuloKeys;

macro_rules! modulo_unsigned {
    ($($t:ty),*) => {
        $(
            impl KeyPosition<$t> for ModuloKeys {
                fn key_position(&self, key: &$t, space: u64) -> Position {
                    (*key as u64) % space
                }
            }
        )*
    };
}

macro_rules! modulo_signed {
    ($($t:ty),*) => {
        $(
            impl KeyPosition<$t> for ModuloKeys {
                fn key_position(&self, key: &$t, space: u64) -> Position {
                    (*key as i128).rem_euclid(space as i128) as Position
                }
            }
        )*
    };
}

modulo_unsigned!(u8, u16, u32, u64, usize);
modulo_signed!(i8, i16, i32, i64, isize);

/// Resolves keys to the nodes owning them. Holds no ring state of its own, so
/// one router can serve any number of ring snapshots.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct KeyRouter<H = HashedKeys> {
    keys: H,
}

impl KeyRouter<HashedKeys> {
    pub fn hashed() -> KeyRouter<HashedKeys> {
        KeyRouter::default()
    }
}

impl KeyRouter<ModuloKeys> {
    pub fn modulo() -> KeyRouter<ModuloKeys> {
        KeyRouter { keys: ModuloKeys }
    }
}

impl<H> KeyRouter<H> {
    pub fn new(keys: H) -> KeyRouter<H> {
        KeyRouter { keys }
    }

    /// Position of `key` in the space of `ring`.
    pub fn key_position<K, T, P>(&self, ring: &HashRing<T, P>, key: &K) -> Position
    where
        K: ?Sized,
        H: KeyPosition<K>,
    {
        self.keys.key_position(key, ring.space())
    }

    /// The node owning the ceiling of the key's position, wrapping.
    pub fn primary_owner<'a, K, T, P>(&self, ring: &'a HashRing<T, P>, key: &K) -> Result<&'a T>
    where
        K: ?Sized,
        H: KeyPosition<K>,
        T: PartialEq + Clone,
    {
        let position = self.key_position(ring, key);
        ring.ceiling(position).ok_or(Error::NoNodesAvailable)
    }

    /// Primary and replica owners of `key`, using the ring's replication factor.
    pub fn owners<K, T, P>(&self, ring: &HashRing<T, P>, key: &K) -> Vec<T>
    where
        K: ?Sized,
        H: KeyPosition<K>,
        T: PartialEq + Clone,
    {
        self.owners_with(ring, key, ring.replication_factor())
    }

    /// Up to `replication_factor + 1` distinct owners of `key`, primary first.
    /// Returns what is available when the ring has fewer nodes.
    pub fn owners_with<K, T, P>(
        &self,
        ring: &HashRing<T, P>,
        key: &K,
        replication_factor: usize,
    ) -> Vec<T>
    where
        K: ?Sized,
        H: KeyPosition<K>,
        T: PartialEq + Clone,
    {
        let position = self.key_position(ring, key);
        ring.owners_at(position, replication_factor + 1)
    }
}
