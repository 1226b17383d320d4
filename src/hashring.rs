use siphasher::sip::SipHasher;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::BuildHasher;

use crate::config::RingConfig;
use crate::error::Result;

mod crud;
mod iterator;
pub mod placement;
pub mod ranges;

pub use iterator::HashRingIterator;
use placement::{GapBisection, HashedPlacement};

/// A point on the ring, always in `[0, space)`.
pub type Position = u64;

#[derive(Clone, PartialEq, Debug, Default)]
pub struct DefaultHashBuilder;

impl BuildHasher for DefaultHashBuilder {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher::new()
    }
}

// VirtualNode binds one ring position to the node owning it
#[derive(Clone, Debug)]
struct VirtualNode<T> {
    position: Position,
    node: T,
    replica: usize,
}

impl<T> VirtualNode<T> {
    fn new(position: Position, node: T, replica: usize) -> VirtualNode<T> {
        VirtualNode {
            position,
            node,
            replica,
        }
    }
}

// Positions are unique within a ring, so ordering by position is total
impl<T> PartialEq for VirtualNode<T> {
    fn eq(&self, other: &VirtualNode<T>) -> bool {
        self.position == other.position
    }
}

impl<T> Eq for VirtualNode<T> {}

impl<T> PartialOrd for VirtualNode<T> {
    fn partial_cmp(&self, other: &VirtualNode<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for VirtualNode<T> {
    fn cmp(&self, other: &VirtualNode<T>) -> Ordering {
        self.position.cmp(&other.position)
    }
}

/// HashRing is the sorted set of position -> node bindings of one cluster.
///
/// Nodes are placed by a [`placement::PlacementPolicy`]: hashed placement for large
/// spaces with many virtual nodes, gap bisection for small bounded rings.
/// Lookups walk the ring clockwise from a position, wrapping past the last
/// position back to the first one.
///
/// Topology states are only `Empty` and `Populated`; every operation is a
/// function of the current node set.
#[derive(Clone, PartialEq, Debug)]
pub struct HashRing<T, P = HashedPlacement> {
    placement: P,
    ring: Vec<VirtualNode<T>>,
    members: Vec<T>,
    config: RingConfig,
}

impl<T> HashRing<T> {
    /// Create a hashed `HashRing`.
    ///
    /// # Arguments
    ///
    /// * `config` - space, virtual nodes per node, replication factor and optional node cap
    ///
    /// # Examples
    ///
    /// ```
    /// use hashring_router::{HashRing, RingConfig};
    ///
    /// let mut ring: HashRing<String> = HashRing::new(RingConfig::default()).unwrap();
    /// ring.add_node("10.0.0.1".to_string()).unwrap();
    /// assert_eq!(ring.node_count(), 1);
    /// assert_eq!(ring.position_count(), 200);
    /// ```
    pub fn new(config: RingConfig) -> Result<HashRing<T>> {
        HashRing::with_placement(config, HashedPlacement::default())
    }
}

impl<T> HashRing<T, GapBisection> {
    /// Create a capacity-constrained ring placing every node in the middle of
    /// the largest free interval.
    pub fn bounded(config: RingConfig) -> Result<HashRing<T, GapBisection>> {
        HashRing::with_placement(config, GapBisection)
    }
}

impl<T, P> HashRing<T, P> {
    /// Creates an empty `HashRing` which will use the given placement policy.
    ///
    /// Fails with `InvalidConfig` if `config` does not validate.
    pub fn with_placement(config: RingConfig, placement: P) -> Result<HashRing<T, P>> {
        config.validate()?;
        Ok(HashRing {
            placement,
            ring: Vec::new(),
            members: Vec::new(),
            config,
        })
    }

    /// Get the number of real nodes in the hash ring.
    pub fn node_count(&self) -> usize {
        self.members.len()
    }

    /// Get the number of positions (virtual nodes) in the hash ring.
    pub fn position_count(&self) -> usize {
        self.ring.len()
    }

    /// Returns true if the ring has no nodes.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// All real nodes in the order they joined.
    pub fn nodes(&self) -> &[T] {
        &self.members
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn space(&self) -> u64 {
        self.config.space
    }

    pub fn replication_factor(&self) -> usize {
        self.config.replication_factor
    }

    pub fn placement(&self) -> &P {
        &self.placement
    }
}
