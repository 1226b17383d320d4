//! Consistent-hash partitioning of keys across a changing set of nodes.
//!
//! Nodes are placed on a ring of `space` positions, each with one or more
//! virtual positions. A key belongs to the first position at or clockwise
//! from the key's own position, and is replicated to the next distinct nodes
//! after it.
//!
//! Two placements are supported:
//!     Hashed: each virtual position is `hash(node#replica) mod space`
//!     Gap bisection: each new node takes the midpoint of the largest free arc, so placement only depends on join order
//!
//! On top of the ring:
//!     [`KeyRouter`] maps keys to positions and owners
//!     [`ConsistentHashStore`] keeps per node key-value stores and moves keys on join and leave through the [`Rebalancer`]
//!     [`ConsistentHashBalancer`] picks a server per request, next to the simpler [`strategies`]
//!

pub mod balancer;
pub mod config;
pub mod error;
pub mod hashring;
pub mod kv;
pub mod node;
pub mod rebalancer;
pub mod router;
pub mod store;
pub mod strategies;

pub use balancer::{Balancer, ConsistentHashBalancer, RequestContext};
pub use config::RingConfig;
pub use error::{Error, Result};
pub use hashring::placement::{GapBisection, HashedPlacement, PlacementPolicy};
pub use hashring::ranges::OwnedRange;
pub use hashring::{DefaultHashBuilder, HashRing, HashRingIterator, Position};
pub use kv::{BoundedStore, ConsistentHashStore, HashedStore, PutOutcome};
pub use node::Node;
pub use rebalancer::{MigrationReport, Rebalancer};
pub use router::{HashedKeys, KeyPosition, KeyRouter, ModuloKeys};
pub use store::{MemoryStore, NodeStore};
pub use strategies::{
    ConnectionGuard, GeolocationBalancer, IpHashBalancer, LeastConnectionsBalancer,
    LeastResponseTimeBalancer, ResponseTimer, RoundRobinBalancer, WeightedBalancer,
};
