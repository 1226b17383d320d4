//! Error types for ring mutation, routing and balancing.

use thiserror::Error;

/// Result type alias for ring operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the ring, the key-value store and the balancers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Adding the node would exceed the configured node cap.
    #[error("ring is full: capacity of {capacity} nodes reached")]
    RingFull { capacity: usize },

    /// Two placements landed on the same ring position.
    /// Retry with a different node id or replica salt.
    #[error("position {position} is already occupied")]
    PositionCollision { position: u64 },

    /// The node owns no position on the ring.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The node is already a member of the ring.
    #[error("node already present: {0}")]
    DuplicateNode(String),

    /// Lookup or write against an empty ring.
    #[error("no nodes available")]
    NoNodesAvailable,

    /// Selection against an empty server set.
    #[error("no servers available")]
    NoServersAvailable,

    /// No reachable owner holds the key.
    #[error("key not found")]
    NotFound,

    /// The request lacks what the strategy needs to route it.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Rejected configuration, fatal to the instance being built.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
