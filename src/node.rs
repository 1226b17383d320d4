use std::fmt::Display;
use std::hash::{Hash, Hasher};

#[cfg(feature = "derive")]
use serde::{Deserialize, Serialize};

/// Identity of a backend: a server address or a cache shard.
///
/// Equality and hashing only look at `id`, so the weight never changes where
/// a node lands on the ring.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
pub struct Node {
    id: String,
    weight: u32,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Node {
        Node {
            id: id.into(),
            weight: 1,
        }
    }

    /// A node with `weight` times the configured virtual node count.
    /// A weight of zero is raised to one.
    pub fn with_weight(id: impl Into<String>, weight: u32) -> Node {
        Node {
            id: id.into(),
            weight: weight.max(1),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl From<&str> for Node {
    fn from(id: &str) -> Self {
        Node::new(id)
    }
}
