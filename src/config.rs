//! Ring configuration.

#[cfg(feature = "derive")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Position space of the hashed variant (32-bit ring).
pub const DEFAULT_SPACE: u64 = 1 << 32;

/// Virtual nodes per real node for the hashed variant.
pub const DEFAULT_VIRTUAL_NODES: usize = 200;

/// Parameters shared by every ring flavour.
///
/// * `space` - size of the position space, positions live in `[0, space)`
/// * `virtual_nodes` - positions created per node (per unit of weight)
/// * `replication_factor` - additional owners per key beyond the primary
/// * `max_nodes` - optional cap on the number of nodes in the ring
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "derive", serde(default))]
pub struct RingConfig {
    pub space: u64,
    pub virtual_nodes: usize,
    pub replication_factor: usize,
    pub max_nodes: Option<usize>,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            space: DEFAULT_SPACE,
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            replication_factor: 0,
            max_nodes: None,
        }
    }
}

impl RingConfig {
    /// Config for the capacity-constrained variant: a small space, one position
    /// per node and a hard cap on node count.
    pub fn bounded(space: u64, max_nodes: usize, replication_factor: usize) -> Self {
        Self {
            space,
            virtual_nodes: 1,
            replication_factor,
            max_nodes: Some(max_nodes),
        }
    }

    pub fn with_space(mut self, space: u64) -> Self {
        self.space = space;
        self
    }

    pub fn with_virtual_nodes(mut self, virtual_nodes: usize) -> Self {
        self.virtual_nodes = virtual_nodes;
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: usize) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    /// Number of distinct owners each key should have.
    pub fn owner_count(&self) -> usize {
        self.replication_factor + 1
    }

    /// Check the config for values no ring could honor.
    pub fn validate(&self) -> Result<()> {
        if self.space == 0 {
            return Err(Error::InvalidConfig("space must be positive".into()));
        }
        if self.virtual_nodes == 0 {
            return Err(Error::InvalidConfig(
                "virtual_nodes must be positive".into(),
            ));
        }
        if let Some(max_nodes) = self.max_nodes {
            if max_nodes == 0 {
                return Err(Error::InvalidConfig("max_nodes must be positive".into()));
            }
            let positions = (max_nodes as u128) * (self.virtual_nodes as u128);
            if positions > self.space as u128 {
                return Err(Error::InvalidConfig(format!(
                    "{max_nodes} nodes with {} virtual nodes do not fit into a space of {}",
                    self.virtual_nodes, self.space
                )));
            }
            if self.replication_factor > max_nodes - 1 {
                return Err(Error::InvalidConfig(format!(
                    "replication factor {} cannot exceed max_nodes - 1 ({})",
                    self.replication_factor,
                    max_nodes - 1
                )));
            }
        }
        Ok(())
    }
}
