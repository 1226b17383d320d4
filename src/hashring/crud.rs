use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

use tracing::debug;

use super::placement::PlacementPolicy;
use super::{HashRing, Position, VirtualNode};
use crate::error::{Error, Result};

impl<T, P> HashRing<T, P>
where
    T: Hash + Eq + Clone + Debug + Display,
    P: PlacementPolicy,
{
    /// Add `node` with the configured number of virtual nodes.
    pub fn add_node(&mut self, node: T) -> Result<Vec<Position>> {
        let count = self.config.virtual_nodes;
        self.add_node_with_count(node, count)
    }

    /// Add `node` represented by `count` positions.
    ///
    /// Either every position is inserted or the ring stays untouched:
    /// `RingFull`, `DuplicateNode` and `PositionCollision` are all detected
    /// before the first insertion.
    pub fn add_node_with_count(&mut self, node: T, count: usize) -> Result<Vec<Position>> {
        let positions = self.place_with_count(&node, count)?;

        for (replica, position) in positions.iter().enumerate() {
            self.ring
                .push(VirtualNode::new(*position, node.clone(), replica));
        }
        self.ring.sort();

        debug!(%node, ?positions, "added node to ring");
        self.members.push(node);
        Ok(positions)
    }

    /// Number of positions for a node of `weight`: the configured virtual
    /// node count times the weight. Capped rings and placements that read
    /// occupancy keep the configured count, so a bounded ring holds exactly
    /// one position per node whatever the weight.
    pub fn positions_for_weight(&self, weight: u32) -> usize {
        let virtual_nodes = self.config.virtual_nodes;
        if self.config.max_nodes.is_some() || self.placement.reads_occupancy() {
            return virtual_nodes;
        }
        virtual_nodes * weight.max(1) as usize
    }

    /// Compute the positions `node` would get with the configured virtual
    /// node count, without mutating the ring.
    pub fn place(&self, node: &T) -> Result<Vec<Position>> {
        self.place_with_count(node, self.config.virtual_nodes)
    }

    /// Compute the positions `node` would get with `count` virtual nodes.
    pub fn place_with_count(&self, node: &T, count: usize) -> Result<Vec<Position>> {
        if self.contains(node) {
            return Err(Error::DuplicateNode(node.to_string()));
        }
        if let Some(capacity) = self.config.max_nodes {
            if self.members.len() >= capacity {
                return Err(Error::RingFull { capacity });
            }
        }

        let space = self.config.space;
        let mut pending: Vec<Position> = Vec::with_capacity(count.max(1));

        for replica in 0..count.max(1) {
            let position = if !self.placement.reads_occupancy() {
                self.placement
                    .place(node, replica, std::iter::empty(), space)
            } else if pending.is_empty() {
                self.placement
                    .place(node, replica, self.ring.iter().map(|v| v.position), space)
            } else {
                let mut occupied: Vec<Position> = self
                    .ring
                    .iter()
                    .map(|v| v.position)
                    .chain(pending.iter().copied())
                    .collect();
                occupied.sort_unstable();
                self.placement
                    .place(node, replica, occupied.into_iter(), space)
            };

            if self.index_of(position).is_ok() || pending.contains(&position) {
                return Err(Error::PositionCollision { position });
            }
            pending.push(position);
        }

        Ok(pending)
    }

    /// Remove `node` and every position it owns.
    pub fn remove_node(&mut self, node: &T) -> Result<Vec<Position>> {
        if !self.contains(node) {
            return Err(Error::UnknownNode(node.to_string()));
        }

        let positions = self.positions_of(node);
        self.ring.retain(|v| v.node != *node);
        self.members.retain(|m| m != node);

        debug!(%node, ?positions, "removed node from ring");
        Ok(positions)
    }

    /// Remove the node owning the highest position.
    pub fn remove_last(&mut self) -> Result<T> {
        let node = match self.ring.last() {
            Some(last) => last.node.clone(),
            None => return Err(Error::NoNodesAvailable),
        };
        self.remove_node(&node)?;
        Ok(node)
    }
}

impl<T, P> HashRing<T, P>
where
    T: PartialEq + Clone,
{
    /// Returns true if `node` owns at least one position.
    pub fn contains(&self, node: &T) -> bool {
        self.members.contains(node)
    }

    /// Positions owned by `node`, ascending.
    pub fn positions_of(&self, node: &T) -> Vec<Position> {
        self.ring
            .iter()
            .filter(|v| v.node == *node)
            .map(|v| v.position)
            .collect()
    }

    /// Node owning the smallest position strictly greater than `position`,
    /// wrapping to the first position.
    pub fn successor_of(&self, position: Position) -> Option<&T> {
        if self.ring.is_empty() {
            return None;
        }
        let n = self.ring.partition_point(|v| v.position <= position);
        Some(&self.ring[n % self.ring.len()].node)
    }

    /// Node owning the largest position strictly smaller than `position`,
    /// wrapping to the last position.
    pub fn predecessor_of(&self, position: Position) -> Option<&T> {
        if self.ring.is_empty() {
            return None;
        }
        let n = self.ring.partition_point(|v| v.position < position);
        let n = if n == 0 { self.ring.len() - 1 } else { n - 1 };
        Some(&self.ring[n].node)
    }

    /// Node owning the smallest position greater or equal to `position`,
    /// wrapping to the first position.
    pub fn ceiling(&self, position: Position) -> Option<&T> {
        if self.ring.is_empty() {
            return None;
        }
        Some(&self.ring[self.ceiling_index(position)].node)
    }

    /// The lowest binding on the ring.
    pub fn first(&self) -> Option<(Position, &T)> {
        self.ring.first().map(|v| (v.position, &v.node))
    }

    /// The highest binding on the ring.
    pub fn last(&self) -> Option<(Position, &T)> {
        self.ring.last().map(|v| (v.position, &v.node))
    }

    /// Walk clockwise from the ceiling of `position` and collect up to `count`
    /// distinct nodes. Returns fewer if the ring has fewer nodes, and an empty
    /// list for an empty ring.
    pub fn owners_at(&self, position: Position, count: usize) -> Vec<T> {
        if self.ring.is_empty() {
            return vec![];
        }

        let limit = count.min(self.members.len());
        let n = self.ceiling_index(position);

        let mut owners: Vec<T> = Vec::with_capacity(limit);

        for vnode in self.ring[n..].iter().chain(self.ring[..n].iter()) {
            if owners.len() == limit {
                break;
            }
            if !owners.contains(&vnode.node) {
                owners.push(vnode.node.clone());
            }
        }

        owners
    }

    fn ceiling_index(&self, position: Position) -> usize {
        let n = match self.index_of(position) {
            Err(n) => n,
            Ok(n) => n,
        };
        n % self.ring.len()
    }

    fn index_of(&self, position: Position) -> std::result::Result<usize, usize> {
        self.ring.binary_search_by(|v| v.position.cmp(&position))
    }
}
