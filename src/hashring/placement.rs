//! Placement policies decide where a node's positions land on the ring.

use std::hash::{BuildHasher, Hash};

use super::{DefaultHashBuilder, Position};

/// Maps (node identity, replica index) to a ring position.
pub trait PlacementPolicy {
    /// Compute the position of replica `replica` of `node`.
    ///
    /// `occupied` yields every taken position in ascending order. Policies
    /// that ignore ring contents never advance it.
    fn place<T, I>(&self, node: &T, replica: usize, occupied: I, space: u64) -> Position
    where
        T: Hash + ?Sized,
        I: Iterator<Item = Position>;

    /// True if `place` reads `occupied`; the ring skips collecting positions otherwise.
    fn reads_occupancy(&self) -> bool {
        false
    }
}

/// Position is the hash of the node salted with the replica index, reduced
/// into the space. Independent of what the ring already holds.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct HashedPlacement<S = DefaultHashBuilder> {
    hash_builder: S,
}

impl<S> HashedPlacement<S> {
    pub fn with_hasher(hash_builder: S) -> HashedPlacement<S> {
        HashedPlacement { hash_builder }
    }
}

impl<S: BuildHasher> PlacementPolicy for HashedPlacement<S> {
    fn place<T, I>(&self, node: &T, replica: usize, _occupied: I, space: u64) -> Position
    where
        T: Hash + ?Sized,
        I: Iterator<Item = Position>,
    {
        self.hash_builder.hash_one((node, '#', replica)) % space
    }
}

/// Position is the midpoint of the largest uncovered interval, with sentinels
/// at `-1` and `space`. Ties go to the first interval in ascending order.
///
/// Each placement scans every occupied position, so this is meant for rings
/// with a small, capped node count.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct GapBisection;

impl PlacementPolicy for GapBisection {
    fn place<T, I>(&self, _node: &T, _replica: usize, occupied: I, space: u64) -> Position
    where
        T: Hash + ?Sized,
        I: Iterator<Item = Position>,
    {
        let mut left: i128 = -1;
        let mut largest_gap: i128 = 0;
        let mut midpoint: i128 = 0;

        for right in occupied.map(i128::from).chain(std::iter::once(space as i128)) {
            let gap = right - left;
            if gap > largest_gap {
                largest_gap = gap;
                // integer division truncates toward zero, so (-1 + 0) / 2 == 0
                midpoint = (left + right) / 2;
            }
            left = right;
        }

        midpoint as Position
    }

    fn reads_occupancy(&self) -> bool {
        true
    }
}
