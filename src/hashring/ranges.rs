use std::fmt::Debug;
use std::ops::RangeInclusive;

#[cfg(feature = "derive")]
use serde::{Deserialize, Serialize};

use super::{HashRing, Position};

/// OwnedRange contains a range of ring positions and all nodes that store keys within it.
/// The first node in `nodes` is the primary node, the following nodes are replication nodes.
///
/// * `range` - positions whose keys are stored on the given nodes. Multiple ranges might apply to one node
/// * `nodes` - all nodes that store keys with a position in `range`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
pub struct OwnedRange<T> {
    pub range: RangeInclusive<Position>,
    pub nodes: Vec<T>,
}

impl<T, P> HashRing<T, P>
where
    T: Clone + Debug + PartialEq,
{
    /// Split the ring into arcs `(previous position, position]` and list the
    /// owners of each. The arc wrapping past the end of the space is split in
    /// two, so the result covers `[0, space)` exactly once.
    pub fn owned_ranges(&self, replication_factor: usize) -> Vec<OwnedRange<T>> {
        let count = replication_factor + 1;
        let max = self.config.space - 1;

        if self.members.len() == 1 {
            return vec![OwnedRange {
                range: 0..=max,
                nodes: self.members.clone(),
            }];
        }

        let mut ranges = vec![];

        let mut left = match self.ring.last() {
            Some(left) => left.position,
            None => return ranges,
        };

        for right in self.ring.iter() {
            let nodes = self.owners_at(right.position, count);
            if left >= right.position {
                if left < max {
                    ranges.push(OwnedRange {
                        range: left + 1..=max,
                        nodes: nodes.clone(),
                    });
                }
                ranges.push(OwnedRange {
                    range: 0..=right.position,
                    nodes,
                });
            } else {
                ranges.push(OwnedRange {
                    range: left + 1..=right.position,
                    nodes,
                });
            }

            left = right.position;
        }

        ranges
    }

    /// For `target`, a member of this ring, list the ranges it must fetch
    /// after the cluster changed from `previous` to `self`, and which nodes
    /// of `previous` can supply them.
    ///
    /// Covers nodes joining or leaving, nodes that are leaving but still
    /// serving (`available` lists everything that may be read from), and a
    /// complete replacement of one cluster by another.
    ///
    /// * `target` - node to compute the plan for
    /// * `previous` - ring state the keys currently follow
    /// * `available` - nodes of `previous` that may serve as sources
    pub fn transfer_plan<Q>(
        &self,
        target: &T,
        previous: &HashRing<T, Q>,
        available: &[T],
    ) -> Vec<OwnedRange<T>> {
        let replication_factor = self.config.replication_factor;
        let from = previous.owned_ranges(previous.config.replication_factor);
        let to = self.owned_ranges(replication_factor);

        let mut sources = vec![];

        for needed in to {
            if !needed.nodes.contains(target) {
                continue;
            }

            for supply in from.iter() {
                if let Some(range) = intersect(&needed.range, &supply.range) {
                    if supply.nodes.contains(target) {
                        continue;
                    }

                    let mut nodes = supply.nodes.clone();
                    nodes.retain(|n| available.contains(n));

                    sources.push(OwnedRange { range, nodes });
                }
            }
        }

        merge_adjacent(sources)
    }
}

// joins ranges that touch and share the same owner list
fn merge_adjacent<T: PartialEq>(mut ranges: Vec<OwnedRange<T>>) -> Vec<OwnedRange<T>> {
    ranges.sort_by(|a, b| a.range.start().cmp(b.range.start()));

    let mut merged: Vec<OwnedRange<T>> = Vec::with_capacity(ranges.len());

    for next in ranges {
        if let Some(current) = merged.last_mut() {
            if current.nodes == next.nodes
                && *current.range.end() < Position::MAX
                && *next.range.start() == current.range.end() + 1
            {
                current.range = *current.range.start()..=*next.range.end();
                continue;
            }
        }
        merged.push(next);
    }

    merged
}

fn intersect<T: Ord + Copy>(
    a: &RangeInclusive<T>,
    b: &RangeInclusive<T>,
) -> Option<RangeInclusive<T>> {
    let start = *a.start().max(b.start());
    let end = *a.end().min(b.end());

    if start <= end { Some(start..=end) } else { None }
}
