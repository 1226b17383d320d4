use super::{HashRing, Position, VirtualNode};

/// Owning iterator over `(position, node)` bindings in ascending position order.
pub struct HashRingIterator<T> {
    ring: std::vec::IntoIter<VirtualNode<T>>,
}

impl<T> Iterator for HashRingIterator<T> {
    type Item = (Position, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.ring.next().map(|vnode| (vnode.position, vnode.node))
    }
}

impl<T, P> IntoIterator for HashRing<T, P> {
    type Item = (Position, T);

    type IntoIter = HashRingIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        HashRingIterator {
            ring: self.ring.into_iter(),
        }
    }
}

impl<T, P> HashRing<T, P> {
    /// Borrowing iterator over `(position, node)` bindings in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &T)> {
        self.ring.iter().map(|vnode| (vnode.position, &vnode.node))
    }

    /// Like [`HashRing::iter`], additionally yielding the replica index of
    /// each position.
    pub fn iter_replicas(&self) -> impl Iterator<Item = (Position, &T, usize)> {
        self.ring
            .iter()
            .map(|vnode| (vnode.position, &vnode.node, vnode.replica))
    }
}
