//! Fixed-capacity traversal stack of (node, entry distance) pairs.

use crate::node::{NodeRef, MAX_DEPTH};

/// Entries needed by a hierarchy of [`MAX_DEPTH`] levels.
pub(crate) const STACK_CAPACITY: usize = 3 * MAX_DEPTH + 1;

/// LIFO stack with the [`NodeRef::Invalid`] sentinel at index 0.
///
/// Popping the sentinel signals an exhausted traversal. Pushing past
/// `3 * max_depth + 1` entries means the hierarchy is deeper than it
/// claims and panics.
pub(crate) struct TraversalStack<D> {
    nodes: [NodeRef; STACK_CAPACITY],
    dists: [D; STACK_CAPACITY],
    len: usize,
    bound: usize,
    peak: usize,
}

impl<D: Copy> TraversalStack<D> {
    /// Stack for a hierarchy of `max_depth` levels, holding only the sentinel.
    pub fn new(max_depth: usize, sentinel_dist: D) -> Self {
        let bound = 3 * max_depth.max(1) + 1;
        assert!(
            bound <= STACK_CAPACITY,
            "hierarchy depth {} exceeds the supported maximum of {}",
            max_depth,
            MAX_DEPTH
        );
        let mut stack = Self {
            nodes: [NodeRef::Invalid; STACK_CAPACITY],
            dists: [sentinel_dist; STACK_CAPACITY],
            len: 0,
            bound,
            peak: 0,
        };
        stack.push(NodeRef::Invalid, sentinel_dist);
        stack
    }

    #[inline]
    pub fn push(&mut self, node: NodeRef, dist: D) {
        assert!(
            self.len < self.bound,
            "traversal stack overflow: more than {} entries",
            self.bound
        );
        self.nodes[self.len] = node;
        self.dists[self.len] = dist;
        self.len += 1;
        self.peak = self.peak.max(self.len);
    }

    #[inline]
    pub fn pop(&mut self) -> (NodeRef, D) {
        debug_assert!(self.len > 0, "pop past the stack sentinel");
        self.len -= 1;
        (self.nodes[self.len], self.dists[self.len])
    }

    /// Drop entries above the sentinel for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&D) -> bool) {
        let mut kept = 1.min(self.len);
        for i in kept..self.len {
            if keep(&self.dists[i]) {
                self.nodes[kept] = self.nodes[i];
                self.dists[kept] = self.dists[i];
                kept += 1;
            }
        }
        self.len = kept;
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Most entries held at once.
    pub fn peak(&self) -> usize {
        self.peak
    }
}
