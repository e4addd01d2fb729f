//! Traversal counters.

use std::ops::AddAssign;

/// Work counters accumulated by a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Internal nodes whose children were box-tested.
    pub nodes: u64,
    /// Leaves whose primitives were tested.
    pub leaves: u64,
    /// Ray-triangle tests, counted per ray.
    pub primitives: u64,
    /// Lanes split off into single-ray traversal.
    pub single_ray_forks: u64,
    /// Packet descents cut short by the descent lane check.
    pub descent_switches: u64,
    /// Largest number of entries held by any traversal stack.
    pub max_stack_depth: usize,
}

impl AddAssign for TraversalStats {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes += rhs.nodes;
        self.leaves += rhs.leaves;
        self.primitives += rhs.primitives;
        self.single_ray_forks += rhs.single_ray_forks;
        self.descent_switches += rhs.descent_switches;
        self.max_stack_depth = self.max_stack_depth.max(rhs.max_stack_depth);
    }
}
