//! Iterative single-ray traversal.
//!
//! Used for `*_single` queries and for packet lanes that have been split
//! off. Per-ray arithmetic is the same as in packet traversal.

use crate::filter::GeometryLookup;
use crate::intersector::Intersector;
use crate::node::{Hierarchy, NodeRef, Triangle};
use crate::ray::TraceRay;
use crate::slab::intersect_box;
use crate::stack::TraversalStack;
use crate::stats::TraversalStats;
use crate::triangle::{intersect_leaf, HitCandidate, HitKind};

/// What a leaf visit did to the ray.
enum LeafStep {
    /// Nothing changed.
    Continue,
    /// `tfar` was lowered; stack entries starting beyond it can be dropped.
    Tightened,
    /// The query is answered.
    Terminate,
}

impl<H, G> Intersector<'_, H, G>
where
    H: Hierarchy + ?Sized,
    G: GeometryLookup + ?Sized,
{
    /// Closest hit of `ray` below `start`, lowering `ray.tfar` on each hit.
    pub(crate) fn intersect_from(
        &self,
        ray: &mut TraceRay,
        start: NodeRef,
        start_dist: f32,
        stats: &mut TraversalStats,
    ) -> Option<HitCandidate> {
        let mut closest = None;
        self.traverse(ray, start, start_dist, stats, |tris, ray, stats| {
            match intersect_leaf(HitKind::Closest, tris, ray, &self.settings, self.geometry, stats) {
                Some(hit) => {
                    ray.tighten(&hit);
                    closest = Some(hit);
                    LeafStep::Tightened
                }
                None => LeafStep::Continue,
            }
        });
        closest
    }

    /// Whether anything below `start` blocks `ray`.
    pub(crate) fn occluded_from(
        &self,
        ray: &mut TraceRay,
        start: NodeRef,
        start_dist: f32,
        stats: &mut TraversalStats,
    ) -> bool {
        self.traverse(ray, start, start_dist, stats, |tris, ray, stats| {
            match intersect_leaf(HitKind::Occlusion, tris, ray, &self.settings, self.geometry, stats) {
                Some(_) => LeafStep::Terminate,
                None => LeafStep::Continue,
            }
        })
    }

    /// Depth-first, near-first walk from `start`; returns true if a leaf
    /// visit terminated the walk.
    fn traverse(
        &self,
        ray: &mut TraceRay,
        start: NodeRef,
        start_dist: f32,
        stats: &mut TraversalStats,
        mut visit_leaf: impl FnMut(&[Triangle], &mut TraceRay, &mut TraversalStats) -> LeafStep,
    ) -> bool {
        let mut stack = TraversalStack::new(self.bvh.max_depth(), f32::INFINITY);
        stack.push(start, start_dist);

        let terminated = 'pop: loop {
            let (mut cur, mut cur_dist) = stack.pop();
            if cur.is_invalid() {
                break false;
            }
            if !(cur_dist <= ray.tfar) {
                continue;
            }

            let (first, count) = loop {
                let index = match cur {
                    NodeRef::Node(index) => index,
                    NodeRef::Leaf { first, count } => break (first, count),
                    NodeRef::Invalid => break 'pop false,
                };
                stats.nodes += 1;
                let node = self.bvh.node(index);

                (cur, cur_dist) = stack.pop();
                for (slot, (bounds, &child)) in node.bounds.iter().zip(&node.children).enumerate() {
                    if slot >= 2 && child.is_invalid() {
                        break;
                    }
                    let Some(near) = intersect_box(bounds, ray, ray.tnear, ray.tfar) else {
                        continue;
                    };
                    if near < cur_dist {
                        stack.push(cur, cur_dist);
                        cur = child;
                        cur_dist = near;
                    } else {
                        stack.push(child, near);
                    }
                }
            };

            if !(cur_dist <= ray.tfar) {
                continue;
            }
            stats.leaves += 1;
            match visit_leaf(self.bvh.leaf(first, count), ray, stats) {
                LeafStep::Continue => {}
                LeafStep::Tightened => {
                    let tfar = ray.tfar;
                    stack.retain(|dist| *dist <= tfar);
                }
                LeafStep::Terminate => break true,
            }
        };

        stats.max_stack_depth = stats.max_stack_depth.max(stack.peak());
        terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::NoFilters;
    use crate::node::{Bvh4, Bvh4Node};
    use crate::settings::TraversalSettings;
    use raypack_math::Vec3;

    /// Four unit triangles stacked along z at 0, 2, 4 and 6, one per leaf.
    fn tower() -> Bvh4 {
        let mut tris = Vec::new();
        let mut children = Vec::new();
        for i in 0..4u32 {
            let z = 2.0 * i as f32;
            let tri = Triangle::new(
                Vec3::new(0.0, 0.0, z),
                Vec3::new(1.0, 0.0, z),
                Vec3::new(0.0, 1.0, z),
                0,
                i,
            );
            children.push((tri.bounds(), NodeRef::Leaf { first: i, count: 1 }));
            tris.push(tri);
        }
        Bvh4::new(vec![Bvh4Node::new(&children)], tris, NodeRef::Node(0)).unwrap()
    }

    fn down(tfar: f32) -> TraceRay {
        TraceRay::new(
            Vec3::new(0.25, 0.25, 10.0),
            Vec3::new(0.0, 0.0, -1.0),
            0.0,
            tfar,
            u32::MAX,
        )
    }

    #[test]
    fn test_nearest_leaf_wins() {
        let bvh = tower();
        let isect = Intersector::unfiltered(&bvh).unwrap();
        let mut ray = down(f32::INFINITY);
        let mut stats = TraversalStats::default();
        let hit = isect
            .intersect_from(&mut ray, bvh.root(), 0.0, &mut stats)
            .unwrap();
        assert_eq!(hit.prim_id, 3);
        assert_eq!(ray.tfar, 4.0);
        assert_eq!(stats.nodes, 1);
        // the remaining leaves all start beyond the first hit
        assert_eq!(stats.leaves, 1);
    }

    #[test]
    fn test_interval_limits_hits() {
        let bvh = tower();
        let isect = Intersector::unfiltered(&bvh).unwrap();
        let mut stats = TraversalStats::default();

        let mut ray = down(3.0);
        assert!(isect
            .intersect_from(&mut ray, bvh.root(), 0.0, &mut stats)
            .is_none());
        assert_eq!(ray.tfar, 3.0);
        assert!(!isect.occluded_from(&mut down(3.0), bvh.root(), 0.0, &mut stats));
        assert!(isect.occluded_from(&mut down(4.5), bvh.root(), 0.0, &mut stats));
    }

    #[test]
    fn test_start_below_root() {
        let bvh = tower();
        let isect = Intersector::unfiltered(&bvh).unwrap();
        let mut ray = down(f32::INFINITY);
        let mut stats = TraversalStats::default();
        let hit = isect
            .intersect_from(&mut ray, NodeRef::Leaf { first: 1, count: 1 }, 0.0, &mut stats)
            .unwrap();
        assert_eq!(hit.prim_id, 1);
        assert_eq!(stats.nodes, 0);
    }

    #[test]
    fn test_empty_hierarchy() {
        let bvh = Bvh4::empty();
        let isect = Intersector::new(&bvh, &NoFilters, TraversalSettings::default()).unwrap();
        let mut ray = down(f32::INFINITY);
        let mut stats = TraversalStats::default();
        assert!(isect
            .intersect_from(&mut ray, bvh.root(), 0.0, &mut stats)
            .is_none());
        assert_eq!(stats, TraversalStats { max_stack_depth: 2, ..Default::default() });
    }

    #[test]
    fn test_stack_depth_recorded() {
        let bvh = tower();
        let isect = Intersector::unfiltered(&bvh).unwrap();
        let mut ray = TraceRay::new(
            Vec3::new(0.25, 0.25, 10.0),
            Vec3::new(0.0, 0.0, -1.0),
            0.0,
            f32::INFINITY,
            u32::MAX,
        );
        let mut stats = TraversalStats::default();
        isect.occluded_from(&mut ray, bvh.root(), 0.0, &mut stats);
        assert!(stats.max_stack_depth >= 2);
        assert!(stats.max_stack_depth <= 3 * bvh.max_depth() + 1);
    }
}
