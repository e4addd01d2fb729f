//! Hybrid packet traversal.
//!
//! A packet walks the hierarchy together while enough of its lanes are
//! still interested in the current subtree. Once the number of such lanes
//! drops to the switch threshold, each remaining lane finishes that subtree
//! alone through single-ray traversal and the packet moves on.
//!
//! Lanes outside the validity mask carry an empty interval (`tnear = +inf`,
//! `tfar = -inf`) so every box and distance test rejects them.

use std::array;

use crate::filter::GeometryLookup;
use crate::intersector::Intersector;
use crate::lanes::{gt, reaches, LaneMask, Lanes, PACKET_WIDTH};
use crate::node::{Hierarchy, NodeRef};
use crate::ray::{RayPacket, TraceRay, OCCLUDED_ID};
use crate::slab::intersect_box_lanes;
use crate::stack::TraversalStack;
use crate::stats::TraversalStats;
use crate::triangle::{intersect_leaf, HitCandidate, HitKind};

/// Query state shared by both packet queries.
struct PacketState {
    rays: Lanes<TraceRay>,
    tnear: Lanes<f32>,
    tfar: Lanes<f32>,
    stack: TraversalStack<Lanes<f32>>,
}

impl PacketState {
    fn new(valid: LaneMask, packet: &RayPacket, max_depth: usize, root: NodeRef) -> Self {
        let rays = array::from_fn(|lane| packet.trace_ray(lane));
        let mut tnear = [f32::INFINITY; PACKET_WIDTH];
        let mut tfar = [f32::NEG_INFINITY; PACKET_WIDTH];
        for lane in valid {
            tnear[lane] = packet.tnear[lane];
            tfar[lane] = packet.tfar[lane];
        }
        let mut stack = TraversalStack::new(max_depth, [f32::INFINITY; PACKET_WIDTH]);
        stack.push(root, tnear);
        Self {
            rays,
            tnear,
            tfar,
            stack,
        }
    }

    /// Lanes whose interval still reaches `dist`.
    #[inline]
    fn interested(&self, valid: LaneMask, dist: &Lanes<f32>) -> LaneMask {
        reaches(valid, dist, &self.tfar)
    }

    fn tighten(&mut self, lane: usize, hit: &HitCandidate) {
        self.rays[lane].tighten(hit);
        self.tfar[lane] = hit.t;
    }

    /// Close a lane's interval once it is answered.
    fn retire(&mut self, lane: usize) {
        self.tfar[lane] = f32::NEG_INFINITY;
        self.rays[lane].tfar = f32::NEG_INFINITY;
    }
}

/// Where packet descent stopped.
enum Descent {
    /// A leaf to intersect.
    Leaf { first: u32, count: u8 },
    /// The node was pushed back for the lane count check; pop again.
    Switched,
    /// The stack ran empty.
    Exhausted,
}

impl<H, G> Intersector<'_, H, G>
where
    H: Hierarchy + ?Sized,
    G: GeometryLookup + ?Sized,
{
    pub(crate) fn intersect_packet(
        &self,
        valid: LaneMask,
        packet: &mut RayPacket,
        stats: &mut TraversalStats,
    ) {
        let mut state = PacketState::new(valid, packet, self.bvh.max_depth(), self.bvh.root());

        loop {
            let (cur, cur_dist) = state.stack.pop();
            if cur.is_invalid() {
                break;
            }
            let active = state.interested(valid, &cur_dist);
            if active.none() {
                continue;
            }

            if active.count() <= self.settings.switch_threshold {
                for lane in active {
                    stats.single_ray_forks += 1;
                    let ray = &mut state.rays[lane];
                    if let Some(hit) = self.intersect_from(ray, cur, cur_dist[lane], stats) {
                        packet.record_hit(lane, &hit);
                    }
                    state.tfar[lane] = state.rays[lane].tfar;
                }
                continue;
            }

            let descent = self.descend(valid, &mut state, cur, cur_dist, stats);
            let (first, count, leaf_dist) = match descent {
                (Descent::Leaf { first, count }, dist) => (first, count, dist),
                (Descent::Switched, _) => continue,
                (Descent::Exhausted, _) => break,
            };

            let lanes = state.interested(valid, &leaf_dist);
            if lanes.none() {
                continue;
            }
            stats.leaves += 1;
            let tris = self.bvh.leaf(first, count);
            for lane in lanes {
                let hit = intersect_leaf(
                    HitKind::Closest,
                    tris,
                    &state.rays[lane],
                    &self.settings,
                    self.geometry,
                    stats,
                );
                if let Some(hit) = hit {
                    packet.record_hit(lane, &hit);
                    state.tighten(lane, &hit);
                }
            }
        }

        stats.max_stack_depth = stats.max_stack_depth.max(state.stack.peak());
    }

    pub(crate) fn occluded_packet(
        &self,
        valid: LaneMask,
        packet: &mut RayPacket,
        stats: &mut TraversalStats,
    ) -> LaneMask {
        let mut state = PacketState::new(valid, packet, self.bvh.max_depth(), self.bvh.root());
        let mut occluded = LaneMask::NONE;

        loop {
            let (cur, cur_dist) = state.stack.pop();
            if cur.is_invalid() {
                break;
            }
            let active = state.interested(valid, &cur_dist);
            if active.none() {
                continue;
            }

            if active.count() <= self.settings.switch_threshold {
                for lane in active {
                    stats.single_ray_forks += 1;
                    let ray = &mut state.rays[lane];
                    if self.occluded_from(ray, cur, cur_dist[lane], stats) {
                        occluded.insert(lane);
                        state.retire(lane);
                    }
                }
                if valid.without(occluded).none() {
                    break;
                }
                continue;
            }

            let descent = self.descend(valid, &mut state, cur, cur_dist, stats);
            let (first, count, leaf_dist) = match descent {
                (Descent::Leaf { first, count }, dist) => (first, count, dist),
                (Descent::Switched, _) => continue,
                (Descent::Exhausted, _) => break,
            };

            let lanes = state.interested(valid, &leaf_dist);
            if lanes.none() {
                continue;
            }
            stats.leaves += 1;
            let tris = self.bvh.leaf(first, count);
            for lane in lanes {
                let hit = intersect_leaf(
                    HitKind::Occlusion,
                    tris,
                    &state.rays[lane],
                    &self.settings,
                    self.geometry,
                    stats,
                );
                if hit.is_some() {
                    occluded.insert(lane);
                    state.retire(lane);
                }
            }
            if valid.without(occluded).none() {
                break;
            }
        }

        stats.max_stack_depth = stats.max_stack_depth.max(state.stack.peak());
        for lane in occluded {
            packet.hit.geom_id[lane] = OCCLUDED_ID;
        }
        occluded
    }

    /// Walk down from `cur` as a packet until a leaf is reached.
    ///
    /// Each step replaces `cur` with the next stack entry, then tests the
    /// node's children: a child nearer than that entry for some lane becomes
    /// the new `cur` (the entry is pushed back), any other child that was hit
    /// is pushed.
    fn descend(
        &self,
        valid: LaneMask,
        state: &mut PacketState,
        mut cur: NodeRef,
        mut cur_dist: Lanes<f32>,
        stats: &mut TraversalStats,
    ) -> (Descent, Lanes<f32>) {
        loop {
            let index = match cur {
                NodeRef::Node(index) => index,
                NodeRef::Leaf { first, count } => {
                    return (Descent::Leaf { first, count }, cur_dist);
                }
                NodeRef::Invalid => return (Descent::Exhausted, cur_dist),
            };
            stats.nodes += 1;
            let node = self.bvh.node(index);

            (cur, cur_dist) = state.stack.pop();
            for (slot, (bounds, &child)) in node.bounds.iter().zip(&node.children).enumerate() {
                if slot >= 2 && child.is_invalid() {
                    break;
                }
                let (hit, child_dist) =
                    intersect_box_lanes(bounds, &state.rays, valid, &state.tnear, &state.tfar);
                if hit.none() {
                    continue;
                }
                if gt(hit, &cur_dist, &child_dist).any() {
                    state.stack.push(cur, cur_dist);
                    cur = child;
                    cur_dist = child_dist;
                } else {
                    state.stack.push(child, child_dist);
                }
            }

            // The entry about to be processed is checked against the far
            // bounds as they stand now, so lanes that finished in an earlier
            // subtree no longer count.
            if self.settings.switch_on_descent
                && !cur.is_invalid()
                && state.interested(valid, &cur_dist).count() <= self.settings.switch_threshold
            {
                stats.descent_switches += 1;
                state.stack.push(cur, cur_dist);
                return (Descent::Switched, cur_dist);
            }
        }
    }
}
