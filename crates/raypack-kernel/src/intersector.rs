//! Query entry points.

use log::debug;

use crate::error::{KernelError, Result};
use crate::filter::{GeometryLookup, NoFilters};
use crate::lanes::LaneMask;
use crate::node::{Hierarchy, MAX_DEPTH};
use crate::ray::{Ray, RayPacket, TraceRay, OCCLUDED_ID};
use crate::settings::TraversalSettings;
use crate::stats::TraversalStats;

/// Closest-hit and occlusion queries over one hierarchy.
///
/// An intersector only borrows the hierarchy and the geometry lookup, so it
/// is cheap to create and can be shared between threads that trace disjoint
/// packets.
pub struct Intersector<'a, H: Hierarchy + ?Sized, G: GeometryLookup + ?Sized = NoFilters> {
    pub(crate) bvh: &'a H,
    pub(crate) geometry: &'a G,
    pub(crate) settings: TraversalSettings,
}

impl<'a, H: Hierarchy + ?Sized> Intersector<'a, H, NoFilters> {
    /// Intersector with default settings and no filter callbacks.
    pub fn unfiltered(hierarchy: &'a H) -> Result<Self> {
        Self::new(hierarchy, &NoFilters, TraversalSettings::default())
    }
}

impl<'a, H, G> Intersector<'a, H, G>
where
    H: Hierarchy + ?Sized,
    G: GeometryLookup + ?Sized,
{
    /// Create an intersector.
    ///
    /// Fails if the settings are invalid or the hierarchy reports a depth
    /// the traversal stacks cannot hold.
    pub fn new(hierarchy: &'a H, geometry: &'a G, settings: TraversalSettings) -> Result<Self> {
        settings.validate()?;
        let depth = hierarchy.max_depth();
        if depth > MAX_DEPTH {
            return Err(KernelError::TooDeep {
                depth,
                max: MAX_DEPTH,
            });
        }
        debug!(
            "intersector ready: depth {}, switch threshold {}, descent switch {}",
            depth, settings.switch_threshold, settings.switch_on_descent
        );
        Ok(Self {
            bvh: hierarchy,
            geometry,
            settings,
        })
    }

    /// The hierarchy being traced.
    pub fn hierarchy(&self) -> &'a H {
        self.bvh
    }

    /// Active settings.
    pub fn settings(&self) -> &TraversalSettings {
        &self.settings
    }

    /// Closest-hit query for the `valid` lanes of a packet.
    ///
    /// Each hit lane gets its `tfar` lowered to the hit distance and its hit
    /// record filled in. Other lanes are left untouched.
    ///
    /// Between hits at the same distance the smaller `(geom_id, prim_id)`
    /// wins, so the result does not depend on the order leaves are visited.
    pub fn intersect(&self, valid: LaneMask, packet: &mut RayPacket) {
        let mut stats = TraversalStats::default();
        self.intersect_with_stats(valid, packet, &mut stats);
    }

    /// [`Intersector::intersect`], accumulating work counters into `stats`.
    pub fn intersect_with_stats(
        &self,
        valid: LaneMask,
        packet: &mut RayPacket,
        stats: &mut TraversalStats,
    ) {
        self.intersect_packet(valid & LaneMask::ALL, packet, stats);
    }

    /// Occlusion query for the `valid` lanes of a packet.
    ///
    /// Returns the occluded lanes. Their `geom_id` is set to
    /// [`OCCLUDED_ID`]; nothing else in the packet is written.
    pub fn occluded(&self, valid: LaneMask, packet: &mut RayPacket) -> LaneMask {
        let mut stats = TraversalStats::default();
        self.occluded_with_stats(valid, packet, &mut stats)
    }

    /// [`Intersector::occluded`], accumulating work counters into `stats`.
    pub fn occluded_with_stats(
        &self,
        valid: LaneMask,
        packet: &mut RayPacket,
        stats: &mut TraversalStats,
    ) -> LaneMask {
        self.occluded_packet(valid & LaneMask::ALL, packet, stats)
    }

    /// Closest-hit query for one ray.
    pub fn intersect_single(&self, ray: &mut Ray) {
        let mut stats = TraversalStats::default();
        self.intersect_single_with_stats(ray, &mut stats);
    }

    /// [`Intersector::intersect_single`], accumulating work counters into `stats`.
    pub fn intersect_single_with_stats(&self, ray: &mut Ray, stats: &mut TraversalStats) {
        let mut trace = TraceRay::from_ray(ray);
        if let Some(hit) = self.intersect_from(&mut trace, self.bvh.root(), ray.tnear, stats) {
            ray.record_hit(&hit);
        }
    }

    /// Occlusion query for one ray; an occluded ray gets `geom_id` [`OCCLUDED_ID`].
    pub fn occluded_single(&self, ray: &mut Ray) -> bool {
        let mut stats = TraversalStats::default();
        self.occluded_single_with_stats(ray, &mut stats)
    }

    /// [`Intersector::occluded_single`], accumulating work counters into `stats`.
    pub fn occluded_single_with_stats(&self, ray: &mut Ray, stats: &mut TraversalStats) -> bool {
        let mut trace = TraceRay::from_ray(ray);
        let occluded = self.occluded_from(&mut trace, self.bvh.root(), ray.tnear, stats);
        if occluded {
            ray.hit.geom_id = OCCLUDED_ID;
        }
        occluded
    }
}
