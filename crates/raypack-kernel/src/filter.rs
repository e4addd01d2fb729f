//! Per-geometry filter callbacks.
//!
//! A geometry may veto candidate hits before traversal accepts them. For
//! closest-hit queries the filter may also amend the candidate. Geometries
//! without filters accept the nearest candidate unconditionally.

use crate::triangle::HitCandidate;

/// Outcome of a filter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Keep the candidate.
    Accept,
    /// Drop the candidate and continue with the next nearest one.
    Reject,
}

/// Filter capability of one geometry.
pub trait Geometry: Sync {
    /// Whether [`Geometry::intersection_filter`] must run for closest-hit queries.
    fn has_intersection_filter(&self) -> bool {
        false
    }

    /// Whether [`Geometry::occlusion_filter`] must run for occlusion queries.
    fn has_occlusion_filter(&self) -> bool {
        false
    }

    /// Decide on a closest-hit candidate.
    ///
    /// On accept, edits to `u`, `v`, `ng`, `geom_id` and `prim_id` are
    /// recorded; the ray and the distance `t` are restored.
    fn intersection_filter(&self, _hit: &mut HitCandidate) -> FilterDecision {
        FilterDecision::Accept
    }

    /// Decide whether a candidate blocks the ray.
    fn occlusion_filter(&self, _hit: &HitCandidate) -> FilterDecision {
        FilterDecision::Accept
    }
}

/// Resolves geometry ids stored in triangles.
pub trait GeometryLookup: Sync {
    /// Geometry for `geom_id`; `None` is treated as a geometry without filters.
    fn geometry(&self, geom_id: u32) -> Option<&dyn Geometry>;
}

/// Lookup for scenes without any filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilters;

impl GeometryLookup for NoFilters {
    #[inline]
    fn geometry(&self, _geom_id: u32) -> Option<&dyn Geometry> {
        None
    }
}

impl<G: Geometry> GeometryLookup for [G] {
    fn geometry(&self, geom_id: u32) -> Option<&dyn Geometry> {
        self.get(geom_id as usize).map(|g| g as &dyn Geometry)
    }
}

impl<G: Geometry> GeometryLookup for Vec<G> {
    fn geometry(&self, geom_id: u32) -> Option<&dyn Geometry> {
        self.as_slice().geometry(geom_id)
    }
}
