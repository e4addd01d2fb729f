//! Möller–Trumbore leaf intersection with nearest-first filter retry.

use raypack_math::Vec3;

use crate::filter::{FilterDecision, GeometryLookup};
use crate::node::{Triangle, MAX_LEAF_PRIMITIVES};
use crate::ray::{RayHit, TraceRay};
use crate::settings::TraversalSettings;
use crate::stats::TraversalStats;

/// A hit under consideration, handed to filter callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitCandidate {
    /// Ray origin.
    pub org: Vec3,
    /// Ray direction.
    pub dir: Vec3,
    /// Distance along the ray.
    pub t: f32,
    /// First barycentric coordinate.
    pub u: f32,
    /// Second barycentric coordinate.
    pub v: f32,
    /// Geometric normal of the triangle.
    pub ng: Vec3,
    /// Geometry id.
    pub geom_id: u32,
    /// Primitive id.
    pub prim_id: u32,
    /// Ids of the triangle that produced the hit, before any filter amendment.
    pub(crate) key: HitKey,
}

/// `(geom_id, prim_id)` of a triangle; the smaller key wins between hits at
/// the same distance.
pub(crate) type HitKey = (u32, u32);

impl HitCandidate {
    /// Hit point `org + t * dir`.
    pub fn point(&self) -> Vec3 {
        self.org + self.dir * self.t
    }

    pub(crate) fn as_ray_hit(&self) -> RayHit {
        RayHit {
            u: self.u,
            v: self.v,
            ng: self.ng,
            geom_id: self.geom_id,
            prim_id: self.prim_id,
        }
    }
}

/// Which filter a leaf query consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HitKind {
    Closest,
    Occlusion,
}

/// Surviving candidates of one leaf for one ray; bit `i` marks primitive `i`.
struct Candidates {
    valid: u32,
    t: [f32; MAX_LEAF_PRIMITIVES],
    u: [f32; MAX_LEAF_PRIMITIVES],
    v: [f32; MAX_LEAF_PRIMITIVES],
    key: [HitKey; MAX_LEAF_PRIMITIVES],
}

impl Candidates {
    /// Slot with the smallest `t`, smallest key on ties.
    fn nearest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut bits = self.valid;
        while bits != 0 {
            let i = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            if best.map_or(true, |b| (self.t[i], self.key[i]) < (self.t[b], self.key[b])) {
                best = Some(i);
            }
        }
        best
    }
}

/// Test `ray` against every triangle of a leaf.
fn leaf_candidates(
    tris: &[Triangle],
    ray: &TraceRay,
    settings: &TraversalSettings,
    stats: &mut TraversalStats,
) -> Candidates {
    debug_assert!(tris.len() <= MAX_LEAF_PRIMITIVES);
    let mut out = Candidates {
        valid: 0,
        t: [0.0; MAX_LEAF_PRIMITIVES],
        u: [0.0; MAX_LEAF_PRIMITIVES],
        v: [0.0; MAX_LEAF_PRIMITIVES],
        key: [(0, 0); MAX_LEAF_PRIMITIVES],
    };

    for (i, tri) in tris.iter().enumerate().take(MAX_LEAF_PRIMITIVES) {
        stats.primitives += 1;

        let e1 = tri.v0 - tri.v1;
        let e2 = tri.v2 - tri.v0;
        let c = tri.v0 - ray.org;
        let den = tri.ng.dot(&ray.dir);
        if settings.backface_culling && !(den > 0.0) {
            continue;
        }
        let rcp_den = 1.0 / den;

        // NaN from a zero denominator fails every comparison below
        let r = ray.dir.cross(&c);
        let u = r.dot(&e2) * rcp_den;
        let v = r.dot(&e1) * rcp_den;
        if !(u >= 0.0 && v >= 0.0 && u + v <= 1.0) {
            continue;
        }

        let t = c.dot(&tri.ng) * rcp_den;
        if !(t >= ray.tnear && t <= ray.tfar) {
            continue;
        }
        let key = (tri.geom_id, tri.prim_id);
        // at tfar itself only a smaller key displaces the hit already held
        if t == ray.tfar && ray.held.map_or(false, |held| held <= key) {
            continue;
        }
        if settings.ray_mask && tri.mask & ray.mask == 0 {
            continue;
        }

        out.valid |= 1 << i;
        out.t[i] = t;
        out.u[i] = u;
        out.v[i] = v;
        out.key[i] = key;
    }
    out
}

/// Nearest candidate of a leaf that its geometry's filter accepts.
///
/// Candidates are tried in `(t, geom_id, prim_id)` order. Rejected ones are
/// removed and the next one is tried until one is accepted or none remain. A filter may amend the barycentrics,
/// normal and ids of the candidate it accepts, never its ray or distance.
pub(crate) fn intersect_leaf<G: GeometryLookup + ?Sized>(
    kind: HitKind,
    tris: &[Triangle],
    ray: &TraceRay,
    settings: &TraversalSettings,
    geometry: &G,
    stats: &mut TraversalStats,
) -> Option<HitCandidate> {
    let mut candidates = leaf_candidates(tris, ray, settings, stats);

    while let Some(i) = candidates.nearest() {
        let tri = &tris[i];
        let mut hit = HitCandidate {
            org: ray.org,
            dir: ray.dir,
            t: candidates.t[i],
            u: candidates.u[i],
            v: candidates.v[i],
            ng: tri.ng,
            geom_id: tri.geom_id,
            prim_id: tri.prim_id,
            key: candidates.key[i],
        };

        let decision = match geometry.geometry(tri.geom_id) {
            Some(geom) if kind == HitKind::Closest && geom.has_intersection_filter() => {
                geom.intersection_filter(&mut hit)
            }
            Some(geom) if kind == HitKind::Occlusion && geom.has_occlusion_filter() => {
                geom.occlusion_filter(&hit)
            }
            _ => FilterDecision::Accept,
        };

        match decision {
            FilterDecision::Accept => {
                hit.org = ray.org;
                hit.dir = ray.dir;
                hit.t = candidates.t[i];
                return Some(hit);
            }
            FilterDecision::Reject => candidates.valid &= !(1 << i),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Geometry, NoFilters};
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn unit_tri(z: f32, prim_id: u32) -> Triangle {
        Triangle::new(
            Vec3::new(0.0, 0.0, z),
            Vec3::new(1.0, 0.0, z),
            Vec3::new(0.0, 1.0, z),
            0,
            prim_id,
        )
    }

    fn down_ray(x: f32, y: f32) -> TraceRay {
        TraceRay::new(
            Vec3::new(x, y, 10.0),
            Vec3::new(0.0, 0.0, -1.0),
            0.0,
            f32::INFINITY,
            u32::MAX,
        )
    }

    fn closest<G: GeometryLookup + ?Sized>(
        tris: &[Triangle],
        ray: &TraceRay,
        settings: &TraversalSettings,
        geometry: &G,
    ) -> Option<HitCandidate> {
        let mut stats = TraversalStats::default();
        intersect_leaf(HitKind::Closest, tris, ray, settings, geometry, &mut stats)
    }

    #[test]
    fn test_hit_barycentrics() {
        let tris = [unit_tri(0.0, 3)];
        let hit = closest(&tris, &down_ray(0.25, 0.5), &Default::default(), &NoFilters).unwrap();
        assert_relative_eq!(hit.t, 10.0);
        assert_relative_eq!(hit.u, 0.25);
        assert_relative_eq!(hit.v, 0.5);
        assert_eq!(hit.prim_id, 3);
        assert_relative_eq!(hit.point().z, 0.0);
    }

    #[test]
    fn test_miss_outside_aperture() {
        let tris = [unit_tri(0.0, 0)];
        assert!(closest(&tris, &down_ray(0.75, 0.75), &Default::default(), &NoFilters).is_none());
        assert!(closest(&tris, &down_ray(-0.1, 0.5), &Default::default(), &NoFilters).is_none());
    }

    #[test]
    fn test_parallel_ray_misses() {
        let tris = [unit_tri(0.0, 0)];
        let ray = TraceRay::new(
            Vec3::new(-1.0, 0.25, 0.0),
            Vec3::x(),
            0.0,
            f32::INFINITY,
            u32::MAX,
        );
        assert!(closest(&tris, &ray, &Default::default(), &NoFilters).is_none());
    }

    #[test]
    fn test_depth_interval() {
        let tris = [unit_tri(0.0, 0)];
        let mut ray = down_ray(0.2, 0.2);
        ray.tfar = 9.0;
        assert!(closest(&tris, &ray, &Default::default(), &NoFilters).is_none());
        ray.tfar = 10.0;
        assert!(closest(&tris, &ray, &Default::default(), &NoFilters).is_some());
        ray.tnear = 10.5;
        ray.tfar = 20.0;
        assert!(closest(&tris, &ray, &Default::default(), &NoFilters).is_none());
    }

    #[test]
    fn test_nearest_of_leaf() {
        let tris = [unit_tri(-2.0, 0), unit_tri(3.0, 1), unit_tri(1.0, 2)];
        let hit = closest(&tris, &down_ray(0.2, 0.2), &Default::default(), &NoFilters).unwrap();
        assert_eq!(hit.prim_id, 1);
        assert_relative_eq!(hit.t, 7.0);
    }

    #[test]
    fn test_equal_distance_prefers_smaller_ids() {
        let mut far_geom = unit_tri(0.0, 1);
        far_geom.geom_id = 2;
        let tris = [unit_tri(0.0, 7), far_geom, unit_tri(0.0, 5)];
        let hit = closest(&tris, &down_ray(0.2, 0.2), &Default::default(), &NoFilters).unwrap();
        assert_eq!((hit.geom_id, hit.prim_id), (0, 5));
    }

    #[test]
    fn test_held_hit_kept_at_equal_distance() {
        let tris = [unit_tri(0.0, 5)];
        let mut ray = down_ray(0.2, 0.2);
        ray.tfar = 10.0;
        ray.held = Some((0, 3));
        assert!(closest(&tris, &ray, &Default::default(), &NoFilters).is_none());
        ray.held = Some((0, 8));
        assert_eq!(closest(&tris, &ray, &Default::default(), &NoFilters).unwrap().prim_id, 5);
        // nearer hits win whatever their ids
        ray.held = Some((0, 3));
        ray.tfar = 10.5;
        assert!(closest(&tris, &ray, &Default::default(), &NoFilters).is_some());
    }

    #[test]
    fn test_backface_culling() {
        // ng = (0, 0, -1) for this winding; a downward ray gives den > 0
        let tris = [unit_tri(0.0, 0)];
        let cull = TraversalSettings {
            backface_culling: true,
            ..Default::default()
        };
        assert!(closest(&tris, &down_ray(0.2, 0.2), &cull, &NoFilters).is_some());
        let up = TraceRay::new(
            Vec3::new(0.2, 0.2, -10.0),
            Vec3::z(),
            0.0,
            f32::INFINITY,
            u32::MAX,
        );
        assert!(closest(&tris, &up, &cull, &NoFilters).is_none());
        assert!(closest(&tris, &up, &Default::default(), &NoFilters).is_some());
    }

    #[test]
    fn test_ray_mask() {
        let tris = [unit_tri(0.0, 0).with_mask(0b10)];
        let masked = TraversalSettings {
            ray_mask: true,
            ..Default::default()
        };
        let mut ray = down_ray(0.2, 0.2);
        ray.mask = 0b01;
        assert!(closest(&tris, &ray, &masked, &NoFilters).is_none());
        assert!(closest(&tris, &ray, &Default::default(), &NoFilters).is_some());
        ray.mask = 0b11;
        assert!(closest(&tris, &ray, &masked, &NoFilters).is_some());
    }

    struct RejectPrims {
        rejected: Vec<u32>,
        calls: AtomicUsize,
    }

    impl Geometry for RejectPrims {
        fn has_intersection_filter(&self) -> bool {
            true
        }

        fn has_occlusion_filter(&self) -> bool {
            true
        }

        fn intersection_filter(&self, hit: &mut HitCandidate) -> FilterDecision {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.rejected.contains(&hit.prim_id) {
                FilterDecision::Reject
            } else {
                FilterDecision::Accept
            }
        }

        fn occlusion_filter(&self, hit: &HitCandidate) -> FilterDecision {
            let mut hit = *hit;
            self.intersection_filter(&mut hit)
        }
    }

    #[test]
    fn test_filter_retry_takes_next_nearest() {
        let tris = [unit_tri(0.0, 0), unit_tri(5.0, 1), unit_tri(2.0, 2)];
        let scene = vec![RejectPrims {
            rejected: vec![1, 2],
            calls: AtomicUsize::new(0),
        }];
        let hit = closest(&tris, &down_ray(0.2, 0.2), &Default::default(), &scene).unwrap();
        assert_eq!(hit.prim_id, 0);
        assert_eq!(scene[0].calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_filter_rejects_all() {
        let tris = [unit_tri(0.0, 0), unit_tri(5.0, 1)];
        let scene = vec![RejectPrims {
            rejected: vec![0, 1],
            calls: AtomicUsize::new(0),
        }];
        let mut stats = TraversalStats::default();
        let ray = down_ray(0.2, 0.2);
        let settings = TraversalSettings::default();
        assert!(intersect_leaf(HitKind::Occlusion, &tris, &ray, &settings, &scene, &mut stats).is_none());
        assert_eq!(stats.primitives, 2);
    }

    struct Amend;

    impl Geometry for Amend {
        fn has_intersection_filter(&self) -> bool {
            true
        }

        fn intersection_filter(&self, hit: &mut HitCandidate) -> FilterDecision {
            hit.prim_id += 100;
            FilterDecision::Accept
        }
    }

    #[test]
    fn test_filter_amends_candidate() {
        let tris = [unit_tri(0.0, 4)];
        let hit = closest(&tris, &down_ray(0.2, 0.2), &Default::default(), &vec![Amend]).unwrap();
        assert_eq!(hit.prim_id, 104);
        assert_eq!(hit.key, (0, 4));
    }
}
