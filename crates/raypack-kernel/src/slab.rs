//! Ray-box slab test shared by packet and single-ray traversal.

use raypack_math::Aabb3;

use crate::lanes::{LaneMask, Lanes, PACKET_WIDTH};
use crate::ray::TraceRay;

/// Entry distance of a child that was hit, `None` if the box was missed.
///
/// Clip distances are `corner * rdir - org * rdir`. Grazing hits where the
/// clipped interval collapses to a point count as hits.
#[inline]
pub(crate) fn intersect_box(bounds: &Aabb3, ray: &TraceRay, tnear: f32, tfar: f32) -> Option<f32> {
    let clip_min_x = bounds.lower.x * ray.rdir.x - ray.org_rdir.x;
    let clip_min_y = bounds.lower.y * ray.rdir.y - ray.org_rdir.y;
    let clip_min_z = bounds.lower.z * ray.rdir.z - ray.org_rdir.z;
    let clip_max_x = bounds.upper.x * ray.rdir.x - ray.org_rdir.x;
    let clip_max_y = bounds.upper.y * ray.rdir.y - ray.org_rdir.y;
    let clip_max_z = bounds.upper.z * ray.rdir.z - ray.org_rdir.z;

    let near = clip_min_x
        .min(clip_max_x)
        .max(clip_min_y.min(clip_max_y))
        .max(clip_min_z.min(clip_max_z));
    let far = clip_min_x
        .max(clip_max_x)
        .min(clip_min_y.max(clip_max_y))
        .min(clip_min_z.max(clip_max_z));

    if near.max(tnear) <= far.min(tfar) {
        Some(near)
    } else {
        None
    }
}

/// Slab test of one child box against the `active` lanes of a packet.
///
/// Returns the lanes that hit and each lane's entry distance (`+inf` for
/// lanes that missed or are not active).
#[inline]
pub(crate) fn intersect_box_lanes(
    bounds: &Aabb3,
    rays: &Lanes<TraceRay>,
    active: LaneMask,
    tnear: &Lanes<f32>,
    tfar: &Lanes<f32>,
) -> (LaneMask, Lanes<f32>) {
    let mut hit = LaneMask::NONE;
    let mut dist = [f32::INFINITY; PACKET_WIDTH];
    for lane in active {
        if let Some(near) = intersect_box(bounds, &rays[lane], tnear[lane], tfar[lane]) {
            hit.insert(lane);
            dist[lane] = near;
        }
    }
    (hit, dist)
}
