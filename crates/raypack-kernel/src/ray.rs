//! Rays, ray packets, and their hit records.

use raypack_math::{rcp_safe3, Vec3};

use crate::lanes::{LaneMask, Lanes, Vec3Lanes, PACKET_WIDTH};
use crate::triangle::{HitCandidate, HitKey};

/// Geometry id of a ray that has not hit anything.
pub const INVALID_ID: u32 = u32::MAX;

/// Geometry id written into occluded rays by occlusion queries.
pub const OCCLUDED_ID: u32 = 0;

/// Hit record of one ray. The hit distance lives in the ray's `tfar`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// First barycentric coordinate (weight of the second vertex).
    pub u: f32,
    /// Second barycentric coordinate (weight of the third vertex).
    pub v: f32,
    /// Unnormalized geometric normal of the hit triangle.
    pub ng: Vec3,
    /// Geometry id, [`INVALID_ID`] if nothing was hit.
    pub geom_id: u32,
    /// Primitive id within the geometry.
    pub prim_id: u32,
}

impl RayHit {
    /// Record with no hit.
    pub fn none() -> Self {
        Self {
            u: 0.0,
            v: 0.0,
            ng: Vec3::zeros(),
            geom_id: INVALID_ID,
            prim_id: INVALID_ID,
        }
    }
}

impl Default for RayHit {
    fn default() -> Self {
        Self::none()
    }
}

/// A single ray with its query interval and hit record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin.
    pub org: Vec3,
    /// Direction, not required to be normalized.
    pub dir: Vec3,
    /// Start of the query interval.
    pub tnear: f32,
    /// End of the query interval; lowered to the hit distance on closest hits.
    pub tfar: f32,
    /// Layer mask, tested against primitive masks when ray masking is on.
    pub mask: u32,
    /// Hit record.
    pub hit: RayHit,
}

impl Ray {
    /// Create a ray over `[0, inf)` with every layer enabled.
    pub fn new(org: Vec3, dir: Vec3) -> Self {
        Self::with_interval(org, dir, 0.0, f32::INFINITY)
    }

    /// Create a ray over `[tnear, tfar]`.
    pub fn with_interval(org: Vec3, dir: Vec3, tnear: f32, tfar: f32) -> Self {
        Self {
            org,
            dir,
            tnear,
            tfar,
            mask: u32::MAX,
            hit: RayHit::none(),
        }
    }

    /// Evaluate the ray at parameter `t`: `org + t * dir`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.org + self.dir * t
    }

    /// Whether a closest-hit query recorded a hit.
    pub fn is_hit(&self) -> bool {
        self.hit.geom_id != INVALID_ID
    }
}

/// Per-query view of one ray with its precomputed slab-test terms.
///
/// Packet lanes and single rays go through the same constructor, so both
/// traversal modes run bit-identical box and triangle arithmetic.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TraceRay {
    pub org: Vec3,
    pub dir: Vec3,
    pub rdir: Vec3,
    pub org_rdir: Vec3,
    pub tnear: f32,
    pub tfar: f32,
    pub mask: u32,
    /// Key of the hit found at `tfar` by this query, if any.
    pub held: Option<HitKey>,
}

impl TraceRay {
    pub fn new(org: Vec3, dir: Vec3, tnear: f32, tfar: f32, mask: u32) -> Self {
        let rdir = rcp_safe3(&dir);
        Self {
            org,
            dir,
            rdir,
            org_rdir: org.component_mul(&rdir),
            tnear,
            tfar,
            mask,
            held: None,
        }
    }

    pub fn from_ray(ray: &Ray) -> Self {
        Self::new(ray.org, ray.dir, ray.tnear, ray.tfar, ray.mask)
    }

    /// Lower `tfar` to an accepted closest hit.
    pub fn tighten(&mut self, hit: &HitCandidate) {
        self.tfar = hit.t;
        self.held = Some(hit.key);
    }
}

/// Hit records of a packet, one entry per lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitLanes {
    /// First barycentric coordinates.
    pub u: Lanes<f32>,
    /// Second barycentric coordinates.
    pub v: Lanes<f32>,
    /// Geometric normals.
    pub ng: Vec3Lanes,
    /// Geometry ids.
    pub geom_id: Lanes<u32>,
    /// Primitive ids.
    pub prim_id: Lanes<u32>,
}

impl HitLanes {
    /// Records with no hit in any lane.
    pub fn none() -> Self {
        Self {
            u: [0.0; PACKET_WIDTH],
            v: [0.0; PACKET_WIDTH],
            ng: Vec3Lanes::default(),
            geom_id: [INVALID_ID; PACKET_WIDTH],
            prim_id: [INVALID_ID; PACKET_WIDTH],
        }
    }

    /// Read one lane's record.
    pub fn get(&self, lane: usize) -> RayHit {
        RayHit {
            u: self.u[lane],
            v: self.v[lane],
            ng: self.ng.get(lane),
            geom_id: self.geom_id[lane],
            prim_id: self.prim_id[lane],
        }
    }

    /// Overwrite one lane's record.
    pub fn set(&mut self, lane: usize, hit: &RayHit) {
        self.u[lane] = hit.u;
        self.v[lane] = hit.v;
        self.ng.set(lane, hit.ng);
        self.geom_id[lane] = hit.geom_id;
        self.prim_id[lane] = hit.prim_id;
    }
}

impl Default for HitLanes {
    fn default() -> Self {
        Self::none()
    }
}

/// A packet of [`PACKET_WIDTH`] rays in structure-of-arrays layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPacket {
    /// Origins.
    pub org: Vec3Lanes,
    /// Directions.
    pub dir: Vec3Lanes,
    /// Interval starts.
    pub tnear: Lanes<f32>,
    /// Interval ends; the hit distance after a closest-hit query.
    pub tfar: Lanes<f32>,
    /// Layer masks.
    pub mask: Lanes<u32>,
    /// Hit records.
    pub hit: HitLanes,
}

impl RayPacket {
    /// Packet whose lanes are all copies of `ray`.
    pub fn splat(ray: &Ray) -> Self {
        let mut packet = Self {
            org: Vec3Lanes::splat(ray.org),
            dir: Vec3Lanes::splat(ray.dir),
            tnear: [ray.tnear; PACKET_WIDTH],
            tfar: [ray.tfar; PACKET_WIDTH],
            mask: [ray.mask; PACKET_WIDTH],
            hit: HitLanes::none(),
        };
        for lane in 0..PACKET_WIDTH {
            packet.hit.set(lane, &ray.hit);
        }
        packet
    }

    /// Packet built from up to [`PACKET_WIDTH`] rays.
    ///
    /// Returns the packet and the mask of lanes that received a ray; the
    /// remaining lanes hold a degenerate ray and must be left out of the
    /// validity mask.
    pub fn from_rays(rays: &[Ray]) -> (Self, LaneMask) {
        let filler = Ray::with_interval(Vec3::zeros(), Vec3::z(), 0.0, f32::NEG_INFINITY);
        let mut packet = Self::splat(&filler);
        let mut valid = LaneMask::NONE;
        for (lane, ray) in rays.iter().take(PACKET_WIDTH).enumerate() {
            packet.set_ray(lane, ray);
            valid.insert(lane);
        }
        (packet, valid)
    }

    /// Read one lane as a standalone ray.
    pub fn ray(&self, lane: usize) -> Ray {
        Ray {
            org: self.org.get(lane),
            dir: self.dir.get(lane),
            tnear: self.tnear[lane],
            tfar: self.tfar[lane],
            mask: self.mask[lane],
            hit: self.hit.get(lane),
        }
    }

    /// Overwrite one lane with `ray`.
    pub fn set_ray(&mut self, lane: usize, ray: &Ray) {
        self.org.set(lane, ray.org);
        self.dir.set(lane, ray.dir);
        self.tnear[lane] = ray.tnear;
        self.tfar[lane] = ray.tfar;
        self.mask[lane] = ray.mask;
        self.hit.set(lane, &ray.hit);
    }

    pub(crate) fn trace_ray(&self, lane: usize) -> TraceRay {
        TraceRay::new(
            self.org.get(lane),
            self.dir.get(lane),
            self.tnear[lane],
            self.tfar[lane],
            self.mask[lane],
        )
    }

    pub(crate) fn record_hit(&mut self, lane: usize, hit: &HitCandidate) {
        self.tfar[lane] = hit.t;
        self.hit.set(lane, &hit.as_ray_hit());
    }
}

impl Ray {
    pub(crate) fn record_hit(&mut self, hit: &HitCandidate) {
        self.tfar = hit.t;
        self.hit = hit.as_ray_hit();
    }
}
