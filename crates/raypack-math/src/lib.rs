#![warn(missing_docs)]

//! Math types for the raypack traversal kernel.
//!
//! Thin wrappers around nalgebra providing the single-precision types
//! used by ray packets and hierarchy nodes: vectors, axis-aligned boxes,
//! and the safe reciprocal used by slab tests.

use nalgebra::Vector3;

/// A vector (or point) in 3D space.
pub type Vec3 = Vector3<f32>;

/// Smallest magnitude that is reciprocated as-is by [`rcp_safe`].
pub const MIN_RCP_INPUT: f32 = 1e-18;

/// Reciprocal that never produces an infinity.
///
/// Inputs closer to zero than [`MIN_RCP_INPUT`] are clamped to
/// `±MIN_RCP_INPUT` (keeping the sign of `x`, including `-0.0`), so a zero
/// direction component turns into a large signed value and slab tests keep
/// their min/max ordering.
#[inline]
pub fn rcp_safe(x: f32) -> f32 {
    if x.abs() < MIN_RCP_INPUT {
        1.0 / MIN_RCP_INPUT.copysign(x)
    } else {
        1.0 / x
    }
}

/// Component-wise [`rcp_safe`].
#[inline]
pub fn rcp_safe3(v: &Vec3) -> Vec3 {
    Vec3::new(rcp_safe(v.x), rcp_safe(v.y), rcp_safe(v.z))
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Lower corner.
    pub lower: Vec3,
    /// Upper corner.
    pub upper: Vec3,
}

impl Aabb3 {
    /// Create a box from its lower and upper corners.
    pub fn new(lower: Vec3, upper: Vec3) -> Self {
        Self { lower, upper }
    }

    /// Create an empty (inverted) box suitable for expansion.
    pub fn empty() -> Self {
        Self {
            lower: Vec3::repeat(f32::INFINITY),
            upper: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Whether the box contains no point at all.
    pub fn is_empty(&self) -> bool {
        self.lower.x > self.upper.x || self.lower.y > self.upper.y || self.lower.z > self.upper.z
    }

    /// Expand this box to include a point.
    pub fn include_point(&mut self, p: &Vec3) {
        self.lower = self.lower.inf(p);
        self.upper = self.upper.sup(p);
    }

    /// Expand this box to include another box.
    pub fn include_box(&mut self, other: &Aabb3) {
        self.lower = self.lower.inf(&other.lower);
        self.upper = self.upper.sup(&other.upper);
    }

    /// Center of the box.
    pub fn center(&self) -> Vec3 {
        (self.lower + self.upper) * 0.5
    }

    /// Test whether a point lies inside the box (boundary included).
    pub fn contains(&self, p: &Vec3) -> bool {
        p.x >= self.lower.x
            && p.y >= self.lower.y
            && p.z >= self.lower.z
            && p.x <= self.upper.x
            && p.y <= self.upper.y
            && p.z <= self.upper.z
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}
