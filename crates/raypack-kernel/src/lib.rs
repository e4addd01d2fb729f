#![warn(missing_docs)]

//! Hybrid packet/single-ray traversal of 4-wide triangle hierarchies.
//!
//! A [`RayPacket`] of [`PACKET_WIDTH`] rays walks a [`Bvh4`] together as long
//! as enough lanes stay interested in the same subtrees. When the count of
//! interested lanes drops to the configured threshold, the remaining lanes
//! finish on their own through single-ray traversal. Results are identical
//! to tracing every ray alone.
//!
//! # Architecture
//!
//! - [`Intersector`] - closest-hit and occlusion queries for packets and rays
//! - [`Bvh4`] / [`Hierarchy`] - read-only hierarchy, validated on creation
//! - [`raw`] - packed hierarchy layout for external builders
//! - [`Geometry`] / [`GeometryLookup`] - per-geometry filter callbacks
//! - [`TraversalSettings`] - switch threshold and culling options
//! - [`TraversalStats`] - work counters
//!
//! # Example
//!
//! ```ignore
//! use raypack_kernel::{Bvh4, Intersector, LaneMask, Ray, RayPacket};
//!
//! let bvh = Bvh4::from_raw(&nodes, &triangles, root)?;
//! let isect = Intersector::unfiltered(&bvh)?;
//!
//! let (mut packet, valid) = RayPacket::from_rays(&rays);
//! isect.intersect(valid, &mut packet);
//! ```

pub mod error;
mod filter;
mod intersector;
mod lanes;
mod node;
mod packet;
pub mod raw;
mod ray;
mod settings;
mod single;
mod slab;
mod stack;
mod stats;
mod triangle;

pub use error::{KernelError, Result};
pub use filter::{FilterDecision, Geometry, GeometryLookup, NoFilters};
pub use intersector::Intersector;
pub use lanes::{LaneIter, LaneMask, Lanes, Vec3Lanes, PACKET_WIDTH};
pub use node::{Bvh4, Bvh4Node, Hierarchy, NodeRef, Triangle, MAX_DEPTH, MAX_LEAF_PRIMITIVES};
pub use ray::{HitLanes, Ray, RayHit, RayPacket, INVALID_ID, OCCLUDED_ID};
pub use settings::TraversalSettings;
pub use stats::TraversalStats;
pub use triangle::HitCandidate;

pub use raypack_math::{Aabb3, Vec3};
