//! Packed hierarchy layout exchanged with external builders.
//!
//! Child references are packed into one `u32`:
//! - `0xFFFF_FFFF`: empty slot
//! - bit 31 clear: internal node, bits 0..=30 are the node index
//! - bit 31 set: leaf, bits 0..=2 hold `count - 1` and bits 3..=30 the
//!   index of the first triangle

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use raypack_math::{Aabb3, Vec3};

use crate::error::{KernelError, Result};
use crate::node::{Bvh4, Bvh4Node, Hierarchy, NodeRef, Triangle, MAX_LEAF_PRIMITIVES};

/// Packed empty slot.
pub const RAW_INVALID: u32 = u32::MAX;

const LEAF_FLAG: u32 = 1 << 31;
const COUNT_BITS: u32 = 3;
const COUNT_MASK: u32 = (1 << COUNT_BITS) - 1;
const MAX_LEAF_FIRST: u32 = (1 << (31 - COUNT_BITS)) - 1;

/// Packed 4-wide node.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RawNode {
    /// Lower corner of each child box.
    pub lower: [[f32; 3]; 4],
    /// Upper corner of each child box.
    pub upper: [[f32; 3]; 4],
    /// Packed child references.
    pub children: [u32; 4],
}

/// Packed triangle; the normal is recomputed on load.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RawTriangle {
    /// First vertex.
    pub v0: [f32; 3],
    /// Second vertex.
    pub v1: [f32; 3],
    /// Third vertex.
    pub v2: [f32; 3],
    /// Layer mask.
    pub mask: u32,
    /// Geometry id.
    pub geom_id: u32,
    /// Primitive id.
    pub prim_id: u32,
}

/// Pack a child reference. `node` names the owner in errors.
pub fn encode_child(node: usize, child: NodeRef) -> Result<u32> {
    match child {
        NodeRef::Invalid => Ok(RAW_INVALID),
        NodeRef::Node(index) if index < LEAF_FLAG => Ok(index),
        NodeRef::Leaf { first, count }
            if first <= MAX_LEAF_FIRST && (1..=MAX_LEAF_PRIMITIVES as u8).contains(&count) =>
        {
            Ok(LEAF_FLAG | (first << COUNT_BITS) | (count as u32 - 1))
        }
        _ => Err(KernelError::Layout(format!(
            "child {:?} of node {} cannot be packed",
            child, node
        ))),
    }
}

/// Unpack a child reference. `node` names the owner in errors.
pub fn decode_child(node: usize, raw: u32) -> Result<NodeRef> {
    if raw == RAW_INVALID {
        return Ok(NodeRef::Invalid);
    }
    if raw & LEAF_FLAG == 0 {
        return Ok(NodeRef::Node(raw));
    }
    let count = (raw & COUNT_MASK) + 1;
    if count as usize > MAX_LEAF_PRIMITIVES {
        return Err(KernelError::MalformedChildRef { node, raw });
    }
    Ok(NodeRef::Leaf {
        first: (raw & !LEAF_FLAG) >> COUNT_BITS,
        count: count as u8,
    })
}

impl RawNode {
    fn decode(&self, index: usize) -> Result<Bvh4Node> {
        let mut node = Bvh4Node::new(&[]);
        for slot in 0..4 {
            let child = decode_child(index, self.children[slot])?;
            if child.is_invalid() {
                continue;
            }
            node.children[slot] = child;
            node.bounds[slot] = Aabb3::new(
                Vec3::from(self.lower[slot]),
                Vec3::from(self.upper[slot]),
            );
        }
        Ok(node)
    }

    fn encode(index: usize, node: &Bvh4Node) -> Result<Self> {
        let mut raw = Self::zeroed();
        for slot in 0..4 {
            raw.children[slot] = encode_child(index, node.children[slot])?;
            let bounds = &node.bounds[slot];
            raw.lower[slot] = [bounds.lower.x, bounds.lower.y, bounds.lower.z];
            raw.upper[slot] = [bounds.upper.x, bounds.upper.y, bounds.upper.z];
        }
        Ok(raw)
    }
}

impl From<&RawTriangle> for Triangle {
    fn from(raw: &RawTriangle) -> Self {
        Triangle::new(
            Vec3::from(raw.v0),
            Vec3::from(raw.v1),
            Vec3::from(raw.v2),
            raw.geom_id,
            raw.prim_id,
        )
        .with_mask(raw.mask)
    }
}

impl From<&Triangle> for RawTriangle {
    fn from(tri: &Triangle) -> Self {
        Self {
            v0: tri.v0.into(),
            v1: tri.v1.into(),
            v2: tri.v2.into(),
            mask: tri.mask,
            geom_id: tri.geom_id,
            prim_id: tri.prim_id,
        }
    }
}

/// Copy records out of a byte buffer that need not be aligned.
fn read_records<T: Pod>(what: &str, bytes: &[u8]) -> Result<Vec<T>> {
    let size = size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(KernelError::Layout(format!(
            "{} buffer of {} bytes is not a multiple of {}",
            what,
            bytes.len(),
            size
        )));
    }
    Ok(bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

impl Bvh4 {
    /// Accept a hierarchy in packed layout. `root` is a packed child reference.
    pub fn from_raw(nodes: &[RawNode], triangles: &[RawTriangle], root: u32) -> Result<Self> {
        let nodes = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| node.decode(index))
            .collect::<Result<Vec<_>>>()?;
        let triangles = triangles.iter().map(Triangle::from).collect();
        let root = decode_child(usize::MAX, root)?;
        Bvh4::new(nodes, triangles, root)
    }

    /// Accept a hierarchy from raw byte buffers holding [`RawNode`] and
    /// [`RawTriangle`] records.
    pub fn from_bytes(nodes: &[u8], triangles: &[u8], root: u32) -> Result<Self> {
        let nodes: Vec<RawNode> = read_records("node", nodes)?;
        let triangles: Vec<RawTriangle> = read_records("triangle", triangles)?;
        Self::from_raw(&nodes, &triangles, root)
    }

    /// Pack this hierarchy; returns nodes, triangles and the packed root.
    pub fn to_raw(&self) -> Result<(Vec<RawNode>, Vec<RawTriangle>, u32)> {
        let nodes = self
            .nodes()
            .iter()
            .enumerate()
            .map(|(index, node)| RawNode::encode(index, node))
            .collect::<Result<Vec<_>>>()?;
        let triangles = self.triangles().iter().map(RawTriangle::from).collect();
        let root = encode_child(usize::MAX, self.root())?;
        Ok((nodes, triangles, root))
    }
}
