//! Read-only view over a 4-wide bounding volume hierarchy.
//!
//! The hierarchy is produced by an external builder. The kernel only needs
//! the [`Hierarchy`] trait; [`Bvh4`] is the flat storage the kernel ships
//! with, validated once when it is created.

use log::debug;
use raypack_math::{Aabb3, Vec3};

use crate::error::{KernelError, Result};

/// Largest hierarchy depth, counted in node levels including the leaf level.
pub const MAX_DEPTH: usize = 32;

/// Largest number of primitives in one leaf.
pub const MAX_LEAF_PRIMITIVES: usize = 4;

/// Reference to a child of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Internal node, index into the node array.
    Node(u32),
    /// Leaf: `count` consecutive triangles starting at `first`.
    Leaf {
        /// Index of the first triangle.
        first: u32,
        /// Number of triangles, `1..=MAX_LEAF_PRIMITIVES`.
        count: u8,
    },
    /// Empty child slot. Also marks the bottom of traversal stacks.
    Invalid,
}

impl NodeRef {
    /// Whether this references a leaf.
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeRef::Leaf { .. })
    }

    /// Whether this is the empty sentinel.
    #[inline]
    pub fn is_invalid(self) -> bool {
        self == NodeRef::Invalid
    }
}

/// Internal node with four child slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bvh4Node {
    /// Bounds of each child.
    pub bounds: [Aabb3; 4],
    /// Child references; slots 0 and 1 are always populated.
    pub children: [NodeRef; 4],
}

impl Bvh4Node {
    /// Node from up to four `(bounds, child)` pairs; missing slots are empty.
    pub fn new(children: &[(Aabb3, NodeRef)]) -> Self {
        let mut node = Self {
            bounds: [Aabb3::empty(); 4],
            children: [NodeRef::Invalid; 4],
        };
        for (slot, (bounds, child)) in children.iter().take(4).enumerate() {
            node.bounds[slot] = *bounds;
            node.children[slot] = *child;
        }
        node
    }
}

/// Triangle primitive stored in leaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex.
    pub v0: Vec3,
    /// Second vertex.
    pub v1: Vec3,
    /// Third vertex.
    pub v2: Vec3,
    /// Geometric normal `(v0 - v1) x (v2 - v0)`.
    pub ng: Vec3,
    /// Layer mask.
    pub mask: u32,
    /// Geometry id.
    pub geom_id: u32,
    /// Primitive id within the geometry.
    pub prim_id: u32,
}

impl Triangle {
    /// Triangle with its normal precomputed and every layer enabled.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, geom_id: u32, prim_id: u32) -> Self {
        let e1 = v0 - v1;
        let e2 = v2 - v0;
        Self {
            v0,
            v1,
            v2,
            ng: e1.cross(&e2),
            mask: u32::MAX,
            geom_id,
            prim_id,
        }
    }

    /// Same triangle restricted to `mask`.
    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    /// Bounding box of the three vertices.
    pub fn bounds(&self) -> Aabb3 {
        let mut b = Aabb3::empty();
        b.include_point(&self.v0);
        b.include_point(&self.v1);
        b.include_point(&self.v2);
        b
    }
}

/// Read access to a hierarchy, as consumed by traversal.
pub trait Hierarchy: Sync {
    /// Root reference; [`NodeRef::Invalid`] for an empty hierarchy.
    fn root(&self) -> NodeRef;

    /// Internal node by index.
    fn node(&self, index: u32) -> &Bvh4Node;

    /// Triangles of a leaf.
    fn leaf(&self, first: u32, count: u8) -> &[Triangle];

    /// Node levels on the longest root-to-leaf path; sizes traversal stacks.
    fn max_depth(&self) -> usize;
}

/// Flat 4-wide hierarchy over triangles.
#[derive(Debug, Clone)]
pub struct Bvh4 {
    nodes: Vec<Bvh4Node>,
    triangles: Vec<Triangle>,
    root: NodeRef,
    depth: usize,
}

impl Bvh4 {
    /// Hierarchy with no geometry.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            triangles: Vec::new(),
            root: NodeRef::Invalid,
            depth: 0,
        }
    }

    /// Accept builder output after checking every reachable reference.
    ///
    /// Rejects out-of-range references, oversized or empty leaves, empty
    /// slots 0/1 or a populated slot 3 behind an empty slot 2, nodes reached
    /// twice, and trees deeper than [`MAX_DEPTH`].
    pub fn new(nodes: Vec<Bvh4Node>, triangles: Vec<Triangle>, root: NodeRef) -> Result<Self> {
        let depth = validate(&nodes, triangles.len(), root)?;
        debug!(
            "accepted bvh4: {} nodes, {} triangles, depth {}",
            nodes.len(),
            triangles.len(),
            depth
        );
        Ok(Self {
            nodes,
            triangles,
            root,
            depth,
        })
    }

    /// All internal nodes.
    pub fn nodes(&self) -> &[Bvh4Node] {
        &self.nodes
    }

    /// All triangles, in leaf order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }
}

impl Hierarchy for Bvh4 {
    #[inline]
    fn root(&self) -> NodeRef {
        self.root
    }

    #[inline]
    fn node(&self, index: u32) -> &Bvh4Node {
        &self.nodes[index as usize]
    }

    #[inline]
    fn leaf(&self, first: u32, count: u8) -> &[Triangle] {
        let first = first as usize;
        &self.triangles[first..first + count as usize]
    }

    fn max_depth(&self) -> usize {
        self.depth
    }
}

fn check_leaf(first: u32, count: u8, num_triangles: usize) -> Result<()> {
    let count = count as usize;
    if count == 0 || count > MAX_LEAF_PRIMITIVES {
        return Err(KernelError::LeafSize {
            count,
            max: MAX_LEAF_PRIMITIVES,
        });
    }
    let end = first as usize + count;
    if end > num_triangles {
        return Err(KernelError::Layout(format!(
            "leaf {}..{} past {} triangles",
            first, end, num_triangles
        )));
    }
    Ok(())
}

fn validate(nodes: &[Bvh4Node], num_triangles: usize, root: NodeRef) -> Result<usize> {
    match root {
        NodeRef::Invalid => return Ok(0),
        NodeRef::Leaf { first, count } => {
            check_leaf(first, count, num_triangles)?;
            return Ok(1);
        }
        NodeRef::Node(index) if index as usize >= nodes.len() => {
            return Err(KernelError::Layout(format!(
                "root node {} past {} nodes",
                index,
                nodes.len()
            )));
        }
        NodeRef::Node(_) => {}
    }

    let mut seen = vec![false; nodes.len()];
    let mut depth = 0;
    let mut pending = vec![(root, 1usize)];

    while let Some((node_ref, level)) = pending.pop() {
        depth = depth.max(level);
        if depth > MAX_DEPTH {
            return Err(KernelError::TooDeep {
                depth,
                max: MAX_DEPTH,
            });
        }

        let index = match node_ref {
            NodeRef::Node(index) => index as usize,
            _ => continue,
        };
        if seen[index] {
            return Err(KernelError::SharedNode(index));
        }
        seen[index] = true;

        let node = &nodes[index];
        for (slot, child) in node.children.iter().enumerate() {
            match *child {
                NodeRef::Invalid if slot < 2 => {
                    return Err(KernelError::MissingChild { node: index, slot });
                }
                NodeRef::Invalid => {}
                _ if slot == 3 && node.children[2].is_invalid() => {
                    return Err(KernelError::MissingChild { node: index, slot: 2 });
                }
                NodeRef::Node(c) => {
                    if c as usize >= nodes.len() {
                        return Err(KernelError::ChildOutOfRange { node: index, slot });
                    }
                    pending.push((*child, level + 1));
                }
                NodeRef::Leaf { first, count } => {
                    check_leaf(first, count, num_triangles).map_err(|e| match e {
                        KernelError::Layout(_) => KernelError::ChildOutOfRange { node: index, slot },
                        other => other,
                    })?;
                    pending.push((*child, level + 1));
                }
            }
        }
    }

    Ok(depth)
}
