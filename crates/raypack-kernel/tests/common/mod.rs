//! Scene fixtures shared by the integration tests and the bench.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use raypack_kernel::{
    Aabb3, Bvh4, Bvh4Node, LaneMask, NodeRef, Ray, RayPacket, Triangle, Vec3, PACKET_WIDTH,
};

/// Median-split BVH4 over `triangles` with at most `max_leaf` per leaf.
///
/// Triangles are reordered into leaf order; ids are kept.
pub fn build_bvh(triangles: &[Triangle], max_leaf: usize) -> Bvh4 {
    assert!((1..=4).contains(&max_leaf));
    let mut builder = Builder {
        src: triangles,
        nodes: Vec::new(),
        tris: Vec::new(),
        max_leaf,
    };
    let mut items: Vec<usize> = (0..triangles.len()).collect();
    let root = match items.len() {
        0 => NodeRef::Invalid,
        n if n <= max_leaf => builder.leaf(&items).1,
        _ => builder.node(&mut items).1,
    };
    Bvh4::new(builder.nodes, builder.tris, root).unwrap()
}

struct Builder<'a> {
    src: &'a [Triangle],
    nodes: Vec<Bvh4Node>,
    tris: Vec<Triangle>,
    max_leaf: usize,
}

impl Builder<'_> {
    fn leaf(&mut self, items: &[usize]) -> (Aabb3, NodeRef) {
        let first = self.tris.len() as u32;
        let mut bounds = Aabb3::empty();
        for &i in items {
            bounds.include_box(&self.src[i].bounds());
            self.tris.push(self.src[i]);
        }
        let leaf = NodeRef::Leaf {
            first,
            count: items.len() as u8,
        };
        (bounds, leaf)
    }

    fn node(&mut self, items: &mut [usize]) -> (Aabb3, NodeRef) {
        let centroid = |i: usize| self.src[i].bounds().center();
        let mut spread = Aabb3::empty();
        for &i in items.iter() {
            spread.include_point(&centroid(i));
        }
        let extent = spread.upper - spread.lower;
        let axis = extent.imax();
        items.sort_by(|&a, &b| centroid(a)[axis].total_cmp(&centroid(b)[axis]));

        let index = self.nodes.len();
        self.nodes.push(Bvh4Node::new(&[]));

        let chunk = (items.len() + 3) / 4;
        let mut children = Vec::with_capacity(4);
        let mut bounds = Aabb3::empty();
        for part in items.chunks_mut(chunk) {
            let child = if part.len() <= self.max_leaf {
                self.leaf(part)
            } else {
                self.node(part)
            };
            bounds.include_box(&child.0);
            children.push(child);
        }
        self.nodes[index] = Bvh4Node::new(&children);
        (bounds, NodeRef::Node(index as u32))
    }
}

/// Triangle in the plane `z`, with its right angle at `(x, y)`.
pub fn flat_tri(x: f32, y: f32, z: f32, size: f32, geom_id: u32, prim_id: u32) -> Triangle {
    Triangle::new(
        Vec3::new(x, y, z),
        Vec3::new(x + size, y, z),
        Vec3::new(x, y + size, z),
        geom_id,
        prim_id,
    )
}

/// `count` small random triangles inside `[-10, 10]^3`.
pub fn random_triangles(seed: u64, count: usize) -> Vec<Triangle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count as u32)
        .map(|prim_id| {
            let center = random_point(&mut rng, 10.0);
            let v0 = center + random_point(&mut rng, 1.0);
            let v1 = center + random_point(&mut rng, 1.0);
            let v2 = center + random_point(&mut rng, 1.0);
            Triangle::new(v0, v1, v2, prim_id % 3, prim_id)
        })
        .collect()
}

/// Rays from outside the scene aimed at random points inside it.
pub fn random_rays(seed: u64, count: usize) -> Vec<Ray> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let org = random_point(&mut rng, 25.0);
            let target = random_point(&mut rng, 6.0);
            Ray::new(org, target - org)
        })
        .collect()
}

/// A camera tile: `PACKET_WIDTH` nearly parallel rays looking down `-z`.
pub fn coherent_rays(x: f32, y: f32, spacing: f32) -> Vec<Ray> {
    let side = (PACKET_WIDTH as f32).sqrt().ceil() as usize;
    (0..PACKET_WIDTH)
        .map(|lane| {
            let px = x + (lane % side) as f32 * spacing;
            let py = y + (lane / side) as f32 * spacing;
            Ray::new(Vec3::new(px, py, 30.0), Vec3::new(0.01, -0.02, -1.0))
        })
        .collect()
}

/// Split `rays` into full packets; the last one may be partial.
pub fn packets(rays: &[Ray]) -> Vec<(RayPacket, LaneMask)> {
    rays.chunks(PACKET_WIDTH).map(RayPacket::from_rays).collect()
}

fn random_point(rng: &mut StdRng, extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
    )
}
