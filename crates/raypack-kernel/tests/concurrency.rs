mod common;

use common::{build_bvh, packets, random_rays, random_triangles};
use raypack_kernel::{Intersector, LaneMask, RayPacket, TraversalStats, PACKET_WIDTH};
use rayon::prelude::*;

#[test]
fn test_parallel_queries_match_sequential() {
    let _ = env_logger::builder().is_test(true).try_init();

    let bvh = build_bvh(&random_triangles(17, 1500), 4);
    let isect = Intersector::unfiltered(&bvh).unwrap();
    let batches = packets(&random_rays(23, 64 * PACKET_WIDTH));

    let trace = |(packet, valid): &(RayPacket, LaneMask)| {
        let mut closest = *packet;
        let mut stats = TraversalStats::default();
        isect.intersect_with_stats(*valid, &mut closest, &mut stats);
        let mut shadow = *packet;
        let occluded = isect.occluded_with_stats(*valid, &mut shadow, &mut stats);
        (closest, occluded, stats)
    };

    let sequential: Vec<_> = batches.iter().map(trace).collect();
    let parallel: Vec<_> = batches.par_iter().map(trace).collect();
    assert_eq!(sequential, parallel);

    let total = parallel
        .iter()
        .fold(TraversalStats::default(), |mut acc, (_, _, stats)| {
            acc += *stats;
            acc
        });
    assert!(total.nodes > 0);
}
