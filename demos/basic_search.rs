//! Basic k-MIP Search
//!
//! Build every index over the same four points and ask each for the point
//! with the largest inner product with `q = (1, 0)`.
//!
//! ```bash
//! cargo run --example basic_search --release
//! ```

use std::sync::Arc;

use amips::{
    AsymmetricNormIndex, AsymmetricParams, BlockParams, BlockPartitionedIndex, ExactIndex,
    MipIndex, PointSet, SignatureParams, SimpleTransformIndex,
};

fn main() -> amips::Result<()> {
    // (3,0) (0,4) (1,1) (-2,-2); ids are reported 1-based
    let points = Arc::new(PointSet::new(
        2,
        vec![3.0, 0.0, 0.0, 4.0, 1.0, 1.0, -2.0, -2.0],
    )?);
    let query = [1.0_f32, 0.0];

    // Fixed seeds so repeated runs hash identically.
    let simple = SimpleTransformIndex::new(
        points.clone(),
        SignatureParams {
            seed: Some(1),
            ..Default::default()
        },
    )?;
    let asym: AsymmetricNormIndex = AsymmetricNormIndex::new(
        points.clone(),
        AsymmetricParams {
            seed: Some(1),
            ..Default::default()
        },
    )?;
    let blocks: BlockPartitionedIndex = BlockPartitionedIndex::new(
        points.clone(),
        BlockParams {
            seed: Some(1),
            ..Default::default()
        },
    )?;
    let exact = ExactIndex::new(points);

    let indexes: [&dyn MipIndex; 4] = [&simple, &asym, &blocks, &exact];
    for index in indexes {
        let stats = index.stats();
        let results = index.search(&query, 2)?;
        println!("{:>10} ({} bytes)", stats.algorithm, stats.size_bytes);
        for nb in &results {
            println!("    id={} ip={:.3}", nb.id, nb.score);
        }
    }

    // Every variant should put (3,0) first.
    println!("\nexpected best: id=1 ip=3.000");
    Ok(())
}
