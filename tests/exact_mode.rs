//! End-to-end tests: every index against brute force.
//!
//! At full recall (`top_k = n`, no blocking thresholds in the way) each
//! index must reproduce the brute-force ranking exactly.

use std::sync::Arc;

use amips::eval::{ground_truth, recall_at_k};
use amips::{
    AsymmetricNormIndex, AsymmetricParams, BlockParams, BlockPartitionedIndex, ExactIndex,
    LinearScan, MipIndex, MipsError, Neighbor, PointSet, Qalsh, SignatureParams,
    SimpleTransformIndex,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_points(n: usize, dim: usize, seed: u64) -> Arc<PointSet> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..n * dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
    Arc::new(PointSet::new(dim, data).unwrap())
}

fn random_query(dim: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect()
}

fn toy() -> Arc<PointSet> {
    Arc::new(PointSet::new(2, vec![3.0, 0.0, 0.0, 4.0, 1.0, 1.0, -2.0, -2.0]).unwrap())
}

fn ids(results: &[Neighbor]) -> Vec<u32> {
    results.iter().map(|n| n.id).collect()
}

/// Unit vectors scaled into `[1 - spread, 1 + spread]`.
fn narrow_band_points(n: usize, dim: usize, spread: f32, seed: u64) -> Arc<PointSet> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(n * dim);
    for _ in 0..n {
        let row: Vec<f32> = (0..dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
        let len = row.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        let target = 1.0 + spread * (rng.random::<f32>() * 2.0 - 1.0);
        data.extend(row.iter().map(|x| x / len * target));
    }
    Arc::new(PointSet::new(dim, data).unwrap())
}

/// Same scores position by position and the same set of ids; order inside a
/// run of equal scores may differ with rounding.
fn assert_same_ranking(got: &[Neighbor], expected: &[Neighbor]) {
    assert_eq!(got.len(), expected.len());
    for (g, e) in got.iter().zip(expected) {
        assert!(
            (g.score - e.score).abs() <= 1e-4 * (1.0 + e.score.abs()),
            "score {} vs {}",
            g.score,
            e.score
        );
    }
    let mut a = ids(got);
    let mut b = ids(expected);
    a.sort_unstable();
    b.sort_unstable();
    assert_eq!(a, b);
}

fn exhaustive_blocks(n: usize) -> BlockParams {
    BlockParams {
        max_block: n,
        n_threshold: n,
        seed: Some(1),
        ..Default::default()
    }
}

// =============================================================================
// Concrete scenario
// =============================================================================

#[test]
fn toy_scenario_all_variants() {
    let query = [1.0_f32, 0.0];
    let expected = Neighbor { id: 1, score: 3.0 };

    let simple = SimpleTransformIndex::new(
        toy(),
        SignatureParams {
            seed: Some(1),
            ..Default::default()
        },
    )
    .unwrap();
    let asym = AsymmetricNormIndex::<Qalsh>::new(
        toy(),
        AsymmetricParams {
            seed: Some(1),
            ..Default::default()
        },
    )
    .unwrap();
    let blocks = BlockPartitionedIndex::<Qalsh>::new(toy(), exhaustive_blocks(4)).unwrap();
    let exact = ExactIndex::new(toy());

    let indexes: [&dyn MipIndex; 4] = [&simple, &asym, &blocks, &exact];
    for index in indexes {
        let got = index.search(&query, 1).unwrap();
        assert_eq!(got, vec![expected], "{}", index.stats().algorithm);
    }
}

// =============================================================================
// Exact-mode equivalence
// =============================================================================

#[test]
fn exact_mode_matches_brute_force() {
    let n = 100;
    let dim = 16;
    let points = random_points(n, dim, 42);
    let asym_params = AsymmetricParams {
        seed: Some(2),
        ..Default::default()
    };

    let blocks = BlockPartitionedIndex::<Qalsh>::new(points.clone(), exhaustive_blocks(n)).unwrap();
    let asym_qalsh = AsymmetricNormIndex::<Qalsh>::new(points.clone(), asym_params.clone()).unwrap();
    let asym_exact = AsymmetricNormIndex::<LinearScan>::new(points.clone(), asym_params).unwrap();
    let exact = ExactIndex::new(points.clone());

    for seed in 0..5 {
        let query = random_query(dim, 1000 + seed);
        let expected = ground_truth(&points, &query, n);

        assert_same_ranking(&blocks.search(&query, n).unwrap(), &expected);
        assert_same_ranking(&asym_qalsh.search(&query, n).unwrap(), &expected);
        assert_same_ranking(&asym_exact.search(&query, n).unwrap(), &expected);
        assert_same_ranking(&exact.search(&query, n).unwrap(), &expected);
    }
}

#[test]
fn scores_are_exact_inner_products() {
    let n = 100;
    let dim = 16;
    let points = random_points(n, dim, 7);
    let index = BlockPartitionedIndex::<Qalsh>::new(points.clone(), exhaustive_blocks(n)).unwrap();
    let query = random_query(dim, 8);

    for nb in index.search(&query, 10).unwrap() {
        let p = points.get(nb.id as usize - 1);
        let ip: f32 = p.iter().zip(&query).map(|(a, b)| a * b).sum();
        assert!((ip - nb.score).abs() < 1e-4);
    }
}

// =============================================================================
// Approximate recall sanity
// =============================================================================

#[test]
fn approximate_indexes_have_reasonable_recall() {
    let n = 3_000;
    let dim = 24;
    let k = 10;
    let points = random_points(n, dim, 11);

    let blocks = BlockPartitionedIndex::<Qalsh>::new(
        points.clone(),
        BlockParams {
            n_threshold: 200,
            max_block: 1_000,
            seed: Some(3),
            ..Default::default()
        },
    )
    .unwrap();
    let simple = SimpleTransformIndex::new(
        points.clone(),
        SignatureParams {
            num_bits: 256,
            candidate_margin: 300,
            seed: Some(4),
        },
    )
    .unwrap();

    let mut blocks_recall = 0.0;
    let mut simple_recall = 0.0;
    let queries = 10;
    for seed in 0..queries {
        let query = random_query(dim, 500 + seed);
        let gt = ids(&ground_truth(&points, &query, k));
        blocks_recall += recall_at_k(&gt, &ids(&blocks.search(&query, k).unwrap()), k);
        simple_recall += recall_at_k(&gt, &ids(&simple.search(&query, k).unwrap()), k);
    }
    blocks_recall /= queries as f32;
    simple_recall /= queries as f32;

    assert!(blocks_recall >= 0.5, "H2-ALSH recall too low: {blocks_recall}");
    assert!(simple_recall >= 0.3, "Simple-LSH recall too low: {simple_recall}");
}

#[test]
fn narrow_norm_band_runs_blocks_through_qalsh() {
    let n = 3_000;
    let dim = 24;
    let k = 10;
    let points = narrow_band_points(n, dim, 0.001, 21);

    let index = BlockPartitionedIndex::<Qalsh>::new(
        points.clone(),
        BlockParams {
            n_threshold: 200,
            seed: Some(5),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(index.blocks().any(|b| b.indexed));
    let covered: usize = index
        .blocks()
        .filter(|b| b.indexed)
        .map(|b| b.member_ids.len())
        .sum();
    assert!(covered >= n / 2, "only {covered} points in indexed blocks");

    let queries = 10;
    let mut recall = 0.0;
    for seed in 0..queries {
        let query = random_query(dim, 900 + seed);
        let got = index.search(&query, k).unwrap();

        // Ids coming back from a block delegate map to the right points.
        for nb in &got {
            let p = points.get(nb.id as usize - 1);
            let ip: f32 = p.iter().zip(&query).map(|(a, b)| a * b).sum();
            assert!((ip - nb.score).abs() < 1e-4);
        }
        let gt = ids(&ground_truth(&points, &query, k));
        recall += recall_at_k(&gt, &ids(&got), k);
    }
    recall /= queries as f32;
    assert!(recall >= 0.8, "H2-ALSH recall through QALSH too low: {recall}");
}

// =============================================================================
// Error paths
// =============================================================================

#[test]
fn zero_norm_query_fails_fast() {
    let points = toy();
    let index = BlockPartitionedIndex::<LinearScan>::new(points, exhaustive_blocks(4)).unwrap();
    assert_eq!(
        index.search(&[0.0, 0.0], 1).unwrap_err(),
        MipsError::ZeroNormQuery
    );
}

#[test]
fn zero_top_k_is_invalid() {
    let index = ExactIndex::new(toy());
    assert!(matches!(
        index.search(&[1.0, 0.0], 0),
        Err(MipsError::InvalidParameter(_))
    ));
}

#[test]
fn search_into_respects_prior_list_contents() {
    let index = ExactIndex::new(toy());
    let mut list = amips::TopK::new(1);
    list.insert(10.0, 99);
    index.search_into(1, &[1.0, 0.0], 1.0, &mut list).unwrap();
    assert_eq!(list.ith_id(0), 99);
}

#[test]
fn indexes_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SimpleTransformIndex>();
    assert_send_sync::<AsymmetricNormIndex>();
    assert_send_sync::<BlockPartitionedIndex>();
    assert_send_sync::<ExactIndex>();
}
