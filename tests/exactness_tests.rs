//! Cross-backend exactness tests.
//!
//! Every backend in the crate is exact: given the same data and metric, the
//! VP-tree and KMKNN indices must return the same neighbors as the
//! brute-force scan. These tests use seeded continuous random data, where
//! exact distance ties have probability zero, so index-for-index equality is
//! a valid assertion. Tie-heavy degenerate data gets its own scenarios with
//! tie-aware assertions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vecino::prelude::*;

fn random_data(num_dimensions: usize, num_observations: usize, seed: u64) -> DenseMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..num_dimensions * num_observations)
        .map(|_| rng.gen_range(-10.0..10.0))
        .collect();
    DenseMatrix::from_vec(num_dimensions, num_observations, data).expect("valid shape")
}

fn all_backends(
    data: &DenseMatrix<f64>,
    metric: impl DistanceMetric<f64> + Clone + 'static,
) -> Vec<Box<dyn Prebuilt<f64>>> {
    vec![
        BruteforceBuilder::new(metric.clone())
            .build(data)
            .expect("build succeeds"),
        VpTreeBuilder::new(metric.clone())
            .build(data)
            .expect("build succeeds"),
        KmknnBuilder::new(metric).build(data).expect("build succeeds"),
    ]
}

fn assert_distances_close(a: &[f64], b: &[f64]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() < 1e-10, "{x} != {y}");
    }
}

#[test]
fn test_knn_by_index_matches_bruteforce() {
    let data = random_data(5, 100, 1000);
    for metric in [true, false] {
        let backends = if metric {
            all_backends(&data, EuclideanDistance)
        } else {
            all_backends(&data, ManhattanDistance)
        };
        let mut searchers: Vec<_> = backends.iter().map(|p| p.initialize()).collect();

        for i in [0, 33, 99] {
            for k in [1, 7, 50, 99] {
                let (mut ri, mut rd) = (Vec::new(), Vec::new());
                searchers[0]
                    .search(i, k, Some(&mut ri), Some(&mut rd))
                    .expect("search succeeds");
                assert_eq!(ri.len(), k.min(99));

                for searcher in searchers.iter_mut().skip(1) {
                    let (mut bi, mut bd) = (Vec::new(), Vec::new());
                    searcher
                        .search(i, k, Some(&mut bi), Some(&mut bd))
                        .expect("search succeeds");
                    assert_eq!(bi, ri);
                    assert_distances_close(&bd, &rd);
                }
            }
        }
    }
}

#[test]
fn test_knn_by_query_matches_bruteforce() {
    let data = random_data(3, 75, 2000);
    let backends = all_backends(&data, EuclideanDistance);
    let mut searchers: Vec<_> = backends.iter().map(|p| p.initialize()).collect();

    let mut rng = StdRng::seed_from_u64(77);
    for _ in 0..10 {
        let query: Vec<f64> = (0..3).map(|_| rng.gen_range(-10.0..10.0)).collect();
        for k in [1, 10, 75, 80] {
            let (mut ri, mut rd) = (Vec::new(), Vec::new());
            searchers[0]
                .search_query(&query, k, Some(&mut ri), Some(&mut rd))
                .expect("search succeeds");
            assert_eq!(ri.len(), k.min(75));

            for searcher in searchers.iter_mut().skip(1) {
                let (mut bi, mut bd) = (Vec::new(), Vec::new());
                searcher
                    .search_query(&query, k, Some(&mut bi), Some(&mut bd))
                    .expect("search succeeds");
                assert_eq!(bi, ri);
                assert_distances_close(&bd, &rd);
            }
        }
    }
}

#[test]
fn test_radius_search_matches_bruteforce() {
    let data = random_data(2, 60, 3000);
    let backends = all_backends(&data, EuclideanDistance);
    let mut searchers: Vec<_> = backends.iter().map(|p| p.initialize()).collect();

    for i in [0, 30, 59] {
        for radius in [0.5, 2.0, 100.0] {
            let (mut ri, mut rd) = (Vec::new(), Vec::new());
            let reference_count = searchers[0]
                .search_all(i, radius, Some(&mut ri), Some(&mut rd))
                .expect("search succeeds");
            assert_eq!(reference_count, ri.len());

            for searcher in searchers.iter_mut().skip(1) {
                let (mut bi, mut bd) = (Vec::new(), Vec::new());
                let count = searcher
                    .search_all(i, radius, Some(&mut bi), Some(&mut bd))
                    .expect("search succeeds");
                assert_eq!(count, reference_count);
                assert_eq!(bi, ri);
                assert_distances_close(&bd, &rd);

                // Count-only invocation agrees with the materialized list.
                let count_only = searcher.search_all(i, radius, None, None).expect("count succeeds");
                assert_eq!(count_only, count);
            }
        }
    }
}

#[test]
fn test_duplicate_points_bruteforce_pinned() {
    // Observations 0-4 are all-ones, 5-9 are all-twos, five dimensions
    // apart by sqrt(5). The brute-force scan order makes the full output
    // deterministic, ties included.
    let delta = 5.0_f64.sqrt();
    let mut raw = vec![1.0; 25];
    raw.extend(vec![2.0; 25]);
    let data = DenseMatrix::from_vec(5, 10, raw).expect("valid shape");

    let prebuilt = BruteforceBuilder::new(EuclideanDistance)
        .build(&data)
        .expect("build succeeds");
    let mut searcher = prebuilt.initialize();

    let (mut indices, mut distances) = (Vec::new(), Vec::new());
    searcher
        .search(0, 6, Some(&mut indices), Some(&mut distances))
        .expect("search succeeds");
    assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
    assert_distances_close(&distances, &[0.0, 0.0, 0.0, 0.0, delta, delta]);

    searcher
        .search(9, 7, Some(&mut indices), Some(&mut distances))
        .expect("search succeeds");
    assert_eq!(indices, vec![5, 6, 7, 8, 0, 1, 2]);
    assert_distances_close(&distances, &[0.0, 0.0, 0.0, 0.0, delta, delta, delta]);
}

#[test]
fn test_duplicate_points_all_backends() {
    // Same degenerate data as above, but the candidate scan order of the
    // tree-based backends is an implementation detail, so only the
    // order-independent parts of the result are asserted: the distances,
    // the full zero-distance group, and membership of the far group.
    let delta = 5.0_f64.sqrt();
    let mut raw = vec![1.0; 25];
    raw.extend(vec![2.0; 25]);
    let data = DenseMatrix::from_vec(5, 10, raw).expect("valid shape");

    for prebuilt in all_backends(&data, EuclideanDistance) {
        let mut searcher = prebuilt.initialize();
        let (mut indices, mut distances) = (Vec::new(), Vec::new());

        searcher
            .search(0, 6, Some(&mut indices), Some(&mut distances))
            .expect("search succeeds");
        assert_distances_close(&distances, &[0.0, 0.0, 0.0, 0.0, delta, delta]);
        assert_eq!(&indices[..4], &[1, 2, 3, 4]);
        assert!(indices[4..].iter().all(|&i| (5..10).contains(&i)));

        searcher
            .search(9, 7, Some(&mut indices), Some(&mut distances))
            .expect("search succeeds");
        assert_distances_close(&distances, &[0.0, 0.0, 0.0, 0.0, delta, delta, delta]);
        assert_eq!(&indices[..4], &[5, 6, 7, 8]);
        assert!(indices[4..].iter().all(|&i| i < 5));
    }
}

#[test]
fn test_empty_dataset_radius_search() {
    let data = DenseMatrix::<f64>::from_vec(4, 0, vec![]).expect("empty is valid");
    for prebuilt in all_backends(&data, EuclideanDistance) {
        let mut searcher = prebuilt.initialize();
        let (mut indices, mut distances) = (Vec::new(), Vec::new());
        let count = searcher
            .search_all_query(
                &[0.0, 0.0, 0.0, 0.0],
                0.0,
                Some(&mut indices),
                Some(&mut distances),
            )
            .expect("search succeeds");
        assert_eq!(count, 0);
        assert!(indices.is_empty());
        assert!(distances.is_empty());
    }
}

#[test]
fn test_size_bounds() {
    let data = random_data(2, 10, 4000);
    for prebuilt in all_backends(&data, EuclideanDistance) {
        let mut searcher = prebuilt.initialize();
        let mut indices = Vec::new();

        // By-id searches cap at nobs - 1, by-query at nobs.
        searcher
            .search(3, 50, Some(&mut indices), None)
            .expect("search succeeds");
        assert_eq!(indices.len(), 9);

        searcher
            .search_query(&[0.0, 0.0], 50, Some(&mut indices), None)
            .expect("search succeeds");
        assert_eq!(indices.len(), 10);

        searcher
            .search_query(&[0.0, 0.0], 0, Some(&mut indices), None)
            .expect("search succeeds");
        assert!(indices.is_empty());
    }
}

#[test]
fn test_idempotence() {
    let data = random_data(3, 40, 5000);
    for prebuilt in all_backends(&data, ManhattanDistance) {
        let mut searcher = prebuilt.initialize();
        let (mut i1, mut d1) = (Vec::new(), Vec::new());
        let (mut i2, mut d2) = (Vec::new(), Vec::new());
        searcher
            .search(5, 8, Some(&mut i1), Some(&mut d1))
            .expect("search succeeds");
        searcher
            .search(5, 8, Some(&mut i2), Some(&mut d2))
            .expect("search succeeds");
        assert_eq!(i1, i2);
        assert_eq!(d1, d2);
    }
}

#[test]
fn test_cosine_round_trip() {
    // Decorating a Euclidean VP-tree must rank exactly like building a
    // plain VP-tree over explicitly pre-normalized input.
    let data = random_data(4, 30, 6000);

    let mut prenormalized = Vec::with_capacity(30 * 4);
    for i in 0..30 {
        let row = data.observation(i);
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            prenormalized.extend(row.iter().map(|v| v / norm));
        } else {
            prenormalized.extend_from_slice(row);
        }
    }
    let normalized_data =
        DenseMatrix::from_vec(4, 30, prenormalized).expect("valid shape");

    let decorated = L2NormalizedBuilder::new(VpTreeBuilder::new(EuclideanDistance))
        .build(&data)
        .expect("build succeeds");
    let plain = VpTreeBuilder::new(EuclideanDistance)
        .build(&normalized_data)
        .expect("build succeeds");

    let mut decorated_searcher = decorated.initialize();
    let mut plain_searcher = plain.initialize();
    for i in 0..30 {
        let (mut di, mut dd) = (Vec::new(), Vec::new());
        let (mut pi, mut pd) = (Vec::new(), Vec::new());
        decorated_searcher
            .search(i, 5, Some(&mut di), Some(&mut dd))
            .expect("search succeeds");
        plain_searcher
            .search(i, 5, Some(&mut pi), Some(&mut pd))
            .expect("search succeeds");
        assert_eq!(di, pi);
        assert_distances_close(&dd, &pd);
    }

    // Raw queries are normalized on the way in.
    let (mut di, mut dd) = (Vec::new(), Vec::new());
    let (mut pi, mut pd) = (Vec::new(), Vec::new());
    let query = [3.0, -1.0, 2.0, 0.5];
    let norm = query.iter().map(|v| v * v).sum::<f64>().sqrt();
    let normalized_query: Vec<f64> = query.iter().map(|v| v / norm).collect();
    decorated_searcher
        .search_query(&query, 5, Some(&mut di), Some(&mut dd))
        .expect("search succeeds");
    plain_searcher
        .search_query(&normalized_query, 5, Some(&mut pi), Some(&mut pd))
        .expect("search succeeds");
    assert_eq!(di, pi);
    assert_distances_close(&dd, &pd);
}

#[test]
fn test_error_paths() {
    let data = random_data(2, 5, 7000);
    for prebuilt in all_backends(&data, EuclideanDistance) {
        let mut searcher = prebuilt.initialize();
        assert!(matches!(
            searcher.search(5, 1, None, None),
            Err(VecinoError::Configuration { .. })
        ));
        assert!(matches!(
            searcher.search_query(&[0.0, 0.0, 0.0], 1, None, None),
            Err(VecinoError::Configuration { .. })
        ));
        assert!(matches!(
            searcher.search_all_query(&[0.0], 1.0, None, None),
            Err(VecinoError::Configuration { .. })
        ));
    }
}
