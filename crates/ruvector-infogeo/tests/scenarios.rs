//! End-to-end scenarios for the information geometry engine
//!
//! Tests cover:
//! - Two-by-two grid split into two homogeneous halves (spectral and agglomerative)
//! - Zero-count units with and without smoothing
//! - Spatio-temporal runs with temporal edges
//! - Geographic coordinates
//! - Per-unit failures that must not abort the batch

use ruvector_infogeo::prelude::*;

fn grid_2x2_units() -> Vec<Unit> {
    vec![
        Unit::new("00", 0.0, 0.0),
        Unit::new("01", 0.0, 1.0),
        Unit::new("10", 1.0, 0.0),
        Unit::new("11", 1.0, 1.0),
    ]
}

fn grid_2x2_counts() -> CountTable {
    CountTable::from_vectors(
        Categories::new(["g1", "g2"]).unwrap(),
        vec![
            (NodeKey::spatial("00"), vec![100.0, 0.0]),
            (NodeKey::spatial("01"), vec![100.0, 0.0]),
            (NodeKey::spatial("10"), vec![0.0, 100.0]),
            (NodeKey::spatial("11"), vec![0.0, 100.0]),
        ],
    )
    .unwrap()
}

fn rook() -> AdjacencyRule {
    AdjacencyRule::Contiguity(vec![
        ("00".into(), "01".into()),
        ("00".into(), "10".into()),
        ("01".into(), "11".into()),
        ("10".into(), "11".into()),
    ])
}

#[cfg(test)]
mod grid_split {
    use super::*;

    fn same_cluster(assignment: &ClusterAssignment, a: &str, b: &str) -> bool {
        assignment.get(&NodeKey::spatial(a)) == assignment.get(&NodeKey::spatial(b))
    }

    #[test]
    fn test_spectral_kl_two_clusters() {
        let units = grid_2x2_units();
        let counts = grid_2x2_counts();
        let index = SpatialIndex::new(&units, CoordinateSystem::Projected).unwrap();

        let graph = InformationGraphBuilder::new(Divergence::KullbackLeibler, rook())
            .build(&index, &counts)
            .unwrap();
        let laplacian = Laplacian::random_walk(&AffinityMatrix::from_graph(&graph, 1.0).unwrap());
        let result = SpectralClusterer::with_k(2).cluster(&laplacian).unwrap();

        let assignment = &result.assignment;
        assert_eq!(assignment.k(), 2);
        assert!(same_cluster(assignment, "00", "01"));
        assert!(same_cluster(assignment, "10", "11"));
        assert!(!same_cluster(assignment, "00", "10"));

        // Cross-half affinities underflow to zero, leaving two components
        assert_eq!(result.zero_multiplicity, 2);
        assert_eq!(
            result.warnings,
            vec![AnalysisWarning::DisconnectedGraph { components: 2 }]
        );
    }

    #[test]
    fn test_agglomerative_kl_two_clusters() {
        let units = grid_2x2_units();
        let counts = grid_2x2_counts();
        let index = SpatialIndex::new(&units, CoordinateSystem::Projected).unwrap();

        let graph = InformationGraphBuilder::new(Divergence::KullbackLeibler, rook())
            .build(&index, &counts)
            .unwrap();
        let dendrogram = AgglomerativeInfoClusterer::new()
            .cluster_with_defaults(&graph)
            .unwrap();
        let assignment = dendrogram.cutree(2).unwrap();

        assert!(same_cluster(&assignment, "00", "01"));
        assert!(same_cluster(&assignment, "10", "11"));
        assert!(!same_cluster(&assignment, "00", "10"));

        // Two pure halves against a 50/50 reference: one bit (ln 2 nats) retained
        let retained = dendrogram.information_retained(2).unwrap();
        assert!((retained - std::f64::consts::LN_2).abs() < 1e-9);

        // Same bit read off the heights: height[last] - height[last - 1]
        let captured = dendrogram.information_captured(1).unwrap();
        assert!((captured - std::f64::consts::LN_2).abs() < 1e-9);
        assert_eq!(dendrogram.information_curve().len(), 3);
    }

    #[test]
    fn test_full_pipeline() {
        let config = AnalysisConfig::new(Divergence::KullbackLeibler, 1.0)
            .with_smoothing(true)
            .with_clusters(2)
            .with_seed(11);
        let report = InfoGeoAnalysis::new(config)
            .unwrap()
            .run(&grid_2x2_units(), rook(), &grid_2x2_counts())
            .unwrap();

        assert_eq!(report.field.len(), 4);
        assert!(report.field.is_complete());
        assert!(report
            .field
            .tensors
            .iter()
            .all(|t| t.tensor.is_symmetric() && t.tensor.is_finite()));
        assert_eq!(report.spectral.assignment.labels(), &[1, 1, 2, 2]);
        assert_eq!(report.hierarchical.labels(), &[1, 1, 2, 2]);
        assert_eq!(report.graph.cluster_of(&NodeKey::spatial("11")), Some(2));
        assert_eq!(report.dendrogram.merges().len(), 3);
    }
}

#[cfg(test)]
mod zero_counts {
    use super::*;

    fn single_zero_unit() -> (SpatialIndex, CountTable) {
        let index =
            SpatialIndex::new(&[Unit::new("z", 3.0, 4.0)], CoordinateSystem::Projected).unwrap();
        let counts = CountTable::from_vectors(
            Categories::new(["g1", "g2", "g3"]).unwrap(),
            vec![(NodeKey::spatial("z"), vec![0.0, 0.0, 0.0])],
        )
        .unwrap();
        (index, counts)
    }

    #[test]
    fn test_kl_without_smoothing_is_degenerate() {
        let (index, counts) = single_zero_unit();
        let field = KernelField::new(&index, &counts).unwrap();
        let estimator = MetricTensorEstimator::new(
            &field,
            Divergence::KullbackLeibler,
            Bandwidth::new(1.0),
            CoordinateFrame::Spatial,
        )
        .unwrap();

        let err = estimator.estimate(&NodeKey::spatial("z")).unwrap_err();
        assert!(matches!(err, InfoGeoError::DegenerateDistribution { .. }));
        assert_eq!(err.stage(), "divergence");
    }

    #[test]
    fn test_kl_with_smoothing_is_finite() {
        let (index, counts) = single_zero_unit();
        let field = KernelField::new(&index, &counts).unwrap();
        let estimator = MetricTensorEstimator::new(
            &field,
            Divergence::KullbackLeibler,
            Bandwidth::new(1.0),
            CoordinateFrame::Spatial,
        )
        .unwrap()
        .with_smoothing(true);

        let unit = estimator.estimate(&NodeKey::spatial("z")).unwrap();
        assert!(unit.tensor.is_finite());
        assert!(unit.tensor.is_symmetric());
        assert_eq!(unit.tensor.dim(), 2);
        // Zero-count neighbourhood triggers every widening step
        assert!((unit.bandwidth.spatial - 1.5f64.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn test_batch_survives_degenerate_unit() {
        let units = vec![Unit::new("a", 0.0, 0.0), Unit::new("far", 100.0, 0.0)];
        let index = SpatialIndex::new(&units, CoordinateSystem::Projected).unwrap();
        let counts = CountTable::from_vectors(
            Categories::new(["g1", "g2"]).unwrap(),
            vec![
                (NodeKey::spatial("a"), vec![30.0, 70.0]),
                (NodeKey::spatial("far"), vec![0.0, 0.0]),
            ],
        )
        .unwrap();
        let field = KernelField::new(&index, &counts).unwrap();
        let estimator = MetricTensorEstimator::new(
            &field,
            Divergence::KullbackLeibler,
            Bandwidth::new(1.0),
            CoordinateFrame::Spatial,
        )
        .unwrap();

        let nodes: Vec<NodeKey> = counts.nodes().cloned().collect();
        let metric = estimator.estimate_all(&nodes);
        assert_eq!(metric.len(), 1);
        assert_eq!(metric.failures.len(), 1);
        assert_eq!(metric.failures[0].0, NodeKey::spatial("far"));
    }
}

#[cfg(test)]
mod spatio_temporal {
    use super::*;

    fn panel() -> (Vec<Unit>, CountTable) {
        let units: Vec<Unit> = (0..4)
            .map(|i| Unit::new(format!("u{}", i), i as f64, 0.0))
            .collect();
        let mut records = Vec::new();
        for i in 0..4 {
            for (t, period) in [2000, 2010, 2020].into_iter().enumerate() {
                let share = 20.0 + 10.0 * i as f64 + 15.0 * t as f64;
                records.push(CountRecord::new(format!("u{}", i), "g1", share).at_period(period));
                records.push(
                    CountRecord::new(format!("u{}", i), "g2", 100.0 - share).at_period(period),
                );
            }
        }
        (units, CountTable::from_records(&records).unwrap())
    }

    #[test]
    fn test_temporal_run() {
        let (units, counts) = panel();
        let config = AnalysisConfig::new(Divergence::KullbackLeibler, 1.0)
            .with_temporal(10.0)
            .with_clusters(2);
        let report = InfoGeoAnalysis::new(config)
            .unwrap()
            .run(&units, AdjacencyRule::KNearest { k: 1 }, &counts)
            .unwrap();

        assert_eq!(report.graph.node_count(), 12);
        let temporal = report
            .graph
            .edges()
            .iter()
            .filter(|e| e.kind == EdgeKind::Temporal)
            .count();
        assert_eq!(temporal, 8);
        assert_eq!(report.field.frame, CoordinateFrame::SpatioTemporal);
        for unit in &report.field.tensors {
            assert_eq!(unit.tensor.dim(), 3);
            assert!(unit.tensor.temporal_component().is_some());
        }
    }
}

#[cfg(test)]
mod geographic {
    use super::*;

    #[test]
    fn test_geographic_distance_threshold_in_km() {
        // Roughly 11 km apart in latitude
        let units = vec![
            Unit::new("north", -87.6, 42.0),
            Unit::new("south", -87.6, 41.9),
            Unit::new("remote", -80.0, 35.0),
        ];
        let index = SpatialIndex::new(&units, CoordinateSystem::Geographic).unwrap();
        let pairs = AdjacencyRule::DistanceThreshold { max_distance: 15.0 }
            .pairs(&index)
            .unwrap();
        assert_eq!(pairs.len(), 1);

        let counts = CountTable::from_vectors(
            Categories::new(["g1", "g2"]).unwrap(),
            vec![
                (NodeKey::spatial("north"), vec![60.0, 40.0]),
                (NodeKey::spatial("south"), vec![40.0, 60.0]),
                (NodeKey::spatial("remote"), vec![50.0, 50.0]),
            ],
        )
        .unwrap();
        let field = KernelField::new(&index, &counts).unwrap();
        let estimator = MetricTensorEstimator::new(
            &field,
            Divergence::KullbackLeibler,
            Bandwidth::new(10.0),
            CoordinateFrame::Spatial,
        )
        .unwrap();
        let unit = estimator.estimate(&NodeKey::spatial("north")).unwrap();
        // Composition changes north-south, not east-west
        assert!(unit.tensor.get(1, 1) > unit.tensor.get(0, 0).abs());
    }
}
