//! Property-based tests for the engine invariants

use std::collections::HashSet;

use proptest::prelude::*;

use praxis::{EngineConfig, LearningEngine, Trajectory, TrajectoryStep};
use praxis::vector::cosine_similarity;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn embedding() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0, 3)
}

proptest! {
    #[test]
    fn cosine_similarity_is_bounded(a in embedding(), b in embedding()) {
        let sim = cosine_similarity(&a, &b);
        prop_assert!((-1.0001..=1.0001).contains(&sim));
    }

    #[test]
    fn cosine_similarity_is_symmetric(a in embedding(), b in embedding()) {
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        prop_assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn self_similarity_is_one_for_nonzero(a in embedding()) {
        prop_assume!(a.iter().any(|x| x.abs() > 0.01));
        let sim = cosine_similarity(&a, &a);
        prop_assert!((sim - 1.0).abs() < 1e-4);
    }

    #[test]
    fn retrieval_is_bounded_and_unique(
        embeddings in proptest::collection::vec(embedding(), 1..20),
        query in embedding(),
        k in 0usize..8,
    ) {
        let rt = runtime();
        rt.block_on(async {
            let mut engine = LearningEngine::new(EngineConfig {
                vector_dimension: 3,
                ..Default::default()
            });

            for (i, state) in embeddings.iter().enumerate() {
                let steps = vec![TrajectoryStep::new("act", 0.9, state.clone())];
                engine.store_trajectory(Trajectory::new(
                    format!("t-{}", i),
                    "testing",
                    steps,
                    true,
                    0.9,
                ));
                engine.distill(&format!("t-{}", i)).await.unwrap();
            }

            let results = engine.retrieve(&query, Some(k)).await;
            assert!(results.len() <= k);

            let ids: HashSet<&str> =
                results.iter().map(|r| r.memory.memory_id.as_str()).collect();
            assert_eq!(ids.len(), results.len());
        });
    }

    #[test]
    fn trajectory_store_never_exceeds_capacity(
        qualities in proptest::collection::vec(0.0f32..1.0, 1..60),
        max in 5usize..20,
    ) {
        let mut engine = LearningEngine::new(EngineConfig {
            max_trajectories: max,
            vector_dimension: 2,
            ..Default::default()
        });

        for (i, q) in qualities.iter().enumerate() {
            engine.store_trajectory(Trajectory::new(
                format!("t-{}", i),
                "testing",
                vec![],
                true,
                *q,
            ));
            prop_assert!(engine.trajectories().len() <= max);
        }
    }

    #[test]
    fn consolidation_never_grows_the_memory_pool(
        embeddings in proptest::collection::vec(embedding(), 0..12),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let mut engine = LearningEngine::new(EngineConfig {
                vector_dimension: 3,
                ..Default::default()
            });

            for (i, state) in embeddings.iter().enumerate() {
                let steps = vec![TrajectoryStep::new("act", 0.9, state.clone())];
                engine.store_trajectory(Trajectory::new(
                    format!("t-{}", i),
                    "testing",
                    steps,
                    true,
                    0.9,
                ));
                engine.distill(&format!("t-{}", i)).await.unwrap();
            }

            let before = engine.memories().len();
            let report = engine.consolidate().await;
            let after = engine.memories().len();
            assert!(after <= before);
            assert_eq!(before - after, report.removed_duplicates);

            // A second sweep over an already-deduplicated pool removes nothing
            let second = engine.consolidate().await;
            assert_eq!(second.removed_duplicates, 0);
        });
    }

    #[test]
    fn distillation_respects_the_quality_gate(quality in 0.0f32..1.0) {
        let rt = runtime();
        rt.block_on(async {
            let mut engine = LearningEngine::new(EngineConfig {
                vector_dimension: 2,
                ..Default::default()
            });
            let steps = vec![TrajectoryStep::new("act", 0.9, vec![1.0, 0.0])];
            engine.store_trajectory(Trajectory::new("t-1", "testing", steps, true, quality));

            let memory = engine.distill("t-1").await.unwrap();
            if quality >= 0.6 {
                assert!(memory.is_some());
            } else {
                assert!(memory.is_none());
            }
        });
    }
}
