//! Distillation of judged trajectories into reusable strategy memories
//!
//! Only successful trajectories at or above the distillation threshold
//! produce a memory. The memory embedding is a recency-weighted mean of the
//! step state embeddings so later states dominate the representation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DistilledMemory, Trajectory, TrajectoryStep, TrajectoryVerdict};
use crate::vector::weighted_mean;

/// Most strength/improvement lines carried into key learnings
const MAX_VERDICT_LEARNINGS: usize = 2;

/// Most distinct actions named in a multi-step strategy summary
const MAX_SUMMARY_ACTIONS: usize = 3;

/// Configuration for the distillation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistillConfig {
    /// Minimum quality score for a trajectory to be distilled
    pub distillation_threshold: f32,
    /// Dimension of the aggregated embedding (used for the 0-step case)
    pub vector_dimension: usize,
}

impl Default for DistillConfig {
    fn default() -> Self {
        Self {
            distillation_threshold: 0.6,
            vector_dimension: 768,
        }
    }
}

/// Converts judged trajectories into distilled memories
pub struct Distiller {
    config: DistillConfig,
}

impl Distiller {
    pub fn new(config: DistillConfig) -> Self {
        Self { config }
    }

    /// Build a distilled memory from a judged trajectory
    ///
    /// Returns `None` when the verdict is unsuccessful or the quality score
    /// is below the distillation threshold; such experience stays in the
    /// trajectory store but never enters the memory pool.
    pub fn distill(
        &self,
        trajectory: &Trajectory,
        verdict: &TrajectoryVerdict,
    ) -> Option<DistilledMemory> {
        if !verdict.success || trajectory.quality_score < self.config.distillation_threshold {
            return None;
        }

        Some(DistilledMemory {
            memory_id: Uuid::new_v4().to_string(),
            trajectory_id: trajectory.trajectory_id.clone(),
            strategy: strategy_text(&trajectory.steps),
            key_learnings: key_learnings(trajectory, verdict),
            embedding: self.aggregate_embedding(&trajectory.steps),
            quality: trajectory.quality_score,
            usage_count: 0,
            last_used: Utc::now(),
        })
    }

    /// Recency-weighted mean of step state embeddings, weight (i+1)/n
    fn aggregate_embedding(&self, steps: &[TrajectoryStep]) -> Vec<f32> {
        if steps.is_empty() {
            return vec![0.0; self.config.vector_dimension];
        }
        let n = steps.len() as f32;
        let vectors: Vec<&[f32]> = steps.iter().map(|s| s.state_after.as_slice()).collect();
        let weights: Vec<f32> = (0..steps.len()).map(|i| (i + 1) as f32 / n).collect();
        weighted_mean(&vectors, &weights, self.config.vector_dimension)
    }
}

impl Default for Distiller {
    fn default() -> Self {
        Self::new(DistillConfig::default())
    }
}

/// Render the distinct step actions as a short strategy description
fn strategy_text(steps: &[TrajectoryStep]) -> String {
    let mut distinct: Vec<&str> = Vec::new();
    for step in steps {
        if !distinct.contains(&step.action.as_str()) {
            distinct.push(step.action.as_str());
        }
    }

    if distinct.is_empty() {
        "No recorded actions".to_string()
    } else if distinct.len() <= MAX_SUMMARY_ACTIONS {
        format!("Apply {}", distinct.join(" -> "))
    } else {
        format!(
            "Multi-step approach: {}...",
            distinct[..MAX_SUMMARY_ACTIONS].join(", ")
        )
    }
}

fn key_learnings(trajectory: &Trajectory, verdict: &TrajectoryVerdict) -> Vec<String> {
    let mut learnings = Vec::new();
    if verdict.success {
        learnings.push(format!(
            "Successful approach in the {} domain",
            trajectory.domain
        ));
        learnings.extend(
            verdict
                .strengths
                .iter()
                .take(MAX_VERDICT_LEARNINGS)
                .map(|s| format!("Strength: {}", s)),
        );
    } else {
        learnings.push(format!(
            "Partial experience from the {} domain",
            trajectory.domain
        ));
        learnings.extend(
            verdict
                .improvements
                .iter()
                .take(MAX_VERDICT_LEARNINGS)
                .map(|s| format!("Improvement: {}", s)),
        );
    }
    learnings
}
