//! Rule-based trajectory evaluation
//!
//! Produces a verdict from step-level aggregates: average reward, the
//! fraction of strongly-positive steps, and the reward trend across the
//! episode. Judging an incomplete trajectory is a contract violation.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{PraxisError, Result};
use crate::types::{Trajectory, TrajectoryStep, TrajectoryVerdict};

/// Step reward above which a step counts as positive
const POSITIVE_REWARD: f32 = 0.5;

/// Configuration for the judge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Minimum quality score for a trajectory to count as successful
    pub distillation_threshold: f32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            distillation_threshold: 0.6,
        }
    }
}

/// Step-level aggregates feeding the verdict rules
#[derive(Debug, Clone, Copy)]
struct StepAnalysis {
    avg_reward: f32,
    positive_ratio: f32,
    trajectory_delta: f32,
    step_count: usize,
}

/// Rule-based trajectory evaluator
pub struct Judge {
    config: JudgeConfig,
}

impl Judge {
    pub fn new(config: JudgeConfig) -> Self {
        Self { config }
    }

    /// Evaluate a complete trajectory and produce a verdict
    ///
    /// Fails with [`PraxisError::IncompleteTrajectory`] when the trajectory
    /// has not finished; an unfinished episode carries no signal about the
    /// outcome of its strategy.
    pub fn judge(&self, trajectory: &Trajectory) -> Result<TrajectoryVerdict> {
        if !trajectory.is_complete {
            return Err(PraxisError::IncompleteTrajectory(
                trajectory.trajectory_id.clone(),
            ));
        }

        let analysis = analyze_steps(&trajectory.steps);
        let quality = trajectory.quality_score;

        let success =
            quality >= self.config.distillation_threshold && analysis.positive_ratio > 0.6;

        let mut strengths = Vec::new();
        if analysis.avg_reward > 0.7 {
            strengths.push("Consistently high step rewards".to_string());
        }
        if analysis.trajectory_delta > 0.2 {
            strengths.push("Strong improvement over the episode".to_string());
        }
        if quality > 0.8 {
            strengths.push("High overall quality".to_string());
        }
        if analysis.step_count < 5 && quality > 0.6 {
            strengths.push("Efficient solution with few steps".to_string());
        }

        // Each weakness maps to exactly one improvement
        let mut weaknesses = Vec::new();
        let mut improvements = Vec::new();
        if analysis.avg_reward < 0.4 {
            weaknesses.push("Low average reward across steps".to_string());
            improvements.push("Consider alternative strategies per step".to_string());
        }
        if analysis.trajectory_delta < -0.1 {
            weaknesses.push("Performance degraded over the episode".to_string());
            improvements.push("Re-plan when rewards start declining".to_string());
        }
        if analysis.positive_ratio < 0.5 {
            weaknesses.push("Most steps produced weak rewards".to_string());
            improvements.push("Prune low-reward actions earlier".to_string());
        }
        if analysis.step_count > 10 && quality < 0.7 {
            weaknesses.push("Long trajectory without a quality payoff".to_string());
            improvements.push("Shorten the approach or checkpoint progress sooner".to_string());
        }

        let confidence = 0.3 * (analysis.step_count as f32 / 10.0).min(1.0)
            + 0.4 * analysis.positive_ratio
            + 0.3 * (2.0 * (quality - 0.5).abs());

        let age_days = (Utc::now() - trajectory.start_time).num_milliseconds().max(0) as f32
            / 86_400_000.0;
        let relevance_score = 0.7 * quality + 0.3 * (-age_days / 30.0).exp();

        Ok(TrajectoryVerdict {
            success,
            confidence,
            strengths,
            weaknesses,
            improvements,
            relevance_score,
        })
    }
}

impl Default for Judge {
    fn default() -> Self {
        Self::new(JudgeConfig::default())
    }
}

fn analyze_steps(steps: &[TrajectoryStep]) -> StepAnalysis {
    let step_count = steps.len();
    if step_count == 0 {
        return StepAnalysis {
            avg_reward: 0.0,
            positive_ratio: 0.0,
            trajectory_delta: 0.0,
            step_count: 0,
        };
    }

    let avg_reward = steps.iter().map(|s| s.reward).sum::<f32>() / step_count as f32;
    let positive_ratio =
        steps.iter().filter(|s| s.reward > POSITIVE_REWARD).count() as f32 / step_count as f32;
    let trajectory_delta = if step_count <= 1 {
        0.0
    } else {
        steps[step_count - 1].reward - steps[0].reward
    };

    StepAnalysis {
        avg_reward,
        positive_ratio,
        trajectory_delta,
        step_count,
    }
}
