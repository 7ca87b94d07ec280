//! Core types for praxis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a trajectory
pub type TrajectoryId = String;

/// Unique identifier for a distilled memory
pub type MemoryId = String;

/// Unique identifier for a pattern
pub type PatternId = String;

/// One action taken within a trajectory. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryStep {
    /// Action the agent took
    pub action: String,
    /// Reward observed after the action
    pub reward: f32,
    /// Embedding of the environment state after the action
    pub state_after: Vec<f32>,
}

impl TrajectoryStep {
    pub fn new(action: impl Into<String>, reward: f32, state_after: Vec<f32>) -> Self {
        Self {
            action: action.into(),
            reward,
            state_after,
        }
    }
}

/// A recorded episode of agent behavior
///
/// `verdict` and `distilled_memory` are only set after the trajectory has
/// passed through the judge/distill stages; an incomplete trajectory is
/// never judged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Unique identifier
    pub trajectory_id: TrajectoryId,
    /// Free-form category (e.g. "finance", "topology")
    pub domain: String,
    /// Ordered steps of the episode
    pub steps: Vec<TrajectoryStep>,
    /// Whether the episode finished
    pub is_complete: bool,
    /// Caller-supplied quality in [0.0, 1.0]
    pub quality_score: f32,
    /// When the episode started
    pub start_time: DateTime<Utc>,
    /// Verdict attached by the judge
    pub verdict: Option<TrajectoryVerdict>,
    /// Back-reference to the memory distilled from this trajectory.
    /// Non-owning: the memory may have been removed by consolidation.
    pub distilled_memory: Option<MemoryId>,
}

impl Trajectory {
    /// Create a new trajectory starting now, unjudged and undistilled
    pub fn new(
        trajectory_id: impl Into<TrajectoryId>,
        domain: impl Into<String>,
        steps: Vec<TrajectoryStep>,
        is_complete: bool,
        quality_score: f32,
    ) -> Self {
        Self {
            trajectory_id: trajectory_id.into(),
            domain: domain.into(),
            steps,
            is_complete,
            quality_score,
            start_time: Utc::now(),
            verdict: None,
            distilled_memory: None,
        }
    }
}

/// The judged quality assessment of a trajectory. Owned by its trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryVerdict {
    /// Whether the episode counts as a success
    pub success: bool,
    /// Confidence in the verdict (0.0 - 1.0)
    pub confidence: f32,
    /// What went well
    pub strengths: Vec<String>,
    /// What went poorly
    pub weaknesses: Vec<String>,
    /// Suggested improvements, derived 1:1 from weaknesses
    pub improvements: Vec<String>,
    /// Recency-decayed relevance of the experience
    pub relevance_score: f32,
}

/// A reusable, retrievable unit of learned strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistilledMemory {
    /// Unique identifier
    pub memory_id: MemoryId,
    /// Non-owning back-reference to the source trajectory
    pub trajectory_id: TrajectoryId,
    /// Human-readable strategy description
    pub strategy: String,
    /// Key takeaways extracted from the verdict
    pub key_learnings: Vec<String>,
    /// Recency-weighted aggregate of the step state embeddings
    pub embedding: Vec<f32>,
    /// Quality inherited from the source trajectory (0.0 - 1.0)
    pub quality: f32,
    /// Number of times returned by retrieval
    #[serde(default)]
    pub usage_count: u32,
    /// When the memory was last returned by retrieval
    pub last_used: DateTime<Utc>,
}

/// Stored wrapper around a distilled memory
///
/// Carries the owning trajectory snapshot and its verdict so consolidation
/// passes can reason about provenance without store lookups. `consolidated`
/// marks an entry as superseded by contradiction detection without deleting
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub memory: DistilledMemory,
    pub trajectory: Trajectory,
    pub verdict: TrajectoryVerdict,
    #[serde(default)]
    pub consolidated: bool,
}

/// Kind of change recorded in a pattern's evolution history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvolutionType {
    Improvement,
    Merge,
    Split,
    Prune,
}

impl EvolutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvolutionType::Improvement => "improvement",
            EvolutionType::Merge => "merge",
            EvolutionType::Split => "split",
            EvolutionType::Prune => "prune",
        }
    }
}

impl std::fmt::Display for EvolutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in a pattern's evolution history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionRecord {
    /// When the change happened
    pub timestamp: DateTime<Utc>,
    /// Kind of change
    #[serde(rename = "type")]
    pub kind: EvolutionType,
    /// Success rate before the change
    pub previous_quality: f32,
    /// Success rate after the change
    pub new_quality: f32,
    /// Human-readable summary of the change
    pub description: String,
}

/// A generalized, long-lived strategy aggregated from one or more memories
///
/// Invariant: `success_rate` always equals the arithmetic mean of
/// `quality_history`, which is bounded to the most recent
/// [`QUALITY_HISTORY_LIMIT`] entries (FIFO).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// Unique identifier
    pub pattern_id: PatternId,
    /// Short display name
    pub name: String,
    /// Domain the pattern applies to
    pub domain: String,
    /// Embedding inherited from the seed memory
    pub embedding: Vec<f32>,
    /// Strategy description
    pub strategy: String,
    /// Running mean of `quality_history`
    pub success_rate: f32,
    /// Number of experiences folded into this pattern
    pub usage_count: u32,
    /// Recent quality observations (bounded FIFO)
    pub quality_history: Vec<f32>,
    /// Audit trail of changes to this pattern
    pub evolution_history: Vec<EvolutionRecord>,
    /// When the pattern was created
    pub created_at: DateTime<Utc>,
    /// When the pattern was last touched
    pub updated_at: DateTime<Utc>,
}

/// Most quality-history entries retained per pattern
pub const QUALITY_HISTORY_LIMIT: usize = 100;

/// One scored retrieval hit. Transient, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The retrieved memory
    pub memory: DistilledMemory,
    /// Raw similarity to the query
    pub relevance_score: f32,
    /// 1 - max similarity to previously selected results
    pub diversity_score: f32,
    /// The MMR value this result was selected with
    pub combined_score: f32,
}

/// Recognized engine configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Trajectory store capacity; overflow evicts lowest-quality entries
    pub max_trajectories: usize,
    /// Minimum quality score for a trajectory to be distilled
    pub distillation_threshold: f32,
    /// Default number of results returned by retrieval
    pub retrieval_k: usize,
    /// MMR balance between relevance (1.0) and diversity (0.0)
    pub mmr_lambda: f32,
    /// Patterns untouched for longer than this are prune candidates
    pub max_pattern_age_days: i64,
    /// Similarity above which two memories are considered duplicates
    pub dedup_threshold: f32,
    /// Run the contradiction-detection pass during consolidation
    pub enable_contradiction_detection: bool,
    /// Expected embedding dimension for aggregated vectors
    pub vector_dimension: usize,
    /// Namespace used when mirroring into the external index
    pub namespace: String,
    /// Use the external vector index when one is supplied
    pub enable_external_index: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_trajectories: 5000,
            distillation_threshold: 0.6,
            retrieval_k: 3,
            mmr_lambda: 0.7,
            max_pattern_age_days: 30,
            dedup_threshold: 0.95,
            enable_contradiction_detection: true,
            vector_dimension: 768,
            namespace: "default".to_string(),
            enable_external_index: true,
        }
    }
}

impl EngineConfig {
    /// Build a config from defaults overridden by `PRAXIS_*` environment
    /// variables. Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }

        if let Some(v) = parse_env("PRAXIS_MAX_TRAJECTORIES") {
            config.max_trajectories = v;
        }
        if let Some(v) = parse_env("PRAXIS_DISTILLATION_THRESHOLD") {
            config.distillation_threshold = v;
        }
        if let Some(v) = parse_env("PRAXIS_RETRIEVAL_K") {
            config.retrieval_k = v;
        }
        if let Some(v) = parse_env("PRAXIS_MMR_LAMBDA") {
            config.mmr_lambda = v;
        }
        if let Some(v) = parse_env("PRAXIS_MAX_PATTERN_AGE_DAYS") {
            config.max_pattern_age_days = v;
        }
        if let Some(v) = parse_env("PRAXIS_DEDUP_THRESHOLD") {
            config.dedup_threshold = v;
        }
        if let Some(v) = parse_env("PRAXIS_ENABLE_CONTRADICTION_DETECTION") {
            config.enable_contradiction_detection = v;
        }
        if let Some(v) = parse_env("PRAXIS_VECTOR_DIMENSION") {
            config.vector_dimension = v;
        }
        if let Ok(v) = std::env::var("PRAXIS_NAMESPACE") {
            if !v.trim().is_empty() {
                config.namespace = v;
            }
        }
        if let Some(v) = parse_env("PRAXIS_ENABLE_EXTERNAL_INDEX") {
            config.enable_external_index = v;
        }

        config
    }
}
