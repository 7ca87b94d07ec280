//! The learning engine facade
//!
//! [`LearningEngine`] owns the three stores and the four pipeline stages and
//! wires them together behind a single-writer API: methods take `&mut self`
//! and callers serialize access themselves. Only the optional external index
//! makes the engine async; everything else computes inline.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::consolidate::{ConsolidationConfig, ConsolidationEngine, ConsolidationReport};
use crate::distill::{DistillConfig, Distiller};
use crate::error::{PraxisError, Result};
use crate::events::{EngineEvent, EventListener, ListenerId, ListenerRegistry};
use crate::index::{IndexRecord, VectorIndex};
use crate::judge::{Judge, JudgeConfig};
use crate::retrieval::{RetrievalConfig, RetrievalEngine};
use crate::stats::{EngineStats, PipelineStats};
use crate::store::{MemoryStore, PatternStore, TrajectoryStore};
use crate::types::{
    DistilledMemory, EngineConfig, MemoryEntry, Pattern, RetrievalResult, Trajectory,
    TrajectoryId, TrajectoryVerdict,
};

/// Experience-learning engine: store, judge, distill, retrieve, consolidate
pub struct LearningEngine {
    config: EngineConfig,
    trajectories: TrajectoryStore,
    memories: MemoryStore,
    patterns: PatternStore,
    retrieval: RetrievalEngine,
    judge: Judge,
    distiller: Distiller,
    consolidation: ConsolidationEngine,
    index: Option<Box<dyn VectorIndex>>,
    listeners: ListenerRegistry,
    stats: PipelineStats,
}

impl LearningEngine {
    /// Create an engine without an external index
    pub fn new(config: EngineConfig) -> Self {
        Self::with_index(config, None)
    }

    /// Create an engine with an optional external vector index
    ///
    /// The index is ignored when `enable_external_index` is off.
    pub fn with_index(config: EngineConfig, index: Option<Box<dyn VectorIndex>>) -> Self {
        let index = if config.enable_external_index {
            index
        } else {
            None
        };

        let retrieval = RetrievalEngine::new(RetrievalConfig {
            mmr_lambda: config.mmr_lambda,
            ..Default::default()
        });
        let judge = Judge::new(JudgeConfig {
            distillation_threshold: config.distillation_threshold,
        });
        let distiller = Distiller::new(DistillConfig {
            distillation_threshold: config.distillation_threshold,
            vector_dimension: config.vector_dimension,
        });
        let consolidation = ConsolidationEngine::new(ConsolidationConfig {
            dedup_threshold: config.dedup_threshold,
            enable_contradiction_detection: config.enable_contradiction_detection,
            max_pattern_age_days: config.max_pattern_age_days,
            ..Default::default()
        });

        Self {
            trajectories: TrajectoryStore::new(config.max_trajectories),
            memories: MemoryStore::new(),
            patterns: PatternStore::new(),
            retrieval,
            judge,
            distiller,
            consolidation,
            index,
            listeners: ListenerRegistry::new(),
            stats: PipelineStats::default(),
            config,
        }
    }

    /// Create an engine backed by a remote vector index at `base_url`,
    /// scoped to the configured `namespace`
    #[cfg(feature = "remote-index")]
    pub fn with_remote_index(config: EngineConfig, base_url: &str) -> Self {
        let index = crate::index::HttpVectorIndex::new(base_url, config.namespace.clone());
        Self::with_index(config, Some(Box::new(index)))
    }

    /// Initialize the external index if one is configured
    ///
    /// A failing index is dropped rather than propagated: the engine runs
    /// degraded on exact scans instead of refusing to start.
    pub async fn initialize(&mut self) {
        if let Some(index) = &self.index {
            match index.initialize().await {
                Ok(()) => info!("external vector index initialized"),
                Err(err) => {
                    warn!(error = %err, "external index unavailable, running on exact scans");
                    self.index = None;
                }
            }
        }
    }

    /// Release the external index, if any
    pub async fn shutdown(&mut self) {
        if let Some(index) = self.index.take() {
            if let Err(err) = index.close().await {
                warn!(error = %err, "error closing external index");
            }
        }
    }

    /// Store a trajectory; complete ones announce themselves to listeners
    pub fn store_trajectory(&mut self, trajectory: Trajectory) {
        let event = trajectory.is_complete.then(|| EngineEvent::TrajectoryCompleted {
            trajectory_id: trajectory.trajectory_id.clone(),
            quality_score: trajectory.quality_score,
        });
        self.trajectories.store(trajectory);
        if let Some(event) = event {
            self.listeners.emit(&event);
        }
    }

    /// Judge a stored trajectory and attach the verdict to it
    pub fn judge_trajectory(&mut self, trajectory_id: &str) -> Result<TrajectoryVerdict> {
        let started = Instant::now();
        let trajectory = self
            .trajectories
            .get(trajectory_id)
            .ok_or_else(|| PraxisError::TrajectoryNotFound(trajectory_id.to_string()))?;
        let verdict = self.judge.judge(trajectory)?;

        if let Some(trajectory) = self.trajectories.get_mut(trajectory_id) {
            trajectory.verdict = Some(verdict.clone());
        }
        self.stats.judge.record(started.elapsed());
        Ok(verdict)
    }

    /// Distill a trajectory into a memory, judging it first when needed
    ///
    /// Returns `Ok(None)` when the trajectory does not qualify (failed
    /// verdict or quality below the threshold). On success the memory enters
    /// the pool and is mirrored to the external index best-effort.
    pub async fn distill(&mut self, trajectory_id: &str) -> Result<Option<DistilledMemory>> {
        let needs_verdict = self
            .trajectories
            .get(trajectory_id)
            .ok_or_else(|| PraxisError::TrajectoryNotFound(trajectory_id.to_string()))?
            .verdict
            .is_none();
        if needs_verdict {
            self.judge_trajectory(trajectory_id)?;
        }

        let started = Instant::now();
        let trajectory = self
            .trajectories
            .get(trajectory_id)
            .ok_or_else(|| PraxisError::TrajectoryNotFound(trajectory_id.to_string()))?
            .clone();
        let verdict = trajectory.verdict.clone().ok_or_else(|| {
            PraxisError::Internal(format!("trajectory {} lost its verdict", trajectory_id))
        })?;

        let Some(memory) = self.distiller.distill(&trajectory, &verdict) else {
            self.stats.distillation.record(started.elapsed());
            debug!(trajectory_id, "trajectory did not qualify for distillation");
            return Ok(None);
        };

        if let Some(t) = self.trajectories.get_mut(trajectory_id) {
            t.distilled_memory = Some(memory.memory_id.clone());
        }
        self.memories.insert(MemoryEntry {
            memory: memory.clone(),
            trajectory,
            verdict,
            consolidated: false,
        });
        self.mirror_to_index(&memory).await;

        self.stats.distillation.record(started.elapsed());
        Ok(Some(memory))
    }

    /// Distill a batch of trajectories, collecting the produced memories
    ///
    /// Fails on the first missing or incomplete trajectory; trajectories
    /// that merely do not qualify are skipped.
    pub async fn distill_batch(
        &mut self,
        trajectory_ids: &[TrajectoryId],
    ) -> Result<Vec<DistilledMemory>> {
        let mut memories = Vec::new();
        for id in trajectory_ids {
            if let Some(memory) = self.distill(id).await? {
                memories.push(memory);
            }
        }
        Ok(memories)
    }

    async fn mirror_to_index(&self, memory: &DistilledMemory) {
        let Some(index) = self.index.as_deref().filter(|i| i.is_available()) else {
            return;
        };

        let entry = match self.memories.get(&memory.memory_id) {
            Some(entry) => entry,
            None => return,
        };
        let mut metadata = std::collections::HashMap::new();
        metadata.insert(
            "domain".to_string(),
            serde_json::Value::String(entry.trajectory.domain.clone()),
        );
        metadata.insert(
            "trajectory_id".to_string(),
            serde_json::Value::String(memory.trajectory_id.clone()),
        );
        metadata.insert("quality".to_string(), serde_json::json!(memory.quality));

        let record = IndexRecord {
            content: memory.strategy.clone(),
            embedding: memory.embedding.clone(),
            metadata,
        };
        if let Err(err) = index.store(&memory.memory_id, record).await {
            warn!(memory_id = %memory.memory_id, error = %err, "best-effort index mirror failed");
        }
    }

    /// Retrieve relevant, mutually diverse memories for a query embedding
    ///
    /// `k` defaults to the configured `retrieval_k`. Returned memories get
    /// their usage counters bumped.
    pub async fn retrieve(&mut self, query: &[f32], k: Option<usize>) -> Vec<RetrievalResult> {
        let started = Instant::now();
        let k = k.unwrap_or(self.config.retrieval_k);
        let results = self
            .retrieval
            .retrieve(&self.memories, self.index.as_deref(), query, k)
            .await;

        for result in &results {
            self.memories.record_usage(&result.memory.memory_id);
        }
        self.stats.retrieval.record(started.elapsed());
        results
    }

    /// Lexical retrieval for callers without a query embedding
    pub fn retrieve_by_content(&mut self, text: &str, k: Option<usize>) -> Vec<RetrievalResult> {
        let started = Instant::now();
        let k = k.unwrap_or(self.config.retrieval_k);
        let results = self.retrieval.retrieve_by_content(&self.memories, text, k);

        for result in &results {
            self.memories.record_usage(&result.memory.memory_id);
        }
        self.stats.retrieval.record(started.elapsed());
        results
    }

    /// Run one consolidation sweep over the memory and pattern pools
    pub async fn consolidate(&mut self) -> ConsolidationReport {
        let started = Instant::now();
        let report = self
            .consolidation
            .consolidate(&mut self.memories, &mut self.patterns, self.index.as_deref())
            .await;
        self.stats.consolidation.record(started.elapsed());

        self.listeners.emit(&EngineEvent::MemoryConsolidated {
            memories_count: self.memories.len(),
        });
        report
    }

    /// Promote a stored memory into a new pattern
    pub fn memory_to_pattern(&mut self, memory_id: &str) -> Result<Pattern> {
        let entry = self
            .memories
            .get(memory_id)
            .ok_or_else(|| PraxisError::MemoryNotFound(memory_id.to_string()))?
            .clone();
        Ok(self.patterns.memory_to_pattern(&entry))
    }

    /// Fold a trajectory's outcome into an existing pattern
    ///
    /// Missing patterns are a silent no-op, mirroring the pattern store.
    pub fn evolve_pattern(&mut self, pattern_id: &str, trajectory: &Trajectory) {
        if let Some(record) = self.patterns.evolve(pattern_id, trajectory) {
            self.listeners.emit(&EngineEvent::PatternEvolved {
                pattern_id: pattern_id.to_string(),
                evolution_type: record.kind,
            });
        }
    }

    /// Top-k patterns by embedding similarity
    pub fn find_patterns(&self, query: &[f32], k: usize) -> Vec<&Pattern> {
        self.patterns.find_patterns(query, k)
    }

    pub fn subscribe(&mut self, listener: Box<dyn EventListener>) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Point-in-time snapshot of pool sizes and stage counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            trajectory_count: self.trajectories.len(),
            memory_count: self.memories.len(),
            pattern_count: self.patterns.len(),
            retrieval: self.stats.retrieval,
            judge: self.stats.judge,
            distillation: self.stats.distillation,
            consolidation: self.stats.consolidation,
            external_index_active: self.index.as_ref().is_some_and(|i| i.is_available()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn trajectories(&self) -> &TrajectoryStore {
        &self.trajectories
    }

    pub fn memories(&self) -> &MemoryStore {
        &self.memories
    }

    pub fn patterns(&self) -> &PatternStore {
        &self.patterns
    }
}
