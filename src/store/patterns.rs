//! Pattern store and evolution bookkeeping
//!
//! Patterns are long-lived generalized strategies seeded from distilled
//! memories. Evolution appends to a bounded quality history and keeps
//! `success_rate` equal to its arithmetic mean.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::types::{
    EvolutionRecord, EvolutionType, MemoryEntry, Pattern, PatternId, Trajectory,
    QUALITY_HISTORY_LIMIT,
};
use crate::vector::cosine_similarity;

/// Quality delta below which an evolution is recorded as a prune signal
const PRUNE_DELTA: f32 = -0.1;

/// Owns patterns keyed by id, in insertion order for deterministic sweeps
#[derive(Debug, Default)]
pub struct PatternStore {
    patterns: HashMap<PatternId, Pattern>,
    order: Vec<PatternId>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pattern: Pattern) {
        let id = pattern.pattern_id.clone();
        if self.patterns.insert(id.clone(), pattern).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Pattern> {
        self.patterns.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Pattern> {
        let removed = self.patterns.remove(id);
        if removed.is_some() {
            self.order.retain(|x| x != id);
        }
        removed
    }

    /// Iterate patterns in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.order.iter().filter_map(|id| self.patterns.get(id))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Create and store a new pattern seeded from a distilled memory
    ///
    /// The seed memory's quality becomes the sole quality-history entry, so
    /// the initial `success_rate` equals the memory's quality.
    pub fn memory_to_pattern(&mut self, entry: &MemoryEntry) -> Pattern {
        let now = Utc::now();
        let pattern = Pattern {
            pattern_id: Uuid::new_v4().to_string(),
            name: format!("{} pattern", entry.trajectory.domain),
            domain: entry.trajectory.domain.clone(),
            embedding: entry.memory.embedding.clone(),
            strategy: entry.memory.strategy.clone(),
            success_rate: entry.memory.quality,
            usage_count: 0,
            quality_history: vec![entry.memory.quality],
            evolution_history: vec![],
            created_at: now,
            updated_at: now,
        };
        self.insert(pattern.clone());
        pattern
    }

    /// Fold a new experience into an existing pattern
    ///
    /// No-op when the pattern does not exist. Appends the trajectory's
    /// quality score to the history (FIFO-capped), recomputes the mean,
    /// bumps usage, and appends an evolution record. Returns the record so
    /// callers can emit an event for it.
    pub fn evolve(&mut self, pattern_id: &str, trajectory: &Trajectory) -> Option<EvolutionRecord> {
        let pattern = self.patterns.get_mut(pattern_id)?;
        let now = Utc::now();
        let previous = pattern.success_rate;

        pattern.quality_history.push(trajectory.quality_score);
        if pattern.quality_history.len() > QUALITY_HISTORY_LIMIT {
            let excess = pattern.quality_history.len() - QUALITY_HISTORY_LIMIT;
            pattern.quality_history.drain(..excess);
        }
        pattern.success_rate = mean(&pattern.quality_history);
        pattern.usage_count += 1;

        let delta = pattern.success_rate - previous;
        let kind = if delta < PRUNE_DELTA {
            EvolutionType::Prune
        } else {
            EvolutionType::Improvement
        };

        let record = EvolutionRecord {
            timestamp: now,
            kind,
            previous_quality: previous,
            new_quality: pattern.success_rate,
            description: format!(
                "Folded in trajectory {} ({:+.3})",
                trajectory.trajectory_id, delta
            ),
        };
        pattern.evolution_history.push(record.clone());
        pattern.updated_at = now;

        Some(record)
    }

    /// Brute-force cosine ranking over all patterns, top-k
    pub fn find_patterns(&self, query: &[f32], k: usize) -> Vec<&Pattern> {
        let mut scored: Vec<(&Pattern, f32)> = self
            .iter()
            .map(|p| (p, cosine_similarity(query, &p.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(p, _)| p).collect()
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistilledMemory, TrajectoryVerdict};

    fn create_test_entry(quality: f32, embedding: Vec<f32>) -> MemoryEntry {
        MemoryEntry {
            memory: DistilledMemory {
                memory_id: Uuid::new_v4().to_string(),
                trajectory_id: "traj-1".to_string(),
                strategy: "Apply probe -> fix".to_string(),
                key_learnings: vec![],
                embedding,
                quality,
                usage_count: 0,
                last_used: Utc::now(),
            },
            trajectory: Trajectory::new("traj-1", "testing", vec![], true, quality),
            verdict: TrajectoryVerdict {
                success: true,
                confidence: 0.8,
                strengths: vec![],
                weaknesses: vec![],
                improvements: vec![],
                relevance_score: 0.7,
            },
            consolidated: false,
        }
    }

    #[test]
    fn test_memory_to_pattern_seeds_success_rate() {
        let mut store = PatternStore::new();
        let entry = create_test_entry(0.85, vec![1.0, 0.0]);
        let pattern = store.memory_to_pattern(&entry);

        assert!((pattern.success_rate - 0.85).abs() < f32::EPSILON);
        assert_eq!(pattern.quality_history, vec![0.85]);
        assert!(pattern.evolution_history.is_empty());
        assert_eq!(pattern.domain, "testing");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evolve_recomputes_mean_and_bumps_usage() {
        let mut store = PatternStore::new();
        let pattern = store.memory_to_pattern(&create_test_entry(0.8, vec![1.0, 0.0]));

        let trajectory = Trajectory::new("traj-2", "testing", vec![], true, 0.6);
        let record = store.evolve(&pattern.pattern_id, &trajectory).unwrap();

        let evolved = store.get(&pattern.pattern_id).unwrap();
        assert!((evolved.success_rate - 0.7).abs() < 0.001);
        assert_eq!(evolved.usage_count, 1);
        assert_eq!(evolved.quality_history.len(), 2);
        assert_eq!(record.kind, EvolutionType::Improvement);
        assert!((record.previous_quality - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_evolve_records_prune_on_sharp_drop() {
        let mut store = PatternStore::new();
        let pattern = store.memory_to_pattern(&create_test_entry(0.9, vec![1.0, 0.0]));

        // Mean drops from 0.9 to 0.45, delta -0.45 < -0.1
        let trajectory = Trajectory::new("traj-2", "testing", vec![], true, 0.0);
        let record = store.evolve(&pattern.pattern_id, &trajectory).unwrap();
        assert_eq!(record.kind, EvolutionType::Prune);
    }

    #[test]
    fn test_evolve_missing_pattern_is_noop() {
        let mut store = PatternStore::new();
        let trajectory = Trajectory::new("traj-1", "testing", vec![], true, 0.5);
        assert!(store.evolve("nope", &trajectory).is_none());
    }

    #[test]
    fn test_quality_history_is_bounded() {
        let mut store = PatternStore::new();
        let pattern = store.memory_to_pattern(&create_test_entry(0.5, vec![1.0, 0.0]));

        for i in 0..150 {
            let trajectory =
                Trajectory::new(format!("traj-{}", i), "testing", vec![], true, 0.5);
            store.evolve(&pattern.pattern_id, &trajectory);
        }

        let evolved = store.get(&pattern.pattern_id).unwrap();
        assert_eq!(evolved.quality_history.len(), QUALITY_HISTORY_LIMIT);
        assert_eq!(evolved.usage_count, 150);
    }

    #[test]
    fn test_find_patterns_ranks_by_similarity() {
        let mut store = PatternStore::new();
        let a = store.memory_to_pattern(&create_test_entry(0.5, vec![1.0, 0.0]));
        let b = store.memory_to_pattern(&create_test_entry(0.5, vec![0.0, 1.0]));

        let found = store.find_patterns(&[1.0, 0.1], 2);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].pattern_id, a.pattern_id);
        assert_eq!(found[1].pattern_id, b.pattern_id);

        let top1 = store.find_patterns(&[0.1, 1.0], 1);
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].pattern_id, b.pattern_id);
    }
}
