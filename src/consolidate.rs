//! Multi-pass consolidation of the memory and pattern pools
//!
//! Four passes run in fixed order on every sweep: deduplication,
//! contradiction flagging, pattern aging, and pattern merging. Pair
//! generation is pluggable behind [`PairScan`]; the default pairwise scan is
//! O(n²) and adequate for pools up to a few thousand entries. Larger
//! deployments should plug a scan that shards by domain or reuses a spatial
//! index.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::index::VectorIndex;
use crate::store::{MemoryStore, PatternStore};
use crate::types::{EvolutionRecord, EvolutionType, QUALITY_HISTORY_LIMIT};
use crate::vector::cosine_similarity;

/// Counters accumulated by one consolidation sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub removed_duplicates: usize,
    pub contradictions_detected: usize,
    pub pruned_patterns: usize,
    pub merged_patterns: usize,
}

/// One item handed to a pair scan: id and embedding, borrowed from a store
#[derive(Debug, Clone, Copy)]
pub struct ScanItem<'a> {
    pub id: &'a str,
    pub embedding: &'a [f32],
}

/// Candidate-pair generation for the pairwise consolidation passes
///
/// Implementations yield every unordered pair of items whose embedding
/// similarity strictly exceeds `threshold`, as index pairs with `i < j`
/// following the input order.
pub trait PairScan: Send + Sync {
    fn scan(&self, items: &[ScanItem<'_>], threshold: f32) -> Vec<(usize, usize, f32)>;
}

/// Exhaustive O(n²) scan over all pairs
#[derive(Debug, Clone, Copy, Default)]
pub struct PairwiseScan;

impl PairScan for PairwiseScan {
    fn scan(&self, items: &[ScanItem<'_>], threshold: f32) -> Vec<(usize, usize, f32)> {
        let mut pairs = Vec::new();
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let similarity = cosine_similarity(items[i].embedding, items[j].embedding);
                if similarity > threshold {
                    debug!(
                        a = items[i].id,
                        b = items[j].id,
                        similarity,
                        "pair over threshold"
                    );
                    pairs.push((i, j, similarity));
                }
            }
        }
        pairs
    }
}

/// Configuration for the consolidation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Similarity above which two memories are duplicates
    pub dedup_threshold: f32,
    /// Similarity above which two memories can contradict
    pub contradiction_similarity: f32,
    /// Quality gap above which similar memories are contradictory
    pub contradiction_quality_gap: f32,
    /// Run the contradiction-detection pass
    pub enable_contradiction_detection: bool,
    /// Patterns untouched for longer than this are prune candidates
    pub max_pattern_age_days: i64,
    /// Usage count at or above which an aged pattern is retained
    pub min_usage_to_retain: u32,
    /// Similarity above which same-domain patterns merge
    pub merge_similarity: f32,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.95,
            contradiction_similarity: 0.8,
            contradiction_quality_gap: 0.4,
            enable_contradiction_detection: true,
            max_pattern_age_days: 30,
            min_usage_to_retain: 5,
            merge_similarity: 0.9,
        }
    }
}

/// Batch maintenance over the memory and pattern pools
pub struct ConsolidationEngine {
    config: ConsolidationConfig,
    scan: Box<dyn PairScan>,
}

impl ConsolidationEngine {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self::with_scan(config, Box::new(PairwiseScan))
    }

    pub fn with_scan(config: ConsolidationConfig, scan: Box<dyn PairScan>) -> Self {
        Self { config, scan }
    }

    /// Run all passes once, in fixed order, over the full collections
    pub async fn consolidate(
        &self,
        memories: &mut MemoryStore,
        patterns: &mut PatternStore,
        index: Option<&dyn VectorIndex>,
    ) -> ConsolidationReport {
        let report = ConsolidationReport {
            removed_duplicates: self.deduplicate(memories, index).await,
            contradictions_detected: if self.config.enable_contradiction_detection {
                self.detect_contradictions(memories)
            } else {
                0
            },
            pruned_patterns: self.prune_old_patterns(patterns),
            merged_patterns: self.merge_patterns(patterns),
        };

        debug!(
            removed_duplicates = report.removed_duplicates,
            contradictions = report.contradictions_detected,
            pruned = report.pruned_patterns,
            merged = report.merged_patterns,
            "consolidation sweep finished"
        );
        report
    }

    /// Delete the lower-quality memory of every near-duplicate pair
    ///
    /// Ties keep the first-inserted entry. Removal is mirrored to the
    /// external index best-effort.
    async fn deduplicate(
        &self,
        memories: &mut MemoryStore,
        index: Option<&dyn VectorIndex>,
    ) -> usize {
        let ids = memories.ids();
        let entries: Vec<_> = ids
            .iter()
            .filter_map(|id| memories.get(id))
            .map(|e| (e.memory.memory_id.clone(), e.memory.embedding.clone(), e.memory.quality))
            .collect();
        let items: Vec<ScanItem<'_>> = entries
            .iter()
            .map(|(id, embedding, _)| ScanItem {
                id,
                embedding,
            })
            .collect();

        let pairs = self.scan.scan(&items, self.config.dedup_threshold);

        let mut removed = vec![false; entries.len()];
        let mut victims: Vec<String> = Vec::new();
        for (i, j, _) in pairs {
            if removed[i] || removed[j] {
                continue;
            }
            // Lower quality loses; on a tie the first-inserted entry survives
            let victim = if entries[i].2 < entries[j].2 { i } else { j };
            removed[victim] = true;
            victims.push(entries[victim].0.clone());
        }

        for id in &victims {
            memories.remove(id);
            if let Some(index) = index.filter(|i| i.is_available()) {
                if let Err(err) = index.delete(id).await {
                    warn!(memory_id = %id, error = %err, "best-effort index delete failed");
                }
            }
        }

        victims.len()
    }

    /// Flag the lower-quality entry of similar pairs with a large quality gap
    ///
    /// The `consolidated` flag is stored state only: retrieval and the other
    /// passes do not filter on it.
    fn detect_contradictions(&self, memories: &mut MemoryStore) -> usize {
        let snapshot: Vec<(String, Vec<f32>, f32)> = memories
            .iter()
            .map(|e| (e.memory.memory_id.clone(), e.memory.embedding.clone(), e.memory.quality))
            .collect();
        let items: Vec<ScanItem<'_>> = snapshot
            .iter()
            .map(|(id, embedding, _)| ScanItem { id, embedding })
            .collect();

        let mut detected = 0;
        for (i, j, _) in self.scan.scan(&items, self.config.contradiction_similarity) {
            let gap = (snapshot[i].2 - snapshot[j].2).abs();
            if gap <= self.config.contradiction_quality_gap {
                continue;
            }
            let loser = if snapshot[i].2 < snapshot[j].2 { i } else { j };
            if let Some(entry) = memories.get_mut(&snapshot[loser].0) {
                entry.consolidated = true;
                detected += 1;
            }
        }
        detected
    }

    /// Delete patterns that are both stale and rarely used
    fn prune_old_patterns(&self, patterns: &mut PatternStore) -> usize {
        let now = Utc::now();
        let max_age_ms = self.config.max_pattern_age_days * 86_400_000;

        let stale: Vec<String> = patterns
            .iter()
            .filter(|p| {
                (now - p.updated_at).num_milliseconds() > max_age_ms
                    && p.usage_count < self.config.min_usage_to_retain
            })
            .map(|p| p.pattern_id.clone())
            .collect();

        for id in &stale {
            patterns.remove(id);
        }
        stale.len()
    }

    /// Absorb near-identical same-domain patterns into the stronger one
    fn merge_patterns(&self, patterns: &mut PatternStore) -> usize {
        let snapshot: Vec<(String, Vec<f32>, String, f32)> = patterns
            .iter()
            .map(|p| {
                (
                    p.pattern_id.clone(),
                    p.embedding.clone(),
                    p.domain.clone(),
                    p.success_rate,
                )
            })
            .collect();
        let items: Vec<ScanItem<'_>> = snapshot
            .iter()
            .map(|(id, embedding, _, _)| ScanItem { id, embedding })
            .collect();

        let mut absorbed = vec![false; snapshot.len()];
        let mut merged = 0;
        for (i, j, similarity) in self.scan.scan(&items, self.config.merge_similarity) {
            if absorbed[i] || absorbed[j] || snapshot[i].2 != snapshot[j].2 {
                continue;
            }
            // Lower success rate is absorbed; ties keep the first-inserted
            let (survivor, victim) = if snapshot[j].3 > snapshot[i].3 {
                (j, i)
            } else {
                (i, j)
            };
            absorbed[victim] = true;

            let Some(removed) = patterns.remove(&snapshot[victim].0) else {
                continue;
            };
            let Some(target) = patterns.get_mut(&snapshot[survivor].0) else {
                continue;
            };

            let now = Utc::now();
            let previous = target.success_rate;
            target.usage_count += removed.usage_count;
            target.quality_history.extend(removed.quality_history);
            if target.quality_history.len() > QUALITY_HISTORY_LIMIT {
                let excess = target.quality_history.len() - QUALITY_HISTORY_LIMIT;
                target.quality_history.drain(..excess);
            }
            target.success_rate = target.quality_history.iter().sum::<f32>()
                / target.quality_history.len() as f32;
            target.evolution_history.push(EvolutionRecord {
                timestamp: now,
                kind: EvolutionType::Merge,
                previous_quality: previous,
                new_quality: target.success_rate,
                description: format!(
                    "Absorbed pattern {} (similarity {:.3})",
                    removed.pattern_id, similarity
                ),
            });
            target.updated_at = now;
            merged += 1;
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DistilledMemory, MemoryEntry, Pattern, Trajectory, TrajectoryVerdict,
    };
    use chrono::Duration;
    use uuid::Uuid;

    fn create_test_entry(id: &str, embedding: Vec<f32>, quality: f32) -> MemoryEntry {
        MemoryEntry {
            memory: DistilledMemory {
                memory_id: id.to_string(),
                trajectory_id: format!("traj-{}", id),
                strategy: "Apply probe -> fix".to_string(),
                key_learnings: vec![],
                embedding,
                quality,
                usage_count: 0,
                last_used: Utc::now(),
            },
            trajectory: Trajectory::new(format!("traj-{}", id), "testing", vec![], true, quality),
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

    fn create_test_pattern(
        domain: &str,
        embedding: Vec<f32>,
        success_rate: f32,
        usage_count: u32,
        age_days: i64,
    ) -> Pattern {
        let stamp = Utc::now() - Duration::days(age_days);
        Pattern {
            pattern_id: Uuid::new_v4().to_string(),
            name: format!("{} pattern", domain),
            domain: domain.to_string(),
            embedding,
            strategy: "Apply probe -> fix".to_string(),
            success_rate,
            usage_count,
            quality_history: vec![success_rate],
            evolution_history: vec![],
            created_at: stamp,
            updated_at: stamp,
        }
    }

    fn engine() -> ConsolidationEngine {
        ConsolidationEngine::new(ConsolidationConfig::default())
    }

    #[tokio::test]
    async fn test_dedup_keeps_higher_quality_and_is_idempotent() {
        let engine = engine();
        let mut memories = MemoryStore::new();
        let mut patterns = PatternStore::new();
        memories.insert(create_test_entry("hi", vec![1.0, 0.0], 0.9));
        memories.insert(create_test_entry("lo", vec![1.0, 0.0], 0.6));

        let report = engine.consolidate(&mut memories, &mut patterns, None).await;
        assert_eq!(report.removed_duplicates, 1);
        assert_eq!(memories.len(), 1);
        assert!((memories.get("hi").unwrap().memory.quality - 0.9).abs() < f32::EPSILON);

        let second = engine.consolidate(&mut memories, &mut patterns, None).await;
        assert_eq!(second.removed_duplicates, 0);
        assert_eq!(memories.len(), 1);
    }

    #[tokio::test]
    async fn test_dedup_tie_keeps_first_inserted() {
        let engine = engine();
        let mut memories = MemoryStore::new();
        let mut patterns = PatternStore::new();
        memories.insert(create_test_entry("first", vec![1.0, 0.0], 0.7));
        memories.insert(create_test_entry("second", vec![1.0, 0.0], 0.7));

        engine.consolidate(&mut memories, &mut patterns, None).await;
        assert!(memories.get("first").is_some());
        assert!(memories.get("second").is_none());
    }

    #[tokio::test]
    async fn test_contradiction_flags_lower_quality() {
        let engine = engine();
        let mut memories = MemoryStore::new();
        let mut patterns = PatternStore::new();
        // Similar but below the dedup threshold, with a wide quality gap
        memories.insert(create_test_entry("strong", vec![1.0, 0.3], 0.9));
        memories.insert(create_test_entry("weak", vec![1.0, 0.45], 0.2));

        let report = engine.consolidate(&mut memories, &mut patterns, None).await;
        assert_eq!(report.removed_duplicates, 0);
        assert_eq!(report.contradictions_detected, 1);
        assert!(memories.get("weak").unwrap().consolidated);
        assert!(!memories.get("strong").unwrap().consolidated);
        // Soft exclusion: both entries remain stored
        assert_eq!(memories.len(), 2);
    }

    #[tokio::test]
    async fn test_contradiction_pass_can_be_disabled() {
        let engine = ConsolidationEngine::new(ConsolidationConfig {
            enable_contradiction_detection: false,
            ..Default::default()
        });
        let mut memories = MemoryStore::new();
        let mut patterns = PatternStore::new();
        memories.insert(create_test_entry("strong", vec![1.0, 0.3], 0.9));
        memories.insert(create_test_entry("weak", vec![1.0, 0.45], 0.2));

        let report = engine.consolidate(&mut memories, &mut patterns, None).await;
        assert_eq!(report.contradictions_detected, 0);
        assert!(!memories.get("weak").unwrap().consolidated);
    }

    #[tokio::test]
    async fn test_pattern_aging_honors_usage_guard() {
        let engine = engine();
        let mut memories = MemoryStore::new();
        let mut patterns = PatternStore::new();

        let stale_unused = create_test_pattern("a", vec![1.0, 0.0], 0.5, 2, 40);
        let stale_used = create_test_pattern("b", vec![0.0, 1.0], 0.5, 10, 40);
        let fresh = create_test_pattern("c", vec![0.5, 0.5], 0.5, 0, 1);
        let stale_id = stale_unused.pattern_id.clone();
        patterns.insert(stale_unused);
        patterns.insert(stale_used);
        patterns.insert(fresh);

        let report = engine.consolidate(&mut memories, &mut patterns, None).await;
        assert_eq!(report.pruned_patterns, 1);
        assert!(patterns.get(&stale_id).is_none());
        assert_eq!(patterns.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_same_domain_patterns() {
        let engine = engine();
        let mut memories = MemoryStore::new();
        let mut patterns = PatternStore::new();

        let strong = create_test_pattern("ops", vec![1.0, 0.01], 0.9, 3, 1);
        let weak = create_test_pattern("ops", vec![1.0, 0.02], 0.5, 2, 1);
        let strong_id = strong.pattern_id.clone();
        let weak_id = weak.pattern_id.clone();
        patterns.insert(strong);
        patterns.insert(weak);

        let report = engine.consolidate(&mut memories, &mut patterns, None).await;
        assert_eq!(report.merged_patterns, 1);
        assert!(patterns.get(&weak_id).is_none());

        let survivor = patterns.get(&strong_id).unwrap();
        assert_eq!(survivor.usage_count, 5);
        assert_eq!(survivor.quality_history.len(), 2);
        assert!((survivor.success_rate - 0.7).abs() < 0.001);
        assert_eq!(
            survivor.evolution_history.last().unwrap().kind,
            EvolutionType::Merge
        );
    }

    #[tokio::test]
    async fn test_no_merge_across_domains() {
        let engine = engine();
        let mut memories = MemoryStore::new();
        let mut patterns = PatternStore::new();
        patterns.insert(create_test_pattern("ops", vec![1.0, 0.0], 0.9, 3, 1));
        patterns.insert(create_test_pattern("finance", vec![1.0, 0.0], 0.5, 2, 1));

        let report = engine.consolidate(&mut memories, &mut patterns, None).await;
        assert_eq!(report.merged_patterns, 0);
        assert_eq!(patterns.len(), 2);
    }

    #[test]
    fn test_pairwise_scan_threshold_is_strict() {
        let scan = PairwiseScan;
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        let items = [
            ScanItem { id: "a", embedding: &a },
            ScanItem { id: "b", embedding: &b },
        ];
        // Identical vectors have similarity 1.0
        let pairs = scan.scan(&items, 0.95);
        assert_eq!(pairs.len(), 1);
        let (i, j, similarity) = pairs[0];
        assert_eq!((items[i].id, items[j].id), ("a", "b"));
        assert!((similarity - 1.0).abs() < 0.001);
        assert!(scan.scan(&items, 1.0).is_empty());
    }
}
