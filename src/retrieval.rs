//! Similarity retrieval with MMR diversity re-ranking
//!
//! Candidate generation prefers the external approximate index (over-fetched
//! to leave room for diversity filtering) and falls back to an exact
//! brute-force cosine scan on any failure. Greedy Maximal Marginal Relevance
//! then trades raw relevance against coverage so a query matching one
//! dominant cluster does not return k near-duplicates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::index::VectorIndex;
use crate::store::MemoryStore;
use crate::types::{DistilledMemory, RetrievalResult};
use crate::vector::cosine_similarity;

/// Configuration for the retrieval engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// MMR balance between relevance (1.0) and diversity (0.0)
    pub mmr_lambda: f32,
    /// Over-fetch multiplier for approximate candidates
    pub candidate_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mmr_lambda: 0.7,
            candidate_multiplier: 3,
        }
    }
}

/// A scored candidate prior to MMR selection
struct Candidate {
    memory: DistilledMemory,
    relevance: f32,
}

/// Top-k similarity search with diversity re-ranking
pub struct RetrievalEngine {
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Retrieve up to `k` relevant, mutually diverse memories for a query
    /// embedding. Never fails: a broken index degrades to the exact scan,
    /// an empty pool returns an empty list.
    pub async fn retrieve(
        &self,
        store: &MemoryStore,
        index: Option<&dyn VectorIndex>,
        query: &[f32],
        k: usize,
    ) -> Vec<RetrievalResult> {
        if store.is_empty() || k == 0 {
            return vec![];
        }

        let candidates = self.generate_candidates(store, index, query, k).await;
        self.mmr_select(candidates, k)
    }

    async fn generate_candidates(
        &self,
        store: &MemoryStore,
        index: Option<&dyn VectorIndex>,
        query: &[f32],
        k: usize,
    ) -> Vec<Candidate> {
        if let Some(index) = index.filter(|i| i.is_available()) {
            let fetch = k.saturating_mul(self.config.candidate_multiplier).max(k);
            match index.search(query, fetch).await {
                Ok(matches) => {
                    let resolved: Vec<Candidate> = matches
                        .into_iter()
                        .filter_map(|m| {
                            store.get(&m.id).map(|entry| Candidate {
                                memory: entry.memory.clone(),
                                relevance: m.similarity,
                            })
                        })
                        .collect();
                    if !resolved.is_empty() {
                        debug!(candidates = resolved.len(), "approximate candidates");
                        return resolved;
                    }
                    // Stale index contents; fall through to the exact scan
                }
                Err(err) => {
                    warn!(error = %err, "external index search failed, falling back to exact scan");
                }
            }
        }

        let mut candidates: Vec<Candidate> = store
            .iter()
            .map(|entry| Candidate {
                relevance: cosine_similarity(query, &entry.memory.embedding),
                memory: entry.memory.clone(),
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    /// Greedy MMR: repeatedly pick the candidate maximizing
    /// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`.
    /// Exact score ties go to the candidate less similar to what is already
    /// selected, so near-duplicates lose to genuinely novel results.
    fn mmr_select(&self, mut candidates: Vec<Candidate>, k: usize) -> Vec<RetrievalResult> {
        let lambda = self.config.mmr_lambda;
        let mut selected: Vec<RetrievalResult> = Vec::with_capacity(k.min(candidates.len()));

        while selected.len() < k && !candidates.is_empty() {
            let mut best: Option<(usize, f32, f32)> = None;
            for (i, candidate) in candidates.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|s| cosine_similarity(&candidate.memory.embedding, &s.memory.embedding))
                    .fold(0.0f32, f32::max);
                let mmr = lambda * candidate.relevance - (1.0 - lambda) * redundancy;

                let better = match best {
                    None => true,
                    Some((_, best_mmr, best_redundancy)) => {
                        mmr > best_mmr || (mmr == best_mmr && redundancy < best_redundancy)
                    }
                };
                if better {
                    best = Some((i, mmr, redundancy));
                }
            }

            let Some((idx, mmr, redundancy)) = best else {
                break;
            };
            let candidate = candidates.remove(idx);
            selected.push(RetrievalResult {
                relevance_score: candidate.relevance,
                diversity_score: 1.0 - redundancy,
                combined_score: mmr,
                memory: candidate.memory,
            });
        }

        selected
    }

    /// Lexical fallback for queries without an embedding
    ///
    /// Scores each memory by the fraction of its strategy words present in
    /// the query's word set; returns the top-k with positive score.
    pub fn retrieve_by_content(
        &self,
        store: &MemoryStore,
        text: &str,
        k: usize,
    ) -> Vec<RetrievalResult> {
        let query_words: HashSet<String> = text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if query_words.is_empty() || k == 0 {
            return vec![];
        }

        let mut results: Vec<RetrievalResult> = store
            .iter()
            .filter_map(|entry| {
                let strategy = entry.memory.strategy.to_lowercase();
                let words: Vec<&str> = strategy.split_whitespace().collect();
                if words.is_empty() {
                    return None;
                }
                let hits = words.iter().filter(|w| query_words.contains(**w)).count();
                let score = hits as f32 / words.len() as f32;
                if score <= 0.0 {
                    return None;
                }
                Some(RetrievalResult {
                    memory: entry.memory.clone(),
                    relevance_score: score,
                    diversity_score: 0.0,
                    combined_score: score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        results
    }
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self::new(RetrievalConfig::default())
    }
}
