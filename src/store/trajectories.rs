//! Capacity-bounded trajectory store

use std::collections::HashMap;

use tracing::debug;

use crate::types::{Trajectory, TrajectoryId};

/// Fraction of capacity retained after an eviction sweep
const EVICTION_RETAIN_RATIO: f32 = 0.8;

/// Owns trajectory records keyed by id
///
/// Bounded by `max_trajectories`: when an insert pushes the store over
/// capacity, the lowest-quality trajectories are evicted until 80% of
/// capacity remains, biasing retention toward higher-quality experience.
#[derive(Debug)]
pub struct TrajectoryStore {
    trajectories: HashMap<TrajectoryId, Trajectory>,
    max_trajectories: usize,
}

impl TrajectoryStore {
    pub fn new(max_trajectories: usize) -> Self {
        Self {
            trajectories: HashMap::new(),
            max_trajectories,
        }
    }

    /// Insert or overwrite a trajectory by id, evicting on overflow
    pub fn store(&mut self, trajectory: Trajectory) {
        self.trajectories
            .insert(trajectory.trajectory_id.clone(), trajectory);
        if self.trajectories.len() > self.max_trajectories {
            self.evict_low_quality();
        }
    }

    fn evict_low_quality(&mut self) {
        let keep = (self.max_trajectories as f32 * EVICTION_RETAIN_RATIO) as usize;
        let evict = self.trajectories.len().saturating_sub(keep);
        if evict == 0 {
            return;
        }

        let mut ranked: Vec<(TrajectoryId, f32)> = self
            .trajectories
            .values()
            .map(|t| (t.trajectory_id.clone(), t.quality_score))
            .collect();
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        for (id, _) in ranked.into_iter().take(evict) {
            self.trajectories.remove(&id);
        }

        debug!(
            evicted = evict,
            retained = self.trajectories.len(),
            "evicted low-quality trajectories"
        );
    }

    pub fn get(&self, id: &str) -> Option<&Trajectory> {
        self.trajectories.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Trajectory> {
        self.trajectories.get_mut(id)
    }

    pub fn list_all(&self) -> Vec<&Trajectory> {
        self.trajectories.values().collect()
    }

    /// Trajectories judged successful
    pub fn list_successful(&self) -> Vec<&Trajectory> {
        self.trajectories
            .values()
            .filter(|t| t.verdict.as_ref().is_some_and(|v| v.success))
            .collect()
    }

    /// Complete trajectories judged unsuccessful
    pub fn list_failed(&self) -> Vec<&Trajectory> {
        self.trajectories
            .values()
            .filter(|t| t.is_complete && t.verdict.as_ref().is_some_and(|v| !v.success))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrajectoryVerdict;

    fn create_test_trajectory(id: &str, quality: f32) -> Trajectory {
        Trajectory::new(id, "testing", vec![], true, quality)
    }

    fn verdict(success: bool) -> TrajectoryVerdict {
        TrajectoryVerdict {
            success,
            confidence: 0.5,
            strengths: vec![],
            weaknesses: vec![],
            improvements: vec![],
            relevance_score: 0.5,
        }
    }

    #[test]
    fn test_store_and_get() {
        let mut store = TrajectoryStore::new(10);
        store.store(create_test_trajectory("t-1", 0.5));
        assert_eq!(store.len(), 1);
        assert!(store.get("t-1").is_some());
        assert!(store.get("t-2").is_none());
    }

    #[test]
    fn test_overwrite_by_id() {
        let mut store = TrajectoryStore::new(10);
        store.store(create_test_trajectory("t-1", 0.5));
        store.store(create_test_trajectory("t-1", 0.9));
        assert_eq!(store.len(), 1);
        assert!((store.get("t-1").unwrap().quality_score - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_capacity_eviction_retains_highest_quality() {
        let mut store = TrajectoryStore::new(10);
        for i in 0..11 {
            store.store(create_test_trajectory(
                &format!("t-{}", i),
                i as f32 / 10.0,
            ));
        }

        // 11 entries overflow capacity 10, eviction keeps floor(10 * 0.8) = 8
        assert_eq!(store.len(), 8);
        // The three lowest-quality trajectories are gone
        assert!(store.get("t-0").is_none());
        assert!(store.get("t-1").is_none());
        assert!(store.get("t-2").is_none());
        assert!(store.get("t-10").is_some());
    }

    #[test]
    fn test_list_filters() {
        let mut store = TrajectoryStore::new(10);

        let mut ok = create_test_trajectory("ok", 0.9);
        ok.verdict = Some(verdict(true));
        store.store(ok);

        let mut bad = create_test_trajectory("bad", 0.2);
        bad.verdict = Some(verdict(false));
        store.store(bad);

        let mut incomplete = create_test_trajectory("incomplete", 0.2);
        incomplete.is_complete = false;
        incomplete.verdict = Some(verdict(false));
        store.store(incomplete);

        store.store(create_test_trajectory("unjudged", 0.5));

        assert_eq!(store.list_all().len(), 4);
        assert_eq!(store.list_successful().len(), 1);
        // Failed requires completeness and a negative verdict
        assert_eq!(store.list_failed().len(), 1);
        assert_eq!(store.list_failed()[0].trajectory_id, "bad");
    }
}
