//! Per-stage latency and invocation accounting

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Running counters for one pipeline stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
    pub invocations: u64,
    pub avg_latency_ms: f64,
}

impl StageStats {
    /// Fold one observed latency into the running mean
    pub fn record(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.invocations += 1;
        self.avg_latency_ms += (ms - self.avg_latency_ms) / self.invocations as f64;
    }
}

/// Stage counters for the whole pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub retrieval: StageStats,
    pub judge: StageStats,
    pub distillation: StageStats,
    pub consolidation: StageStats,
}

/// Point-in-time snapshot of engine state and stage counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub trajectory_count: usize,
    pub memory_count: usize,
    pub pattern_count: usize,
    pub retrieval: StageStats,
    pub judge: StageStats,
    pub distillation: StageStats,
    pub consolidation: StageStats,
    pub external_index_active: bool,
}
