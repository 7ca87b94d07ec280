//! # praxis
//!
//! An experience-learning memory engine for autonomous agents.
//!
//! Agents record what they did as [`Trajectory`] episodes. The engine judges
//! each episode, distills the successful ones into retrievable
//! [`DistilledMemory`] strategies, serves them back through
//! diversity-re-ranked similarity search, and periodically consolidates the
//! pools so learned experience stays compact and current.
//!
//! ```no_run
//! use praxis::{EngineConfig, LearningEngine, Trajectory, TrajectoryStep};
//!
//! # async fn example() {
//! let mut engine = LearningEngine::new(EngineConfig::default());
//! engine.initialize().await;
//!
//! let steps = vec![TrajectoryStep::new("rebalance", 0.9, vec![0.1; 768])];
//! engine.store_trajectory(Trajectory::new("t-1", "finance", steps, true, 0.85));
//!
//! if let Ok(Some(memory)) = engine.distill("t-1").await {
//!     let similar = engine.retrieve(&memory.embedding, None).await;
//!     println!("recalled {} strategies", similar.len());
//! }
//! # }
//! ```
//!
//! The optional `remote-index` feature (on by default) provides
//! [`index::HttpVectorIndex`], an adapter for an external
//! approximate-nearest-neighbor service. Without one the engine falls back
//! to exact brute-force scans over the in-memory pool.

pub mod consolidate;
pub mod distill;
pub mod engine;
pub mod error;
pub mod events;
pub mod index;
pub mod judge;
pub mod retrieval;
pub mod stats;
pub mod store;
pub mod types;
pub mod vector;

pub use consolidate::ConsolidationReport;
pub use engine::LearningEngine;
pub use error::{PraxisError, Result};
pub use events::{EngineEvent, EventListener, ListenerId};
pub use stats::EngineStats;
pub use types::{
    DistilledMemory, EngineConfig, EvolutionRecord, EvolutionType, MemoryEntry, MemoryId,
    Pattern, PatternId, RetrievalResult, Trajectory, TrajectoryId, TrajectoryStep,
    TrajectoryVerdict,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
