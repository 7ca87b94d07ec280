//! In-memory stores for trajectories, distilled memories, and patterns
//!
//! Each store exclusively owns its entities by unique id. Cross-references
//! between stores are non-owning back-references; removing a referenced
//! entity never cascades.

mod memories;
mod patterns;
mod trajectories;

pub use memories::MemoryStore;
pub use patterns::PatternStore;
pub use trajectories::TrajectoryStore;
