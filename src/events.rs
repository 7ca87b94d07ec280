//! Engine lifecycle events and listener registry
//!
//! Listeners are synchronous and invoked inline in subscription order. A
//! failing listener is logged and skipped; it never aborts the operation
//! that emitted the event or the remaining listeners.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::types::{EvolutionType, PatternId, TrajectoryId};

/// Notifications emitted at pipeline milestones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A complete trajectory was stored
    TrajectoryCompleted {
        trajectory_id: TrajectoryId,
        quality_score: f32,
    },
    /// A consolidation sweep finished
    MemoryConsolidated { memories_count: usize },
    /// A pattern absorbed a new experience
    PatternEvolved {
        pattern_id: PatternId,
        evolution_type: EvolutionType,
    },
}

/// Handle returned by [`ListenerRegistry::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receives engine events
pub trait EventListener: Send {
    fn on_event(&mut self, event: &EngineEvent) -> Result<()>;
}

/// Holds subscribed listeners and fans events out to them
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<(ListenerId, Box<dyn EventListener>)>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Box<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener; returns false when the id is unknown
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() < before
    }

    /// Deliver an event to every listener in subscription order
    pub fn emit(&mut self, event: &EngineEvent) {
        for (id, listener) in &mut self.listeners {
            if let Err(err) = listener.on_event(event) {
                warn!(listener_id = id.0, error = %err, "event listener failed");
            }
        }
    }

}
