//! Session change notifications
//!
//! The orchestrator pushes a `SessionEvent` for every state change; the UI
//! drains the bus once per frame instead of polling the session fields.

use crate::session::JobPhase;
use tessera_core::MeshBinding;

/// A change to the orchestration session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RunningChanged(bool),
    Returned { seed: Option<u64> },
    JobIdChanged(String),
    PhaseChanged(JobPhase),
    StatusChanged(String),
    CurrentMeshChanged(Option<MeshBinding>),
    UserMeshesChanged(usize),
    AuthRequired,
}

/// A simple event queue that the session pushes to and the UI drains
pub struct EventBus<E> {
    events: Vec<E>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Push an event onto the bus
    pub fn push(&mut self, event: E) {
        self.events.push(event);
    }

    /// Drain all events from the bus, returning them
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
