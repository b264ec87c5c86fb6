//! # Model Events
//!
//! Ordered notifications published on a `tokio::sync::broadcast` bus.
//! Publishing never blocks and never fails: with no subscriber the event is
//! dropped, and a lagging subscriber loses the oldest events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::state::State;

/// One model notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModelEvent {
    /// A run is starting.
    BeforeValidation {
        /// Run ordinal.
        run: u64,
        /// Run target.
        path: String,
        /// Initial validating scopes.
        scopes: Vec<String>,
    },
    /// A path's state was committed.
    StateChanged {
        /// Path whose state changed.
        path: String,
        /// The committed state.
        state: State,
    },
    /// A path's value was written.
    ValueChanged {
        /// Path whose value changed.
        path: String,
        /// The new value, `None` when removed.
        value: Option<Value>,
    },
    /// A run finished.
    AfterValidation {
        /// Run ordinal.
        run: u64,
        /// Run target.
        path: String,
        /// Final validity of the target.
        valid: bool,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ModelEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ModelEvent) {
        let _ = self.tx.send(event);
    }
}
