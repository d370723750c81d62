//! Events emitted by the hunter
//!
//! Events are pushed into `std::sync::mpsc` channels; the worker never runs
//! subscriber code, so a slow or broken observer cannot stall a hunt.

use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use super::confirm::ConfirmationOutcome;
use super::state::FaultKind;

/// Why a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// The operator asked to stop, or abandoned a paused run
    Requested,
    /// A confirmation round found a region that never matched
    Detection,
    /// A collaborator or configuration failure
    Fault { kind: FaultKind, message: String },
}

/// Notification pushed to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum HuntEvent {
    Started,
    Stopped { final_count: u64, reason: StopReason },
    Paused { hunt_count: u64 },
    Resumed { hunt_count: u64 },
    Progress {
        hunt_count: u64,
        delta: u64,
        message: String,
    },
    /// Whole seconds left in the current wait
    Countdown { remaining_secs: u64, label: String },
    Outcome(ConfirmationOutcome),
    /// False positives added back after adjudication
    CountAdjusted { added: u64, hunt_count: u64 },
}

impl HuntEvent {
    pub fn progress(hunt_count: u64, delta: u64, message: impl Into<String>) -> Self {
        HuntEvent::Progress {
            hunt_count,
            delta,
            message: message.into(),
        }
    }

    /// Whether this event ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, HuntEvent::Stopped { .. })
    }
}

/// Fan-out of events to any number of channel subscribers
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<HuntEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Open a new channel receiving every event emitted from now on
    pub fn subscribe(&self) -> Receiver<HuntEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Send to every live subscriber, dropping the ones whose receiver is gone
    pub fn emit(&self, event: HuntEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.lock().is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
