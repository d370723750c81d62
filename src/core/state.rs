//! Hunter state types

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use super::confirm::ConfirmationOutcome;
use super::events::{EventBus, HuntEvent};
use crate::config::ThresholdSet;

/// Lifecycle status of the hunter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Paused => write!(f, "paused"),
            RunStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Category of a fault that ended a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Configuration,
    Actuation,
    Capture,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Configuration => write!(f, "configuration"),
            FaultKind::Actuation => write!(f, "actuation"),
            FaultKind::Capture => write!(f, "capture"),
        }
    }
}

/// Point-in-time view of the hunter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunState {
    pub status: RunStatus,
    pub hunt_count: u64,
    pub is_cancel_requested: bool,
    /// Index of the next timeline action to execute
    pub cursor: usize,
}

/// Audit record of a manual count correction after adjudication
#[derive(Debug, Clone, PartialEq)]
pub struct CountAdjustment {
    pub at: DateTime<Local>,
    /// Regions ruled false positives and added back to the count
    pub added: u64,
    pub hunt_count_after: u64,
}

/// State shared between the control surface and the worker.
///
/// `hunt_count` and `cursor` are written by the worker while running and by
/// the control surface only while no worker exists.
pub(crate) struct EngineState {
    pub status: Mutex<RunStatus>,
    pub hunt_count: AtomicU64,
    pub cursor: AtomicUsize,
    pub cancel: AtomicBool,
    pub pause: AtomicBool,
    pub thresholds: RwLock<ThresholdSet>,
    pub last_outcome: Mutex<Option<ConfirmationOutcome>>,
    /// Failed-region count of a detection halt not yet adjudicated
    pub pending_adjudication: Mutex<Option<usize>>,
    pub adjustments: Mutex<Vec<CountAdjustment>>,
    pub events: EventBus,
}

impl EngineState {
    pub fn new(thresholds: ThresholdSet) -> Self {
        Self {
            status: Mutex::new(RunStatus::Idle),
            hunt_count: AtomicU64::new(0),
            cursor: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
            pause: AtomicBool::new(false),
            thresholds: RwLock::new(thresholds),
            last_outcome: Mutex::new(None),
            pending_adjudication: Mutex::new(None),
            adjustments: Mutex::new(Vec::new()),
            events: EventBus::new(),
        }
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: RunStatus) {
        let mut current = self.status.lock();
        if *current != status {
            log::debug!("Status {} -> {}", *current, status);
            *current = status;
        }
    }

    pub fn hunt_count(&self) -> u64 {
        self.hunt_count.load(Ordering::SeqCst)
    }

    pub fn add_to_count(&self, delta: u64) -> u64 {
        self.hunt_count.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> RunState {
        RunState {
            status: self.status(),
            hunt_count: self.hunt_count(),
            is_cancel_requested: self.is_cancelled(),
            cursor: self.cursor.load(Ordering::SeqCst),
        }
    }

    pub fn emit(&self, event: HuntEvent) {
        self.events.emit(event);
    }
}
