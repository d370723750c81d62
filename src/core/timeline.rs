//! Timeline: the repeating action sequence the hunter executes

use serde::{Deserialize, Serialize};

use crate::input::LogicalAction;
use crate::{HunterError, Result};

/// Maximum analysis retries per round
pub const MAX_RETRY_COUNT: u32 = 5;
/// Allowed retry interval, in seconds
pub const MIN_RETRY_INTERVAL: f64 = 0.5;
pub const MAX_RETRY_INTERVAL: f64 = 10.0;

/// What a timeline step does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Wait before the first pass so the operator can focus the emulator
    InitialDelay,
    /// Press the soft-reset input
    Reset,
    /// Press the quick-load input
    QuickLoad,
    /// Press the confirm input
    Confirm,
    /// Run a confirmation round over all enabled regions
    Analysis,
    /// Plain wait
    CustomDelay,
}

impl ActionKind {
    /// Input pressed by this step, if it is an actuation step
    pub fn logical_action(&self) -> Option<LogicalAction> {
        match self {
            ActionKind::Reset => Some(LogicalAction::Reset),
            ActionKind::QuickLoad => Some(LogicalAction::QuickLoad),
            ActionKind::Confirm => Some(LogicalAction::Confirm),
            ActionKind::InitialDelay | ActionKind::Analysis | ActionKind::CustomDelay => None,
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = HunterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "initial_delay" => Ok(ActionKind::InitialDelay),
            "reset" => Ok(ActionKind::Reset),
            "quick_load" => Ok(ActionKind::QuickLoad),
            "confirm" => Ok(ActionKind::Confirm),
            "analysis" => Ok(ActionKind::Analysis),
            "custom_delay" | "delay" => Ok(ActionKind::CustomDelay),
            _ => Err(HunterError::config(format!("Unknown action: {}", s))),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::InitialDelay => write!(f, "initial_delay"),
            ActionKind::Reset => write!(f, "reset"),
            ActionKind::QuickLoad => write!(f, "quick_load"),
            ActionKind::Confirm => write!(f, "confirm"),
            ActionKind::Analysis => write!(f, "analysis"),
            ActionKind::CustomDelay => write!(f, "custom_delay"),
        }
    }
}

/// One step of the timeline.
///
/// For delay steps `delay` is the wait itself; for actuation and analysis
/// steps it is the settle time after the step completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineAction {
    #[serde(rename = "action")]
    pub kind: ActionKind,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub description: String,
}

impl TimelineAction {
    pub fn new(kind: ActionKind, delay: f64, description: impl Into<String>) -> Self {
        Self {
            kind,
            delay,
            description: description.into(),
        }
    }

    /// Label shown next to countdowns
    pub fn label(&self) -> String {
        if self.description.is_empty() {
            self.kind.to_string()
        } else {
            self.description.clone()
        }
    }
}

/// The ordered timeline plus the confirmation retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Seconds between analysis attempts
    #[serde(default = "default_retry_interval")]
    pub retry_interval: f64,
    pub actions: Vec<TimelineAction>,
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_interval() -> f64 {
    2.0
}

impl Default for TimelineConfig {
    /// The classic quick-load sequence: wait, F1, A, A, analyse
    fn default() -> Self {
        Self::classic(5.0, 0.5, 0.8, 4.0)
    }
}

impl TimelineConfig {
    /// Empty timeline with the default retry policy
    pub fn new() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_interval: default_retry_interval(),
            actions: Vec::new(),
        }
    }

    /// The fixed quick-load sequence with custom delays
    pub fn classic(initial: f64, quick_load: f64, first_confirm: f64, second_confirm: f64) -> Self {
        Self::new()
            .with_action(TimelineAction::new(
                ActionKind::InitialDelay,
                initial,
                "Focus the emulator window",
            ))
            .with_action(TimelineAction::new(
                ActionKind::QuickLoad,
                quick_load,
                "Quick-load save",
            ))
            .with_action(TimelineAction::new(
                ActionKind::Confirm,
                first_confirm,
                "First confirm",
            ))
            .with_action(TimelineAction::new(
                ActionKind::Confirm,
                second_confirm,
                "Second confirm",
            ))
            .with_action(TimelineAction::new(ActionKind::Analysis, 0.0, "Analyse regions"))
    }

    /// Append an action
    pub fn with_action(mut self, action: TimelineAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry_count: u32, retry_interval: f64) -> Self {
        self.retry_count = retry_count;
        self.retry_interval = retry_interval;
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Check ranges and that the timeline can actually detect something
    pub fn validate(&self) -> Result<()> {
        if self.actions.is_empty() {
            return Err(HunterError::config("Timeline is empty"));
        }
        if self.retry_count > MAX_RETRY_COUNT {
            return Err(HunterError::config(format!(
                "retry_count {} exceeds {}",
                self.retry_count, MAX_RETRY_COUNT
            )));
        }
        if !(MIN_RETRY_INTERVAL..=MAX_RETRY_INTERVAL).contains(&self.retry_interval) {
            return Err(HunterError::config(format!(
                "retry_interval {} outside [{}, {}]",
                self.retry_interval, MIN_RETRY_INTERVAL, MAX_RETRY_INTERVAL
            )));
        }
        for (i, action) in self.actions.iter().enumerate() {
            if !action.delay.is_finite() || action.delay < 0.0 {
                return Err(HunterError::config(format!(
                    "Action {} ({}) has invalid delay {}",
                    i, action.kind, action.delay
                )));
            }
        }
        if !self.actions.iter().any(|a| a.kind == ActionKind::Analysis) {
            return Err(HunterError::config("Timeline has no analysis step"));
        }
        Ok(())
    }
}
