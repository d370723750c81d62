//! Logical emulator inputs
//!
//! The engine only knows *what* to press ([`LogicalAction`]); turning that
//! into a real key event is the job of an [`InputActuator`] implementation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{HunterError, Result};

/// Inputs the timeline can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalAction {
    /// Soft-reset the game
    Reset,
    /// Load the emulator's first quick-save slot
    QuickLoad,
    /// Press the in-game confirm (A) button
    Confirm,
}

impl std::fmt::Display for LogicalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalAction::Reset => write!(f, "reset"),
            LogicalAction::QuickLoad => write!(f, "quick_load"),
            LogicalAction::Confirm => write!(f, "confirm"),
        }
    }
}

/// Key names bound to each logical action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_reset_key")]
    pub reset: String,
    #[serde(default = "default_quick_load_key")]
    pub quick_load: String,
    #[serde(default = "default_confirm_key")]
    pub confirm: String,
    /// How long a key is held down, in seconds
    #[serde(default = "default_hold")]
    pub hold_secs: f64,
}

fn default_reset_key() -> String {
    "F2".to_string()
}

fn default_quick_load_key() -> String {
    "F1".to_string()
}

fn default_confirm_key() -> String {
    "X".to_string()
}

fn default_hold() -> f64 {
    0.1
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            reset: default_reset_key(),
            quick_load: default_quick_load_key(),
            confirm: default_confirm_key(),
            hold_secs: default_hold(),
        }
    }
}

impl KeyBindings {
    /// Key name bound to an action
    pub fn key_for(&self, action: LogicalAction) -> &str {
        match action {
            LogicalAction::Reset => &self.reset,
            LogicalAction::QuickLoad => &self.quick_load,
            LogicalAction::Confirm => &self.confirm,
        }
    }

    /// How long each key is held down
    pub fn hold(&self) -> Duration {
        Duration::try_from_secs_f64(self.hold_secs).unwrap_or(Duration::ZERO)
    }

    /// Resolve an action into the concrete key press to inject
    pub fn press_for(&self, action: LogicalAction) -> KeyPress {
        KeyPress {
            action,
            key: self.key_for(action).to_string(),
            hold: self.hold(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for action in [LogicalAction::Reset, LogicalAction::QuickLoad, LogicalAction::Confirm] {
            if self.key_for(action).trim().is_empty() {
                return Err(HunterError::config(format!("No key bound to {}", action)));
            }
        }
        if !self.hold_secs.is_finite() || self.hold_secs < 0.0 {
            return Err(HunterError::config(format!(
                "Invalid key hold time: {}",
                self.hold_secs
            )));
        }
        Ok(())
    }
}

/// A key press resolved through the active [`KeyBindings`]
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub action: LogicalAction,
    /// Bound key name, e.g. `"F1"`
    pub key: String,
    pub hold: Duration,
}

/// Injects key presses into the emulator window.
///
/// A failed press means the target window is not focused or not responding;
/// the engine treats it as fatal for the current run and never retries.
pub trait InputActuator: Send {
    /// Hold `press.key` down for `press.hold`, then release it
    fn press(&mut self, press: &KeyPress) -> Result<()>;
}

/// Actuator that only logs presses; for replaying recorded frames offline
#[derive(Debug, Clone, Default)]
pub struct DryRunActuator {
    presses: u64,
}

impl DryRunActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of presses issued so far
    pub fn presses(&self) -> u64 {
        self.presses
    }
}

impl InputActuator for DryRunActuator {
    fn press(&mut self, press: &KeyPress) -> Result<()> {
        self.presses += 1;
        log::info!(
            "[dry-run] press {} ({}) for {:?}",
            press.key,
            press.action,
            press.hold
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let keys = KeyBindings::default();
        assert_eq!(keys.key_for(LogicalAction::QuickLoad), "F1");
        assert_eq!(keys.key_for(LogicalAction::Confirm), "X");
        assert!(keys.validate().is_ok());
    }

    #[test]
    fn test_empty_binding_rejected() {
        let keys = KeyBindings {
            confirm: " ".to_string(),
            ..KeyBindings::default()
        };
        assert!(keys.validate().is_err());
    }

    #[test]
    fn test_dry_run_counts_presses() {
        let keys = KeyBindings::default();
        let mut actuator = DryRunActuator::new();
        actuator.press(&keys.press_for(LogicalAction::QuickLoad)).unwrap();
        actuator.press(&keys.press_for(LogicalAction::Confirm)).unwrap();
        assert_eq!(actuator.presses(), 2);
    }

    #[test]
    fn test_partial_bindings_take_defaults() {
        let keys: KeyBindings = toml::from_str("confirm = \"Z\"").unwrap();
        assert_eq!(keys.confirm, "Z");
        assert_eq!(keys.quick_load, "F1");
        assert_eq!(keys.hold_secs, 0.1);
    }

    #[test]
    fn test_press_uses_bound_key_and_hold() {
        let keys = KeyBindings {
            confirm: "Z".to_string(),
            hold_secs: 0.25,
            ..KeyBindings::default()
        };
        let press = keys.press_for(LogicalAction::Confirm);
        assert_eq!(press.key, "Z");
        assert_eq!(press.hold, Duration::from_millis(250));
        assert_eq!(press.action, LogicalAction::Confirm);
    }

    #[test]
    fn test_invalid_hold_rejected() {
        let keys = KeyBindings {
            hold_secs: -1.0,
            ..KeyBindings::default()
        };
        assert!(keys.validate().is_err());
        assert_eq!(keys.hold(), Duration::ZERO);
    }
}
