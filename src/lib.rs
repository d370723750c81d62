//! Shiny Hunter
//!
//! Automates the "reset, load, confirm, look" loop of shiny hunting in an
//! emulator. A configurable timeline of key presses and waits runs on a
//! background thread; every analysis step captures the operator's screen
//! regions and compares them against reference images of the normal sprite.
//! A region that still differs after the retry budget is spent halts the hunt
//! so the operator can check for a shiny.
//!
//! Key injection and raw screen capture are supplied by the embedding
//! application through [`InputActuator`] and [`FrameSource`].
//!
//! # Example
//!
//! ```ignore
//! use shiny_hunter::{DryRunActuator, HuntConfig, Hunter, HuntEvent, StillFrameSource};
//!
//! let mut hunter = Hunter::new(StillFrameSource::from_file("screen.png")?, DryRunActuator::default());
//! hunter.apply_config(HuntConfig::load("hunt.toml")?)?;
//! hunter.load_reference("normal", "normal.png")?;
//!
//! let events = hunter.subscribe();
//! hunter.start()?;
//! for event in events {
//!     if let HuntEvent::Stopped { final_count, reason } = event {
//!         println!("stopped at {final_count}: {reason:?}");
//!         break;
//!     }
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod input;
pub mod vision;

// Re-export commonly used types
pub use config::{import_profile_dir, HuntConfig, LegacyImport, ThresholdSet};
pub use crate::core::{
    ActionKind, ConfirmationOutcome, FaultKind, HuntEvent, HuntSnapshot, Hunter, RunState,
    RunStatus, StopReason, TimelineAction, TimelineConfig,
};
pub use error::{HunterError, Result};
pub use input::{DryRunActuator, InputActuator, KeyBindings, KeyPress, LogicalAction};
pub use vision::{
    DiskEvidenceStore, EvidenceStore, FrameSequenceSource, FrameSource, Rect, ReferenceImage,
    ReferenceSet, Region, RegionRegistry, StillFrameSource,
};
