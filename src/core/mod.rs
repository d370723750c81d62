//! Core hunt abstractions
//!
//! - `Hunter` - control surface and background worker
//! - `TimelineConfig` - the repeating action sequence
//! - `ConfirmationRound` - bounded-retry verification of one analysis step
//! - `HuntEvent` - notifications pushed to subscribers

mod confirm;
mod events;
mod runner;
mod snapshot;
mod state;
mod timeline;
mod wait;

pub use confirm::{ConfirmationOutcome, ConfirmationRound, FailedRegion, CAPTURE_FAILED_REGION};
pub use events::{EventBus, HuntEvent, StopReason};
pub use runner::{Hunter, STOP_TIMEOUT};
pub use snapshot::{HuntSnapshot, REFERENCES_DIR, SNAPSHOT_FILE};
pub use state::{CountAdjustment, FaultKind, RunState, RunStatus};
pub use timeline::{
    ActionKind, TimelineAction, TimelineConfig, MAX_RETRY_COUNT, MAX_RETRY_INTERVAL,
    MIN_RETRY_INTERVAL,
};
pub use wait::{Countdown, POLL_INTERVAL};
