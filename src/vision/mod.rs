//! Vision side of the hunter
//!
//! Captures the operator's screen regions and decides, per region, whether the
//! capture still looks like the references (no rare event) or not.
//!
//! # Example
//!
//! ```ignore
//! use shiny_hunter::config::ThresholdSet;
//! use shiny_hunter::vision::{evaluate, ReferenceSet};
//!
//! let mut references = ReferenceSet::new();
//! references.load("normal", "configs/route_reference.png")?;
//! let verdict = evaluate("slot-1", &captured, &references, &ThresholdSet::default())?;
//! println!("match={} best={}", verdict.is_match, verdict.best_reference_name);
//! ```

pub mod capture;
pub mod evidence;
pub mod matcher;
pub mod metrics;
pub mod reference;

// Re-export main types for convenient access
pub use capture::{
    CapturedRegion, FrameSequenceSource, FrameSource, Rect, Region, RegionRegistry,
    StillFrameSource,
};
pub use evidence::{CleanupReport, DiskEvidenceStore, EvidenceStore};
pub use matcher::{evaluate, AnalysisAttemptResult, MatchMetrics, ReferenceScore};
pub use metrics::{color_difference, color_similarity, structural_similarity, ColorHistogram};
pub use reference::{ReferenceImage, ReferenceSet};
