//! Configuration types for the hunter
//!
//! A hunt profile is stored as TOML: thresholds, the timeline, the regions and
//! the key bindings. Older JSON profile directories can be imported
//! with [`import_profile_dir`].

mod legacy;

pub use legacy::{import_profile_dir, LegacyImport};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::TimelineConfig;
use crate::input::KeyBindings;
use crate::vision::RegionRegistry;
use crate::{HunterError, Result};

/// Current profile format version
pub const CONFIG_VERSION: u32 = 1;

/// Match thresholds; all three must hold for a region to count as matching
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    /// Minimum histogram correlation, in `[0, 1]`
    #[serde(default = "default_color_similarity")]
    pub color_similarity: f64,
    /// Minimum SSIM, in `[0, 1]`
    #[serde(default = "default_ssim")]
    pub ssim_threshold: f64,
    /// Maximum mean absolute channel difference
    #[serde(default = "default_color_difference")]
    pub color_difference: f64,
}

fn default_color_similarity() -> f64 {
    0.8
}

fn default_ssim() -> f64 {
    0.7
}

fn default_color_difference() -> f64 {
    30.0
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            color_similarity: default_color_similarity(),
            ssim_threshold: default_ssim(),
            color_difference: default_color_difference(),
        }
    }
}

impl ThresholdSet {
    /// Build a validated threshold set
    pub fn new(color_similarity: f64, ssim_threshold: f64, color_difference: f64) -> Result<Self> {
        let thresholds = Self {
            color_similarity,
            ssim_threshold,
            color_difference,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.color_similarity) {
            return Err(HunterError::config(format!(
                "color_similarity {} outside [0, 1]",
                self.color_similarity
            )));
        }
        if !(0.0..=1.0).contains(&self.ssim_threshold) {
            return Err(HunterError::config(format!(
                "ssim_threshold {} outside [0, 1]",
                self.ssim_threshold
            )));
        }
        if !self.color_difference.is_finite() || self.color_difference < 0.0 {
            return Err(HunterError::config(format!(
                "color_difference {} must be a finite value >= 0",
                self.color_difference
            )));
        }
        Ok(())
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// A complete hunt profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub thresholds: ThresholdSet,
    #[serde(default)]
    pub keys: KeyBindings,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub regions: RegionRegistry,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            thresholds: ThresholdSet::default(),
            keys: KeyBindings::default(),
            timeline: TimelineConfig::default(),
            regions: RegionRegistry::new(),
        }
    }
}

impl HuntConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML profile
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: HuntConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a profile from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded hunt profile from {}", path.display());
        Ok(config)
    }

    /// Validate and write the profile to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_toml_string()?)?;
        log::info!("Saved hunt profile to {}", path.display());
        Ok(())
    }

    /// Check every section. Regions may be empty here; an empty region list
    /// is only refused when a run starts.
    pub fn validate(&self) -> Result<()> {
        if self.version > CONFIG_VERSION {
            return Err(HunterError::config(format!(
                "Profile version {} is newer than supported version {}",
                self.version, CONFIG_VERSION
            )));
        }
        self.thresholds.validate()?;
        self.keys.validate()?;
        self.timeline.validate()?;
        self.regions.validate()
    }
}
