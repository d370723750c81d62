//! Import of legacy JSON profile directories
//!
//! A legacy profile is a directory holding any of:
//! - `image.png`, `reference.png` or `<name>_reference.png`: reference images
//! - `screenshootposition.json`: `{"regions": [{"name", "region": [x1, y1, x2, y2], "enabled"}]}`
//! - `timer.json`: delays of the fixed quick-load sequence plus the retry policy
//! - `threshold.json`: the three match thresholds
//!
//! Missing files are skipped.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{HuntConfig, ThresholdSet};
use crate::core::TimelineConfig;
use crate::vision::{Rect, Region, RegionRegistry, ReferenceSet};
use crate::{HunterError, Result};

const REGIONS_FILE: &str = "screenshootposition.json";
const TIMER_FILE: &str = "timer.json";
const THRESHOLD_FILE: &str = "threshold.json";

#[derive(Debug, Deserialize)]
struct LegacyRegions {
    #[serde(default)]
    regions: Vec<LegacyRegion>,
}

#[derive(Debug, Deserialize)]
struct LegacyRegion {
    name: String,
    region: [i32; 4],
    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct LegacyTimer {
    #[serde(default = "default_initial_delay")]
    initial_delay: f64,
    #[serde(default = "default_f1_delay")]
    f1_delay: f64,
    #[serde(default = "default_first_a_delay")]
    first_a_delay: f64,
    #[serde(default = "default_analysis_delay")]
    analysis_delay: f64,
    #[serde(default = "default_retry_count")]
    retry_count: u32,
    #[serde(default = "default_retry_interval")]
    retry_interval: f64,
}

fn default_initial_delay() -> f64 {
    5.0
}
fn default_f1_delay() -> f64 {
    0.5
}
fn default_first_a_delay() -> f64 {
    0.8
}
fn default_analysis_delay() -> f64 {
    4.0
}
fn default_retry_count() -> u32 {
    2
}
fn default_retry_interval() -> f64 {
    2.0
}

impl LegacyTimer {
    /// `analysis_delay` is the settle time after the second confirm
    fn into_timeline(self) -> TimelineConfig {
        TimelineConfig::classic(
            self.initial_delay,
            self.f1_delay,
            self.first_a_delay,
            self.analysis_delay,
        )
        .with_retry(self.retry_count, self.retry_interval)
    }
}

/// What a legacy profile directory contained
#[derive(Debug, Clone, Default)]
pub struct LegacyImport {
    pub references: ReferenceSet,
    pub regions: Option<RegionRegistry>,
    pub timeline: Option<TimelineConfig>,
    pub thresholds: Option<ThresholdSet>,
    /// Names of the files that were imported
    pub imported: Vec<String>,
}

impl LegacyImport {
    /// Whether nothing importable was found
    pub fn is_empty(&self) -> bool {
        self.imported.is_empty()
    }

    /// Overwrite the sections of `config` this import provides
    pub fn apply_to(&self, config: &mut HuntConfig) {
        if let Some(regions) = &self.regions {
            config.regions = regions.clone();
        }
        if let Some(timeline) = &self.timeline {
            config.timeline = timeline.clone();
        }
        if let Some(thresholds) = self.thresholds {
            config.thresholds = thresholds;
        }
    }
}

fn is_reference_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower == "image.png" || lower == "reference.png" || lower.ends_with("_reference.png")
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read a legacy profile directory.
///
/// Every file that is present must parse and validate; a broken file fails
/// the whole import rather than being half-applied.
pub fn import_profile_dir(dir: impl AsRef<Path>) -> Result<LegacyImport> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(HunterError::config(format!(
            "Profile directory does not exist: {}",
            dir.display()
        )));
    }

    let mut import = LegacyImport::default();

    let mut reference_files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(is_reference_file)
                .unwrap_or(false)
        })
        .collect();
    reference_files.sort();
    for path in reference_files {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("reference")
            .to_string();
        import.references.load(&name, &path)?;
        if let Some(file_name) = path.file_name() {
            import.imported.push(file_name.to_string_lossy().into_owned());
        }
    }

    let regions_path = dir.join(REGIONS_FILE);
    if regions_path.exists() {
        let legacy: LegacyRegions = read_json(&regions_path)?;
        let regions = legacy
            .regions
            .into_iter()
            .map(|r| {
                let mut region = Region::new(r.name, Rect::from(r.region))?;
                region.enabled = r.enabled;
                Ok(region)
            })
            .collect::<Result<Vec<_>>>()?;
        import.regions = Some(RegionRegistry::from_regions(regions)?);
        import.imported.push(REGIONS_FILE.to_string());
    }

    let timer_path = dir.join(TIMER_FILE);
    if timer_path.exists() {
        let timer: LegacyTimer = read_json(&timer_path)?;
        let timeline = timer.into_timeline();
        timeline.validate()?;
        import.timeline = Some(timeline);
        import.imported.push(TIMER_FILE.to_string());
    }

    let threshold_path = dir.join(THRESHOLD_FILE);
    if threshold_path.exists() {
        let thresholds: ThresholdSet = read_json(&threshold_path)?;
        thresholds.validate()?;
        import.thresholds = Some(thresholds);
        import.imported.push(THRESHOLD_FILE.to_string());
    }

    if import.is_empty() {
        log::warn!("No importable files in {}", dir.display());
    } else {
        log::info!(
            "Imported legacy profile {}: {}",
            dir.display(),
            import.imported.join(", ")
        );
    }
    Ok(import)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActionKind;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_import_full_profile() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]))
            .save(dir.path().join("eevee_reference.png"))
            .unwrap();
        fs::write(
            dir.path().join(REGIONS_FILE),
            r#"{"regions": [
                {"name": "sprite", "region": [100, 50, 260, 210], "enabled": true},
                {"name": "name_box", "region": [0, 0, 40, 10], "enabled": false}
            ]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(TIMER_FILE),
            r#"{"initial_delay": 3.0, "f1_delay": 0.7, "first_a_delay": 1.0,
                "analysis_delay": 5.0, "retry_count": 1, "retry_interval": 1.5}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(THRESHOLD_FILE),
            r#"{"color_similarity": 0.85, "ssim_threshold": 0.6, "color_difference": 25.0}"#,
        )
        .unwrap();

        let import = import_profile_dir(dir.path()).unwrap();
        assert_eq!(import.imported.len(), 4);
        assert_eq!(import.references.names(), vec!["eevee_reference"]);

        let regions = import.regions.as_ref().unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions.enabled_count(), 1);

        let timeline = import.timeline.as_ref().unwrap();
        assert_eq!(timeline.retry_count, 1);
        assert_eq!(timeline.actions[0].kind, ActionKind::InitialDelay);
        assert_eq!(timeline.actions[0].delay, 3.0);
        assert_eq!(timeline.actions[3].delay, 5.0);

        let mut config = HuntConfig::default();
        import.apply_to(&mut config);
        assert_eq!(config.thresholds.color_similarity, 0.85);
        assert_eq!(config.regions.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TIMER_FILE), "{}").unwrap();

        let import = import_profile_dir(dir.path()).unwrap();
        assert_eq!(import.imported, vec![TIMER_FILE.to_string()]);
        assert!(import.references.is_empty());
        assert!(import.regions.is_none());
        assert_eq!(import.timeline, Some(TimelineConfig::default()));
    }

    #[test]
    fn test_invalid_timer_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TIMER_FILE), r#"{"retry_count": 9}"#).unwrap();
        assert!(import_profile_dir(dir.path()).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = import_profile_dir(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, HunterError::Configuration(_)));
    }
}
