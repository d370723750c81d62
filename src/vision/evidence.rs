//! Evidence persistence for detection halts
//!
//! When a round escalates to "event confirmed", the failing region images are
//! written out so the operator can tell a real shiny from a false positive.

use chrono::Local;
use image::RgbImage;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::Result;

/// Sink for failing-region images; the returned path is opaque to the engine
pub trait EvidenceStore: Send + Sync {
    fn save_image(&self, region_name: &str, image: &RgbImage) -> Result<PathBuf>;
}

/// Result of [`DiskEvidenceStore::cleanup`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub kept: usize,
}

/// Writes evidence PNGs into a directory
pub struct DiskEvidenceStore {
    dir: PathBuf,
    /// Images confirmed as real detections; never cleaned up
    marked: Mutex<HashSet<PathBuf>>,
}

impl DiskEvidenceStore {
    /// Create the store, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            marked: Mutex::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Protect an evidence image from [`cleanup`](Self::cleanup)
    pub fn mark_as_shiny(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::info!("Marked as shiny: {}", path.display());
        self.marked.lock().insert(path);
    }

    pub fn is_marked(&self, path: &Path) -> bool {
        self.marked.lock().contains(path)
    }

    /// Delete PNGs at least `max_age` old, optionally keeping marked images
    pub fn cleanup(&self, max_age: Duration, keep_marked: bool) -> Result<CleanupReport> {
        let now = SystemTime::now();
        let marked = self.marked.lock().clone();
        let mut report = CleanupReport::default();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            if keep_marked && marked.contains(&path) {
                report.kept += 1;
                continue;
            }

            let age = fs::metadata(&path)?
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age >= max_age {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        log::debug!("Deleted expired evidence: {}", path.display());
                        report.deleted += 1;
                    }
                    Err(e) => {
                        log::warn!("Failed to delete {}: {}", path.display(), e);
                        report.kept += 1;
                    }
                }
            } else {
                report.kept += 1;
            }
        }

        log::info!(
            "Evidence cleanup: deleted {}, kept {}",
            report.deleted,
            report.kept
        );
        Ok(report)
    }
}

/// Keep file names portable whatever the operator named the region
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl EvidenceStore for DiskEvidenceStore {
    fn save_image(&self, region_name: &str, image: &RgbImage) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let mut path = self
            .dir
            .join(format!("screenshot_{}_{}.png", stamp, sanitize(region_name)));

        // same region twice within a millisecond
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!(
                "screenshot_{}_{}_{}.png",
                stamp,
                sanitize(region_name),
                n
            ));
            n += 1;
        }

        image.save(&path)?;
        log::info!("Saved evidence for {}: {}", region_name, path.display());
        Ok(path)
    }
}
