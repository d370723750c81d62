//! Resumable hunt snapshots
//!
//! A snapshot directory holds `snapshot.toml` (progress and configuration)
//! and the reference images as PNGs under `references/`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::{HuntConfig, CONFIG_VERSION};
use crate::vision::{ReferenceImage, ReferenceSet};
use crate::{HunterError, Result};

pub const SNAPSHOT_FILE: &str = "snapshot.toml";
pub const REFERENCES_DIR: &str = "references";

/// Everything needed to rebuild a paused hunt in a new process
#[derive(Debug, Clone)]
pub struct HuntSnapshot {
    pub hunt_count: u64,
    /// Index of the next timeline action
    pub cursor: usize,
    pub config: HuntConfig,
    pub references: ReferenceSet,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotReference {
    name: String,
    file: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    hunt_count: u64,
    cursor: usize,
    #[serde(default)]
    references: Vec<SnapshotReference>,
    config: HuntConfig,
}

impl HuntSnapshot {
    /// Write the snapshot into `dir`, replacing any previous snapshot there
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let refs_dir = dir.join(REFERENCES_DIR);
        if refs_dir.exists() {
            fs::remove_dir_all(&refs_dir)?;
        }
        fs::create_dir_all(&refs_dir)?;

        let mut references = Vec::with_capacity(self.references.len());
        for (i, reference) in self.references.iter().enumerate() {
            // names are free text; files are numbered
            let file = format!("{:03}.png", i);
            reference.pixels().save(refs_dir.join(&file))?;
            references.push(SnapshotReference {
                name: reference.name().to_string(),
                file,
            });
        }

        let file = SnapshotFile {
            version: CONFIG_VERSION,
            hunt_count: self.hunt_count,
            cursor: self.cursor,
            references,
            config: self.config.clone(),
        };
        fs::write(dir.join(SNAPSHOT_FILE), toml::to_string_pretty(&file)?)?;

        log::info!(
            "Saved snapshot to {} (count {}, {} references)",
            dir.display(),
            self.hunt_count,
            self.references.len()
        );
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save)
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let content = fs::read_to_string(dir.join(SNAPSHOT_FILE))?;
        let file: SnapshotFile = toml::from_str(&content)?;

        if file.version > CONFIG_VERSION {
            return Err(HunterError::config(format!(
                "Snapshot version {} is newer than supported version {}",
                file.version, CONFIG_VERSION
            )));
        }
        file.config.validate()?;

        let mut references = ReferenceSet::new();
        for entry in &file.references {
            let path = dir.join(REFERENCES_DIR).join(&entry.file);
            references.insert(ReferenceImage::load(&entry.name, path)?);
        }

        log::info!(
            "Loaded snapshot from {} (count {})",
            dir.display(),
            file.hunt_count
        );
        Ok(Self {
            hunt_count: file.hunt_count,
            cursor: file.cursor,
            config: file.config,
            references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{Rect, Region};
    use image::{Rgb, RgbImage};

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = HuntConfig::default();
        config
            .regions
            .add(Region::new("sprite", Rect::new(5, 5, 69, 69)).unwrap())
            .unwrap();
        let mut references = ReferenceSet::new();
        references.insert(ReferenceImage::new("normal form", RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))).unwrap());
        references.insert(ReferenceImage::new("alt/form", RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]))).unwrap());

        let snapshot = HuntSnapshot {
            hunt_count: 1234,
            cursor: 3,
            config: config.clone(),
            references,
        };
        snapshot.save(dir.path()).unwrap();
        assert!(dir.path().join(SNAPSHOT_FILE).exists());

        let loaded = HuntSnapshot::load(dir.path()).unwrap();
        assert_eq!(loaded.hunt_count, 1234);
        assert_eq!(loaded.cursor, 3);
        assert_eq!(loaded.config, config);
        assert_eq!(loaded.references.names(), vec!["normal form", "alt/form"]);
        assert_eq!(
            loaded.references.get("alt/form").unwrap().pixels().get_pixel(0, 0),
            &Rgb([9, 9, 9])
        );
    }

    #[test]
    fn test_load_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            HuntSnapshot::load(dir.path()).unwrap_err(),
            HunterError::Io(_)
        ));
    }
}
