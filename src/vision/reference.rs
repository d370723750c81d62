//! Reference images the captures are compared against

use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::metrics::ColorHistogram;
use crate::{HunterError, Result};

/// A decoded reference image with its cached histogram.
///
/// Immutable once built; shared read-only by the matcher.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    name: String,
    pixels: RgbImage,
    histogram: ColorHistogram,
    source_path: Option<PathBuf>,
}

impl ReferenceImage {
    /// Build a reference from pixels, computing its histogram once
    pub fn new(name: impl Into<String>, pixels: RgbImage) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HunterError::config("Reference image name must not be empty"));
        }
        let histogram = ColorHistogram::from_image(&pixels).ok_or_else(|| {
            HunterError::config(format!("Reference image '{}' is empty", name))
        })?;
        Ok(Self {
            name,
            pixels,
            histogram,
            source_path: None,
        })
    }

    /// Decode an image file (any format the `image` crate reads) as a reference
    pub fn load(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pixels = image::open(path)?.to_rgb8();
        let mut reference = Self::new(name, pixels)?;
        reference.source_path = Some(path.to_path_buf());
        Ok(reference)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn histogram(&self) -> &ColorHistogram {
        &self.histogram
    }

    /// File the image was loaded from, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

/// Named reference images, in insertion order
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    images: Vec<Arc<ReferenceImage>>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference. A reference with the same name is replaced.
    pub fn insert(&mut self, reference: ReferenceImage) {
        let reference = Arc::new(reference);
        match self.images.iter_mut().find(|r| r.name() == reference.name()) {
            Some(existing) => {
                log::info!("Replaced reference image: {}", reference.name());
                *existing = reference;
            }
            None => {
                log::info!(
                    "Loaded reference image: {} ({}x{})",
                    reference.name(),
                    reference.pixels().width(),
                    reference.pixels().height()
                );
                self.images.push(reference);
            }
        }
    }

    /// Decode and add a reference image from disk
    pub fn load(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<()> {
        let reference = ReferenceImage::load(name, path)?;
        self.insert(reference);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|r| r.name() != name);
        let removed = self.images.len() != before;
        if removed {
            log::info!("Removed reference image: {}", name);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.images.clear();
        log::info!("Cleared all reference images");
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceImage> {
        self.images.iter().find(|r| r.name() == name).map(|r| r.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.images.iter().map(|r| r.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceImage> {
        self.images.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
