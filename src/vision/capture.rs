//! Screen regions and frame sources
//!
//! The raw capture primitive is external: anything that can turn a screen
//! rectangle into an RGB buffer implements [`FrameSource`]. The
//! [`RegionRegistry`] owns the operator's named regions and captures every
//! enabled one per attempt.

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{HunterError, Result};

/// Screen rectangle in absolute pixel coordinates, `(x1, y1)` inclusive and
/// `(x2, y2)` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Horizontal extent, saturating at the `i32` bounds
    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Width and height in pixels; `None` for an empty, inverted or
    /// unrepresentable rectangle
    pub fn size(&self) -> Option<(u32, u32)> {
        let w = self.x2.checked_sub(self.x1)?;
        let h = self.y2.checked_sub(self.y1)?;
        if w > 0 && h > 0 {
            Some((w as u32, h as u32))
        } else {
            None
        }
    }

    /// Whether the rectangle covers at least one pixel
    pub fn has_area(&self) -> bool {
        self.size().is_some()
    }
}

impl From<[i32; 4]> for Rect {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// A named screen area captured independently every attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub rect: Rect,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Region {
    /// Create an enabled region, rejecting empty names and zero-area rects
    pub fn new(name: impl Into<String>, rect: Rect) -> Result<Self> {
        let region = Self {
            name: name.into(),
            rect,
            enabled: true,
        };
        region.validate()?;
        Ok(region)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HunterError::config("Region name must not be empty"));
        }
        if !self.rect.has_area() {
            return Err(HunterError::config(format!(
                "Region '{}' has no area: {}",
                self.name, self.rect
            )));
        }
        Ok(())
    }
}

/// Source of raw screen pixels
pub trait FrameSource: Send {
    /// Called once at the start of every capture attempt, before any region
    /// of that attempt is captured.
    fn advance(&mut self) -> Result<()> {
        Ok(())
    }

    /// Capture the given rectangle as an RGB image
    fn capture(&mut self, rect: Rect) -> Result<RgbImage>;
}

/// One region's pixels from a single attempt
#[derive(Debug, Clone)]
pub struct CapturedRegion {
    pub name: String,
    pub rect: Rect,
    pub image: RgbImage,
}

/// Ordered set of uniquely named regions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionRegistry {
    regions: Vec<Region>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list, validating every entry
    pub fn from_regions(regions: Vec<Region>) -> Result<Self> {
        let mut registry = Self::new();
        for region in regions {
            registry.add(region)?;
        }
        Ok(registry)
    }

    /// Add a region; names must be unique
    pub fn add(&mut self, region: Region) -> Result<()> {
        region.validate()?;
        if self.get(&region.name).is_some() {
            return Err(HunterError::config(format!(
                "Region '{}' already exists",
                region.name
            )));
        }
        log::info!("Added region {} {}", region.name, region.rect);
        self.regions.push(region);
        Ok(())
    }

    /// Remove a region by name, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<Region> {
        let idx = self.regions.iter().position(|r| r.name == name)?;
        log::info!("Removed region {}", name);
        Some(self.regions.remove(idx))
    }

    /// Enable/disable region by name
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.regions.iter_mut().find(|r| r.name == name) {
            Some(region) => {
                region.enabled = enabled;
                log::info!(
                    "Region {} {}",
                    name,
                    if enabled { "enabled" } else { "disabled" }
                );
                true
            }
            None => false,
        }
    }

    /// Flip a region's enabled flag, returning the new value
    pub fn toggle(&mut self, name: &str) -> Option<bool> {
        let enabled = !self.get(name)?.enabled;
        self.set_enabled(name, enabled);
        Some(enabled)
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        log::info!("Cleared all regions");
    }

    /// Re-check every region and name uniqueness (deserialized registries
    /// bypass [`add`](Self::add))
    pub fn validate(&self) -> Result<()> {
        for (i, region) in self.regions.iter().enumerate() {
            region.validate()?;
            if self.regions[..i].iter().any(|r| r.name == region.name) {
                return Err(HunterError::config(format!(
                    "Duplicate region name '{}'",
                    region.name
                )));
            }
        }
        Ok(())
    }

    /// Swap in a whole new region list; on error the registry is unchanged
    pub fn replace_all(&mut self, regions: Vec<Region>) -> Result<()> {
        *self = Self::from_regions(regions)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.enabled)
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Capture every enabled region for one attempt.
    ///
    /// Any enabled region failing fails the whole attempt, so a region is
    /// never silently left out of a verdict.
    pub fn capture_all(&self, source: &mut dyn FrameSource) -> Result<Vec<CapturedRegion>> {
        source.advance()?;

        let mut captured = Vec::with_capacity(self.regions.len());
        for region in self.enabled() {
            let image = source.capture(region.rect).map_err(|e| {
                HunterError::capture(format!("region '{}': {}", region.name, e))
            })?;
            captured.push(CapturedRegion {
                name: region.name.clone(),
                rect: region.rect,
                image,
            });
        }

        log::debug!("Captured {} regions", captured.len());
        Ok(captured)
    }
}

/// Crop a rectangle out of a full-screen frame
fn crop_frame(frame: &RgbImage, rect: Rect) -> Result<RgbImage> {
    let (w, h) = match rect.size() {
        Some(size) if rect.x1 >= 0 && rect.y1 >= 0 => size,
        _ => return Err(HunterError::capture(format!("invalid rectangle {}", rect))),
    };
    let (x, y) = (rect.x1 as u32, rect.y1 as u32);
    if u64::from(x) + u64::from(w) > u64::from(frame.width())
        || u64::from(y) + u64::from(h) > u64::from(frame.height())
    {
        return Err(HunterError::capture(format!(
            "rectangle {} outside {}x{} frame",
            rect,
            frame.width(),
            frame.height()
        )));
    }
    Ok(imageops::crop_imm(frame, x, y, w, h).to_image())
}

/// Frame source that crops regions from one fixed full-screen image
pub struct StillFrameSource {
    frame: RgbImage,
}

impl StillFrameSource {
    pub fn new(frame: RgbImage) -> Self {
        Self { frame }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(image::open(path)?.to_rgb8()))
    }

    /// Replace the frame that subsequent captures crop from
    pub fn set_frame(&mut self, frame: RgbImage) {
        self.frame = frame;
    }
}

impl FrameSource for StillFrameSource {
    fn capture(&mut self, rect: Rect) -> Result<RgbImage> {
        crop_frame(&self.frame, rect)
    }
}

/// Replays a directory of full-screen frames, one frame per attempt
pub struct FrameSequenceSource {
    frames: Vec<PathBuf>,
    position: usize,
    current: Option<RgbImage>,
    loop_playback: bool,
}

impl FrameSequenceSource {
    /// Load frame paths from a directory (png/jpg/jpeg/bmp, sorted by name)
    pub fn from_directory(dir: impl AsRef<Path>, loop_playback: bool) -> Result<Self> {
        let dir = dir.as_ref();
        let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        matches!(
                            ext.to_lowercase().as_str(),
                            "png" | "jpg" | "jpeg" | "bmp"
                        )
                    })
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(HunterError::config(format!(
                "No frames found in {}",
                dir.display()
            )));
        }

        log::info!("Loaded {} frames from {}", frames.len(), dir.display());
        Ok(Self {
            frames,
            position: 0,
            current: None,
            loop_playback,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for FrameSequenceSource {
    fn advance(&mut self) -> Result<()> {
        if self.position >= self.frames.len() {
            if !self.loop_playback {
                self.current = None;
                return Err(HunterError::capture("frame sequence exhausted"));
            }
            self.position = 0;
        }
        let path = &self.frames[self.position];
        self.current = Some(image::open(path)?.to_rgb8());
        self.position += 1;
        Ok(())
    }

    fn capture(&mut self, rect: Rect) -> Result<RgbImage> {
        match &self.current {
            Some(frame) => crop_frame(frame, rect),
            None => Err(HunterError::capture("no frame loaded")),
        }
    }
}
