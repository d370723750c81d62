//! Image similarity metrics
//!
//! Three independent signals between two RGB images:
//! - [`color_similarity`]: histogram correlation, higher is closer
//! - [`color_difference`]: mean absolute channel difference, lower is closer
//! - [`structural_similarity`]: SSIM on luminance, higher is closer
//!
//! All of them resize the second image to the first one's dimensions when they
//! differ, and report a failure value instead of panicking on degenerate
//! input.

use image::{imageops, imageops::FilterType, RgbImage};
use image_compare::Algorithm;
use std::borrow::Cow;

/// Bins per channel
const BINS: usize = 256;

/// Returned by [`color_similarity`] and [`structural_similarity`] on failure
pub const SIMILARITY_FAILURE: f64 = 0.0;

/// Returned by [`color_difference`] on failure; never satisfies a threshold
pub const DIFFERENCE_FAILURE: f64 = f64::INFINITY;

/// Normalized, concatenated R/G/B histogram (3 x 256 bins summing to 1)
#[derive(Debug, Clone, PartialEq)]
pub struct ColorHistogram {
    bins: Vec<f64>,
}

impl ColorHistogram {
    /// Compute the histogram of an image; `None` for an empty image
    pub fn from_image(image: &RgbImage) -> Option<Self> {
        if image.width() == 0 || image.height() == 0 {
            return None;
        }

        let hist = imageproc::stats::histogram(image);
        let total: u64 = hist
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|&n| n as u64)
            .sum();
        if total == 0 {
            return None;
        }

        let bins = hist
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|&n| n as f64 / total as f64)
            .collect::<Vec<_>>();
        debug_assert_eq!(bins.len(), BINS * 3);

        Some(Self { bins })
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// Pearson correlation between two histograms, clamped to `[0, 1]`.
    ///
    /// Two flat histograms have no variance to correlate and count as
    /// identical.
    pub fn correlation(&self, other: &ColorHistogram) -> f64 {
        let n = self.bins.len().min(other.bins.len());
        if n == 0 {
            return SIMILARITY_FAILURE;
        }
        let a = &self.bins[..n];
        let b = &other.bins[..n];

        let mean_a = a.iter().sum::<f64>() / n as f64;
        let mean_b = b.iter().sum::<f64>() / n as f64;

        let (mut num, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
        for (x, y) in a.iter().zip(b) {
            let da = x - mean_a;
            let db = y - mean_b;
            num += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        let denom = var_a * var_b;
        let corr = if denom.abs() > f64::EPSILON {
            num / denom.sqrt()
        } else {
            1.0
        };
        if corr.is_finite() {
            corr.clamp(0.0, 1.0)
        } else {
            SIMILARITY_FAILURE
        }
    }
}

/// Resize `other` to `reference`'s dimensions when they differ
fn match_dimensions<'a>(reference: &RgbImage, other: &'a RgbImage) -> Option<Cow<'a, RgbImage>> {
    if reference.width() == 0 || reference.height() == 0 {
        return None;
    }
    if other.width() == 0 || other.height() == 0 {
        return None;
    }
    if reference.dimensions() == other.dimensions() {
        return Some(Cow::Borrowed(other));
    }
    Some(Cow::Owned(imageops::resize(
        other,
        reference.width(),
        reference.height(),
        FilterType::Triangle,
    )))
}

/// Histogram correlation between two images in `[0, 1]`
pub fn color_similarity(a: &RgbImage, b: &RgbImage) -> f64 {
    match ColorHistogram::from_image(a) {
        Some(hist_a) => color_similarity_with(&hist_a, b),
        None => SIMILARITY_FAILURE,
    }
}

/// Histogram correlation against a precomputed histogram of the first image
pub fn color_similarity_with(hist_a: &ColorHistogram, b: &RgbImage) -> f64 {
    match ColorHistogram::from_image(b) {
        Some(hist_b) => hist_a.correlation(&hist_b),
        None => SIMILARITY_FAILURE,
    }
}

/// Mean absolute per-channel difference (0 = identical, 255 = inverted)
pub fn color_difference(a: &RgbImage, b: &RgbImage) -> f64 {
    let Some(b) = match_dimensions(a, b) else {
        return DIFFERENCE_FAILURE;
    };

    let raw_a = a.as_raw();
    let raw_b = b.as_raw();
    if raw_a.is_empty() || raw_a.len() != raw_b.len() {
        return DIFFERENCE_FAILURE;
    }

    let sum: u64 = raw_a
        .iter()
        .zip(raw_b.iter())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    sum as f64 / raw_a.len() as f64
}

/// Structural similarity on grayscale versions of both images, in `[0, 1]`
pub fn structural_similarity(a: &RgbImage, b: &RgbImage) -> f64 {
    let Some(b) = match_dimensions(a, b) else {
        return SIMILARITY_FAILURE;
    };

    let gray_a = imageops::grayscale(a);
    let gray_b = imageops::grayscale(&*b);

    match image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, &gray_a, &gray_b) {
        Ok(similarity) if similarity.score.is_finite() => similarity.score.clamp(0.0, 1.0),
        Ok(_) => SIMILARITY_FAILURE,
        Err(e) => {
            log::warn!("SSIM computation failed: {:?}", e);
            SIMILARITY_FAILURE
        }
    }
}
