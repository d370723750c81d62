//! Multi-reference matching
//!
//! A captured region is compared against every reference image and the best
//! value of each metric is kept: any sufficiently close reference (e.g. one of
//! several lighting variants) counts as a match.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::metrics::{color_difference, color_similarity_with, structural_similarity};
use super::reference::{ReferenceImage, ReferenceSet};
use crate::config::ThresholdSet;
use crate::{HunterError, Result};

/// Metric values for one comparison (or the best-of aggregate)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchMetrics {
    pub color_similarity: f64,
    pub color_difference: f64,
    pub ssim: f64,
    pub overall_score: f64,
}

impl MatchMetrics {
    fn new(color_similarity: f64, color_difference: f64, ssim: f64) -> Self {
        Self {
            color_similarity,
            color_difference,
            ssim,
            overall_score: (color_similarity + ssim) / 2.0,
        }
    }

    /// Whether all three thresholds hold at once
    pub fn satisfies(&self, thresholds: &ThresholdSet) -> bool {
        self.color_similarity >= thresholds.color_similarity
            && self.ssim >= thresholds.ssim_threshold
            && self.color_difference <= thresholds.color_difference
    }
}

/// Metrics of a capture against one reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceScore {
    pub reference_name: String,
    pub metrics: MatchMetrics,
}

/// Verdict for one region in one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisAttemptResult {
    pub region_name: String,
    /// Best-of aggregate across references
    pub metrics: MatchMetrics,
    pub is_match: bool,
    /// Reference with the highest overall score; diagnostic only
    pub best_reference_name: String,
    pub per_reference: Vec<ReferenceScore>,
}

/// Compare a capture against a single reference
pub fn score_reference(captured: &RgbImage, reference: &ReferenceImage) -> MatchMetrics {
    MatchMetrics::new(
        color_similarity_with(reference.histogram(), captured),
        color_difference(captured, reference.pixels()),
        structural_similarity(captured, reference.pixels()),
    )
}

/// Evaluate one captured region against the whole reference set.
///
/// An empty reference set is a configuration fault, never a "no match".
pub fn evaluate(
    region_name: &str,
    captured: &RgbImage,
    references: &ReferenceSet,
    thresholds: &ThresholdSet,
) -> Result<AnalysisAttemptResult> {
    if references.is_empty() {
        return Err(HunterError::config("No reference images loaded"));
    }

    let per_reference: Vec<ReferenceScore> = references
        .iter()
        .map(|reference| ReferenceScore {
            reference_name: reference.name().to_string(),
            metrics: score_reference(captured, reference),
        })
        .collect();

    let mut best_cs = f64::NEG_INFINITY;
    let mut best_ssim = f64::NEG_INFINITY;
    let mut best_cd = f64::INFINITY;
    let mut best_overall = f64::NEG_INFINITY;
    let mut best_reference = &per_reference[0];

    for score in &per_reference {
        let m = &score.metrics;
        best_cs = best_cs.max(m.color_similarity);
        best_ssim = best_ssim.max(m.ssim);
        best_cd = best_cd.min(m.color_difference);
        // strict: the first of equally good references wins
        if m.overall_score > best_overall {
            best_overall = m.overall_score;
            best_reference = score;
        }
    }

    let metrics = MatchMetrics {
        color_similarity: best_cs,
        color_difference: best_cd,
        ssim: best_ssim,
        overall_score: best_overall,
    };
    let is_match = metrics.satisfies(thresholds);

    log::debug!(
        "Region {}: best={} cs={:.3} ssim={:.3} cd={:.1} match={}",
        region_name,
        best_reference.reference_name,
        metrics.color_similarity,
        metrics.ssim,
        metrics.color_difference,
        is_match
    );

    Ok(AnalysisAttemptResult {
        region_name: region_name.to_string(),
        metrics,
        is_match,
        best_reference_name: best_reference.reference_name.clone(),
        per_reference,
    })
}
