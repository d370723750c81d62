//! Confirmation rounds
//!
//! One analysis step of the timeline is a round of up to `retry_count + 1`
//! attempts. An attempt passes only when every enabled region matches in that
//! same attempt; the round stops at the first passing attempt. When every
//! attempt fails, the failing regions of the last attempt are reported (and
//! their images saved) for the operator to adjudicate.

use image::RgbImage;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::wait::Countdown;
use crate::config::ThresholdSet;
use crate::vision::{evaluate, AnalysisAttemptResult, EvidenceStore, FrameSource, ReferenceSet, RegionRegistry};
use crate::{HunterError, Result};

/// Region name reported when the final attempt could not capture at all
pub const CAPTURE_FAILED_REGION: &str = "capture failed";

/// A region that did not match, with the 1-based attempt it failed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRegion {
    pub region_name: String,
    pub attempt: u32,
}

/// Result of one confirmation round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationOutcome {
    pub has_failure: bool,
    /// Set when the last attempt failed to capture; the round then carries no
    /// detection evidence
    pub capture_error: Option<String>,
    pub success_count: usize,
    pub failed_regions: Vec<FailedRegion>,
    pub failed_image_paths: Vec<(String, PathBuf)>,
    pub total_regions: usize,
    pub attempt_count: u32,
    /// Per-region verdicts of the last evaluated attempt
    pub results: Vec<AnalysisAttemptResult>,
}

impl ConfirmationOutcome {
    pub fn is_capture_failure(&self) -> bool {
        self.capture_error.is_some()
    }

    /// A failure that came from the images themselves, not from capturing
    pub fn is_detection(&self) -> bool {
        self.has_failure && !self.is_capture_failure()
    }
}

/// Parameters of a confirmation round
pub struct ConfirmationRound<'a> {
    regions: &'a RegionRegistry,
    references: &'a ReferenceSet,
    thresholds: &'a RwLock<ThresholdSet>,
    retry_count: u32,
    retry_interval: f64,
    evidence: Option<&'a dyn EvidenceStore>,
}

impl<'a> ConfirmationRound<'a> {
    pub fn new(
        regions: &'a RegionRegistry,
        references: &'a ReferenceSet,
        thresholds: &'a RwLock<ThresholdSet>,
    ) -> Self {
        Self {
            regions,
            references,
            thresholds,
            retry_count: 0,
            retry_interval: 0.0,
            evidence: None,
        }
    }

    pub fn with_retry(mut self, retry_count: u32, retry_interval: f64) -> Self {
        self.retry_count = retry_count;
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_evidence(mut self, evidence: Option<&'a dyn EvidenceStore>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Run the round.
    ///
    /// Errors are configuration problems (no references, no enabled regions)
    /// or [`HunterError::Cancelled`] when a retry wait is interrupted. Capture
    /// failures are retried; one on the last attempt is reported in the
    /// outcome.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        countdown: &Countdown<'_>,
    ) -> Result<ConfirmationOutcome> {
        if self.references.is_empty() {
            return Err(HunterError::config("No reference images loaded"));
        }
        let total_regions = self.regions.enabled_count();
        if total_regions == 0 {
            return Err(HunterError::config("No enabled regions"));
        }

        let attempts = self.retry_count + 1;
        let mut failures: Vec<(FailedRegion, RgbImage)> = Vec::new();
        let mut results = Vec::new();
        let mut success_count = 0;

        for attempt in 0..attempts {
            if attempt > 0 {
                countdown.wait(
                    self.retry_interval,
                    &format!("Retry {}/{}", attempt, self.retry_count),
                )?;
            }
            let attempt_number = attempt + 1;

            let captured = match self.regions.capture_all(source) {
                Ok(captured) => captured,
                Err(e) => {
                    log::warn!("Attempt {}/{}: {}", attempt_number, attempts, e);
                    if attempt_number == attempts {
                        return Ok(ConfirmationOutcome {
                            has_failure: true,
                            capture_error: Some(e.to_string()),
                            success_count: 0,
                            failed_regions: vec![FailedRegion {
                                region_name: CAPTURE_FAILED_REGION.to_string(),
                                attempt: attempt_number,
                            }],
                            failed_image_paths: Vec::new(),
                            total_regions,
                            attempt_count: attempt_number,
                            results: Vec::new(),
                        });
                    }
                    continue;
                }
            };

            // one consistent threshold set per attempt
            let thresholds = *self.thresholds.read();
            failures.clear();
            results.clear();
            success_count = 0;

            for region in captured {
                let result = evaluate(&region.name, &region.image, self.references, &thresholds)?;
                if result.is_match {
                    success_count += 1;
                } else {
                    failures.push((
                        FailedRegion {
                            region_name: region.name.clone(),
                            attempt: attempt_number,
                        },
                        region.image,
                    ));
                }
                results.push(result);
            }

            if failures.is_empty() {
                log::info!(
                    "Attempt {}/{}: all {} regions matched",
                    attempt_number,
                    attempts,
                    total_regions
                );
                return Ok(ConfirmationOutcome {
                    has_failure: false,
                    capture_error: None,
                    success_count,
                    failed_regions: Vec::new(),
                    failed_image_paths: Vec::new(),
                    total_regions,
                    attempt_count: attempt_number,
                    results,
                });
            }

            log::info!(
                "Attempt {}/{}: {} of {} regions did not match",
                attempt_number,
                attempts,
                failures.len(),
                total_regions
            );
        }

        log::warn!(
            "{} regions still failing after {} attempts",
            failures.len(),
            attempts
        );

        let failed_image_paths = self.save_evidence(&failures);
        Ok(ConfirmationOutcome {
            has_failure: true,
            capture_error: None,
            success_count,
            failed_regions: failures.into_iter().map(|(failed, _)| failed).collect(),
            failed_image_paths,
            total_regions,
            attempt_count: attempts,
            results,
        })
    }

    fn save_evidence(&self, failures: &[(FailedRegion, RgbImage)]) -> Vec<(String, PathBuf)> {
        let Some(store) = self.evidence else {
            return Vec::new();
        };
        failures
            .iter()
            .filter_map(|(failed, image)| match store.save_image(&failed.region_name, image) {
                Ok(path) => Some((failed.region_name.clone(), path)),
                Err(e) => {
                    log::warn!("Could not save evidence for {}: {}", failed.region_name, e);
                    None
                }
            })
            .collect()
    }
}
