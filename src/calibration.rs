//! Eye-aspect-ratio threshold calibration.
//!
//! Calibration runs two guided phases, eyes open then eyes closed. Each
//! phase skips a short countdown of frames so the user can assume the
//! pose, then collects eye aspect ratios until enough samples exist;
//! frames with no detectable face are simply retried. Outliers are
//! removed with an interquartile-range fence before the phase means are
//! blended into the blink threshold. A shared [`CancelToken`] lets a
//! frontend abort the run between frames.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use log::{debug, info};

use crate::blink::eye_aspect_ratio;
use crate::constants::{
    CALIBRATION_CLOSED_WEIGHT, CALIBRATION_IGNORE_FRAMES, CALIBRATION_MIN_SAMPLES,
    CALIBRATION_OPEN_WEIGHT, CALIBRATION_QUALITY_RATIO,
};
use crate::detection::{prepare_frame, FrameGeometry, FrameSource, MarkDetector};
use crate::{Error, Result};

/// Calibration phase, in running order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Eyes held open
    Open,
    /// Eyes held closed
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "eyes open"),
            Self::Closed => write!(f, "eyes closed"),
        }
    }
}

/// Receives per-frame calibration progress so a frontend can guide the
/// user through the phases
pub trait CalibrationGuide {
    /// Called once per countdown frame; `remaining` counts down to one
    fn countdown(&mut self, phase: Phase, remaining: u32, frame: &RgbImage);
    /// Called once per sampling frame with the number of samples so far
    fn sampling(&mut self, phase: Phase, collected: usize, frame: &RgbImage);
}

/// Guide that discards all progress updates
#[derive(Debug, Default)]
pub struct NullGuide;

impl CalibrationGuide for NullGuide {
    fn countdown(&mut self, _phase: Phase, _remaining: u32, _frame: &RgbImage) {}
    fn sampling(&mut self, _phase: Phase, _collected: usize, _frame: &RgbImage) {}
}

/// Shared flag for aborting a running calibration from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; takes effect at the next frame boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Two-phase calibration runner
pub struct Calibrator {
    min_samples: usize,
    ignore_frames: u32,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self {
            min_samples: CALIBRATION_MIN_SAMPLES,
            ignore_frames: CALIBRATION_IGNORE_FRAMES,
        }
    }
}

impl Calibrator {
    /// Calibrator with explicit sample and countdown counts
    #[must_use]
    pub fn new(min_samples: usize, ignore_frames: u32) -> Self {
        Self {
            min_samples,
            ignore_frames,
        }
    }

    /// Run both phases and derive the blink threshold.
    ///
    /// The lower of the two phase means is taken as the closed-eye mean
    /// regardless of phase order, and the threshold is the weighted blend
    /// of the two, rounded to two decimals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CalibrationCancelled`] when the token fires, or
    /// [`Error::CalibrationQuality`] when a phase keeps too few samples
    /// after outlier removal. Detector failures are passed through.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        detector: &mut dyn MarkDetector,
        guide: &mut dyn CalibrationGuide,
        cancel: &CancelToken,
    ) -> Result<f64> {
        info!("Starting eye aspect ratio calibration");
        let first = self.run_phase(Phase::Open, source, detector, guide, cancel)?;
        let second = self.run_phase(Phase::Closed, source, detector, guide, cancel)?;

        let (open_mean, closed_mean) = if first < second {
            (second, first)
        } else {
            (first, second)
        };

        let threshold =
            CALIBRATION_CLOSED_WEIGHT * closed_mean + CALIBRATION_OPEN_WEIGHT * open_mean;
        let threshold = (threshold * 100.0).round() / 100.0;
        info!(
            "Calibration finished: open {open_mean:.3}, closed {closed_mean:.3}, threshold {threshold}"
        );
        Ok(threshold)
    }

    fn run_phase(
        &self,
        phase: Phase,
        source: &mut dyn FrameSource,
        detector: &mut dyn MarkDetector,
        guide: &mut dyn CalibrationGuide,
        cancel: &CancelToken,
    ) -> Result<f64> {
        info!(
            "Calibration phase \"{phase}\": collecting {} samples",
            self.min_samples
        );
        let mut countdown = self.ignore_frames;
        let mut samples = Vec::with_capacity(self.min_samples);

        while samples.len() < self.min_samples {
            if cancel.is_cancelled() {
                info!("Calibration cancelled");
                return Err(Error::CalibrationCancelled);
            }
            let Some(frame) = source.read() else {
                continue;
            };
            let geometry = FrameGeometry::from_capture(frame.width(), frame.height());
            let working = prepare_frame(&frame, &geometry);

            if countdown > 0 {
                guide.countdown(phase, countdown, &working);
                countdown -= 1;
                continue;
            }

            if let Some(landmarks) = detector.detect(&working)? {
                if let Some(ear) = eye_aspect_ratio(&landmarks, &geometry) {
                    samples.push(ear);
                }
            }
            guide.sampling(phase, samples.len(), &working);
        }

        let retained = self.filter_outliers(&samples)?;
        let mean = retained.iter().sum::<f64>() / retained.len() as f64;
        debug!(
            "Phase \"{phase}\": retained {} of {} samples, mean {mean:.4}",
            retained.len(),
            samples.len()
        );
        Ok(mean)
    }

    /// Drop samples outside the interquartile fence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CalibrationQuality`] when the retained share falls
    /// below the quality ratio, meaning the eye state was too unstable
    /// during the phase.
    fn filter_outliers(&self, samples: &[f64]) -> Result<Vec<f64>> {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let q1 = percentile(&sorted, 25.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let lower = q1 - 1.5 * iqr;
        let upper = q3 + 1.5 * iqr;

        let retained: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|sample| (lower..=upper).contains(sample))
            .collect();
        if (retained.len() as f64) < self.min_samples as f64 * CALIBRATION_QUALITY_RATIO {
            return Err(Error::CalibrationQuality(format!(
                "only {} of {} samples usable after outlier removal",
                retained.len(),
                samples.len()
            )));
        }
        Ok(retained)
    }
}

/// Percentile of an ascending-sorted slice, linearly interpolating
/// between the two nearest ranks
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let rank = p / 100.0 * (sorted.len() - 1) as f64;
            let low = rank.floor() as usize;
            let high = rank.ceil() as usize;
            let fraction = rank - low as f64;
            sorted[low] + (sorted[high] - sorted[low]) * fraction
        }
    }
}
