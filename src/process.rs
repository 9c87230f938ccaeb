//! The per-tick processing loop tying the pipeline together.
//!
//! Each tick reads one frame, paces itself to the frame-rate cap, runs
//! landmark detection, and feeds the results through pose estimation,
//! direction classification, blink detection and the command delay. The
//! frame geometry is latched from the first processed frame; later frames
//! are resized to it. A tick is a pure function of its inputs apart from
//! the component state, so frontends can drive the loop from any thread
//! or timer they like.

use std::time::{Duration, Instant};

use image::RgbImage;
use log::{debug, info};

use crate::blink::{eye_aspect_ratio, BlinkDetector};
use crate::constants::MAX_FRAME_RATE;
use crate::cursor_control::{Command, CursorController};
use crate::detection::{prepare_frame, FrameGeometry, FrameSource, MarkDetector};
use crate::direction::{DirectionClassifier, Directions};
use crate::pose_estimation::PoseEstimator;
use crate::settings::ThresholdConfig;
use crate::Result;

/// External inputs to one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Command queued by the frontend since the last tick
    pub command: Option<Command>,
    /// Whether the caller wants the working frame back
    pub allow_showing_frame: bool,
    /// Whether head movement may drive the pointer this tick
    pub allow_detecting_direction: bool,
}

/// What one tick did
#[derive(Debug, Default)]
pub struct TickReport {
    /// False when the tick was skipped: the source had no frame, or the
    /// pacing interval had not elapsed yet
    pub processed: bool,
    /// A face was found in the frame
    pub face_detected: bool,
    /// Directions that drove the pointer this tick
    pub directions: Directions,
    /// A blink completed and clicked
    pub clicked: bool,
    /// A pending command's delay elapsed and it executed
    pub command_fired: bool,
    /// The mirrored working frame, when requested
    pub frame: Option<RgbImage>,
}

/// Per-tick engine: read, pace, detect, estimate, act
pub struct ProcessLoop {
    source: Box<dyn FrameSource>,
    detector: Box<dyn MarkDetector>,
    controller: CursorController,
    blink: BlinkDetector,
    classifier: DirectionClassifier,
    estimator: Option<PoseEstimator>,
    last_frame: Option<Instant>,
    frame_interval: Duration,
}

impl ProcessLoop {
    /// Assemble the loop from its source, detector and controller
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn MarkDetector>,
        controller: CursorController,
        settings: &ThresholdConfig,
    ) -> Self {
        info!("Starting process loop at up to {MAX_FRAME_RATE} frames per second");
        Self {
            source,
            detector,
            controller,
            blink: BlinkDetector::new(settings),
            classifier: DirectionClassifier::new(settings),
            estimator: None,
            last_frame: None,
            frame_interval: Duration::from_secs_f64(1.0 / MAX_FRAME_RATE),
        }
    }

    /// Replace the pacing interval; `Duration::ZERO` disables pacing
    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Working-frame geometry latched from the first processed frame
    #[must_use]
    pub fn geometry(&self) -> Option<&FrameGeometry> {
        self.estimator.as_ref().map(PoseEstimator::geometry)
    }

    /// Process at most one frame.
    ///
    /// A queued command is registered before anything else, so it is
    /// never lost to a skipped tick; its delay only advances on ticks
    /// where a face is seen. Skipped ticks return a default report with
    /// `processed` false.
    ///
    /// # Errors
    ///
    /// Returns an error when the detector fails or the pointer surface
    /// rejects an action. A failed pose solve is not an error; the tick
    /// simply produces no direction.
    pub fn tick(&mut self, input: TickInput) -> Result<TickReport> {
        if let Some(command) = input.command {
            self.controller.add_command(command);
        }

        let Some(frame) = self.source.read() else {
            return Ok(TickReport::default());
        };

        let now = Instant::now();
        if let Some(last) = self.last_frame {
            if now.duration_since(last) < self.frame_interval {
                return Ok(TickReport::default());
            }
        }
        self.last_frame = Some(now);

        let estimator = self.estimator.get_or_insert_with(|| {
            PoseEstimator::new(FrameGeometry::from_capture(frame.width(), frame.height()))
        });
        let working = prepare_frame(&frame, estimator.geometry());

        let mut report = TickReport {
            processed: true,
            ..TickReport::default()
        };

        match self.detector.detect(&working)? {
            Some(landmarks) => {
                report.face_detected = true;

                if input.allow_detecting_direction {
                    match estimator.estimate(&landmarks) {
                        Ok(angles) => {
                            let directions = self.classifier.classify(angles);
                            self.controller.move_by(directions)?;
                            report.directions = directions;
                        }
                        Err(e) => debug!("Pose solve failed this tick: {e}"),
                    }
                }

                if let Some(ear) = eye_aspect_ratio(&landmarks, estimator.geometry()) {
                    if self.blink.update(ear) {
                        self.controller.click()?;
                        report.clicked = true;
                    }
                }

                report.command_fired = self.controller.tick_command()?;
            }
            None => debug!("No face detected this tick"),
        }

        if input.allow_showing_frame {
            report.frame = Some(working);
        }
        Ok(report)
    }
}
