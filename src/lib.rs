//! Hands-free pointer control from head pose and eye blinks.
//!
//! This library is the signal-processing and control engine behind a
//! camera-driven pointer: it turns per-frame facial landmarks into
//! pointer movement, clicks and GUI commands. The pieces are:
//! 1. Pose estimation recovering pitch/yaw/roll from six reference
//!    landmarks with an iterative `PnP` solve
//! 2. Direction classification with overshoot hysteresis on both axes
//! 3. Blink detection from the eye aspect ratio, debounced over
//!    consecutive frames
//! 4. A cursor controller driving any [`cursor_control::PointerSurface`]
//!    backend, with a tick-based delay on destructive commands
//! 5. Guided two-phase calibration of the blink threshold
//!
//! Frame capture and the landmark model itself stay outside the crate;
//! anything that can produce RGB frames and 468-point landmark sets can
//! drive the engine.
//!
//! # Examples
//!
//! ## Classifying pose angles
//!
//! ```
//! use headmouse::direction::DirectionClassifier;
//! use headmouse::pose_estimation::PoseAngles;
//! use headmouse::settings::ThresholdConfig;
//!
//! let mut classifier = DirectionClassifier::new(&ThresholdConfig::default());
//! let looking_up = PoseAngles {
//!     pitch: 14.0,
//!     yaw: 0.0,
//!     roll: 0.0,
//! };
//! assert!(classifier.classify(looking_up).vertical.is_some());
//! ```
//!
//! ## Running the full loop against in-memory backends
//!
//! ```
//! use headmouse::cursor_control::{CursorController, PlatformCaps};
//! use headmouse::process::{ProcessLoop, TickInput};
//! use headmouse::settings::ThresholdConfig;
//! use headmouse::synthetic::{ScriptedEyes, StaticCapture, VirtualPointer};
//! use std::time::Duration;
//!
//! # fn main() -> headmouse::Result<()> {
//! let settings = ThresholdConfig::default();
//! let controller = CursorController::new(
//!     Box::new(VirtualPointer::new(1920, 1080)),
//!     &settings,
//!     PlatformCaps::native(),
//! );
//! let mut engine = ProcessLoop::new(
//!     Box::new(StaticCapture::new(640, 480)),
//!     Box::new(ScriptedEyes::new(vec![Some(0.05)])),
//!     controller,
//!     &settings,
//! )
//! .with_frame_interval(Duration::ZERO);
//!
//! // Six consecutive closed-eye frames complete a blink and click
//! let mut clicked = false;
//! for _ in 0..6 {
//!     clicked = engine.tick(TickInput::default())?.clicked;
//! }
//! assert!(clicked);
//! # Ok(())
//! # }
//! ```
//!
//! ## Production wiring
//!
//! ```no_run
//! use headmouse::cursor_control::{CursorController, PlatformCaps};
//! use headmouse::settings::ThresholdConfig;
//! use headmouse::x11_pointer::X11PointerSurface;
//!
//! # fn main() -> headmouse::Result<()> {
//! let settings = ThresholdConfig::load("settings.bin");
//! let surface = X11PointerSurface::new()?;
//! let _controller =
//!     CursorController::new(Box::new(surface), &settings, PlatformCaps::native());
//! # Ok(())
//! # }
//! ```

/// Blink detection from the eye aspect ratio
pub mod blink;

/// Guided calibration of the blink threshold
pub mod calibration;

/// Constants used throughout the engine
pub mod constants;

/// Cursor controller and the pointer surface abstraction
pub mod cursor_control;

/// Landmark sets, frame geometry and the capture/detector seams
pub mod detection;

/// Direction classification with overshoot hysteresis
pub mod direction;

/// Error types and result handling
pub mod error;

/// Head pose estimation using a `PnP` solve
pub mod pose_estimation;

/// The per-tick processing loop
pub mod process;

/// Persistent threshold settings
pub mod settings;

/// Synthetic faces and in-memory backends for tests and simulation
pub mod synthetic;

/// X11 pointer surface backed by `XTest`
pub mod x11_pointer;

pub use error::{Error, Result};
