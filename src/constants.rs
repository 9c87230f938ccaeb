//! Constants used throughout the application

/// Number of facial landmarks the detection service must supply
pub const NUM_FACE_LANDMARKS: usize = 468;

/// Maximum width of the working frame; larger captures are downscaled
pub const WORKING_FRAME_WIDTH: u32 = 480;

/// Upper bound on processed frames per second
pub const MAX_FRAME_RATE: f64 = 60.0;

/// Camera matrix center factor (principal point = dimension / factor)
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

/// Rescales RQ-decomposition angles onto the threshold scale
pub const POSE_ANGLE_SCALE: f64 = 360.0;

/// Hysteresis band for the direction classifier, in threshold-scale units
pub const HYSTERESIS_MARGIN: f64 = 3.0;

/// Ticks a pending command must survive before it executes
pub const COMMAND_DELAY_TICKS: u32 = 30;

/// EAR samples collected per calibration phase
pub const CALIBRATION_MIN_SAMPLES: usize = 160;

/// Guide-only frames at the start of each calibration phase
pub const CALIBRATION_IGNORE_FRAMES: u32 = 10;

/// Minimum fraction of samples a phase must retain after outlier rejection
pub const CALIBRATION_QUALITY_RATIO: f64 = 0.6;

/// Weights blending the closed-eye and open-eye phase means
pub const CALIBRATION_CLOSED_WEIGHT: f64 = 0.4;
pub const CALIBRATION_OPEN_WEIGHT: f64 = 0.6;

/// Scroll magnitude divisor on macOS
pub const MACOS_SCROLL_DIVISOR: f64 = 50.0;

/// Default persisted threshold vector, in settings-file order
pub const DEFAULT_SETTINGS: [f64; 8] = [5.0, 0.2, 10.0, -10.0, -10.0, 10.0, 20.0, 500.0];

/// Default settings file name
pub const SETTINGS_FILE: &str = "settings.bin";

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
