//! Landmark and frame boundary types for the pointer control engine.
//!
//! The landmark-detection service and the frame-capture device are external
//! collaborators; this module defines the traits they implement, the
//! validated landmark collection they produce, and the session frame
//! geometry derived from the first captured frame.

use crate::{
    constants::{CAMERA_CENTER_FACTOR, NUM_FACE_LANDMARKS, WORKING_FRAME_WIDTH},
    Error, Result,
};
use image::{imageops, RgbImage};
use nalgebra::{Matrix3, Point3};

/// Landmark indices used to build the pose object points
pub const POSE_REFERENCE_LANDMARKS: [usize; 6] = [1, 33, 61, 199, 263, 291];

/// Landmark indices describing one eye: two vertical lid pairs and the
/// horizontal corner pair
#[derive(Debug, Clone, Copy)]
pub struct EyeLandmarks {
    /// Upper/lower lid landmark pairs
    pub vertical: [(usize, usize); 2],
    /// Eye corner landmark pair
    pub horizontal: (usize, usize),
}

/// Left eye landmark indices
pub const LEFT_EYE: EyeLandmarks = EyeLandmarks {
    vertical: [(160, 144), (158, 153)],
    horizontal: (33, 133),
};

/// Right eye landmark indices
pub const RIGHT_EYE: EyeLandmarks = EyeLandmarks {
    vertical: [(385, 380), (387, 373)],
    horizontal: (362, 263),
};

/// One frame's facial landmarks: x/y normalized to [0,1] in working-frame
/// space, z a relative depth. Produced fresh each detection and discarded
/// with the tick.
#[derive(Debug, Clone)]
pub struct LandmarkSet {
    points: Vec<Point3<f32>>,
}

impl LandmarkSet {
    /// Create a landmark set, validating the point count.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than [`NUM_FACE_LANDMARKS`] points are
    /// supplied.
    pub fn new(points: Vec<Point3<f32>>) -> Result<Self> {
        if points.len() < NUM_FACE_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected at least {} landmarks, got {}",
                NUM_FACE_LANDMARKS,
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// Landmark at `index`. The fixed index tables in this module are all
    /// valid once construction has checked the point count.
    #[must_use]
    pub fn point(&self, index: usize) -> Point3<f32> {
        self.points[index]
    }

    /// Number of landmarks in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set is empty (never true for a validated set)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Dimensions of the working frame, fixed for a session once the first
/// frame has been captured, plus the synthetic camera model derived from
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Working frame width in pixels
    pub width: u32,
    /// Working frame height in pixels
    pub height: u32,
}

impl FrameGeometry {
    /// Derive the working geometry from a capture's native dimensions.
    /// Wide captures are downscaled to [`WORKING_FRAME_WIDTH`] with the
    /// aspect ratio preserved.
    #[must_use]
    pub fn from_capture(raw_width: u32, raw_height: u32) -> Self {
        if raw_width <= WORKING_FRAME_WIDTH {
            Self {
                width: raw_width,
                height: raw_height,
            }
        } else {
            let height =
                (u64::from(raw_height) * u64::from(WORKING_FRAME_WIDTH) / u64::from(raw_width)) as u32;
            Self {
                width: WORKING_FRAME_WIDTH,
                height,
            }
        }
    }

    /// Synthetic pinhole intrinsics: focal length = frame width, principal
    /// point = frame center.
    #[must_use]
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        let focal_length = f64::from(self.width);
        let center_x = f64::from(self.width) / CAMERA_CENTER_FACTOR;
        let center_y = f64::from(self.height) / CAMERA_CENTER_FACTOR;
        Matrix3::new(
            focal_length, 0.0, center_x, //
            0.0, focal_length, center_y, //
            0.0, 0.0, 1.0,
        )
    }

    /// Lens distortion coefficients (k1, k2, p1, p2); the camera model is
    /// synthetic, so all are zero.
    #[must_use]
    pub fn distortion(&self) -> [f64; 4] {
        [0.0; 4]
    }

    /// Rescale a normalized landmark into pixel coordinates, keeping the
    /// raw depth.
    #[must_use]
    pub fn rescale(&self, point: &Point3<f32>) -> Point3<f64> {
        Point3::new(
            f64::from(point.x) * f64::from(self.width),
            f64::from(point.y) * f64::from(self.height),
            f64::from(point.z),
        )
    }
}

/// Resize a captured frame to the working geometry and mirror it
/// horizontally, so that turning left moves the on-screen face left.
#[must_use]
pub fn prepare_frame(frame: &RgbImage, geometry: &FrameGeometry) -> RgbImage {
    let mut working = if frame.dimensions() == (geometry.width, geometry.height) {
        frame.clone()
    } else {
        imageops::resize(
            frame,
            geometry.width,
            geometry.height,
            imageops::FilterType::Triangle,
        )
    };
    imageops::flip_horizontal_in_place(&mut working);
    working
}

/// Boundary to the frame-capture device
pub trait FrameSource {
    /// The next frame, or `None` if the source has nothing ready
    fn read(&mut self) -> Option<RgbImage>;
}

/// Boundary to the landmark-detection service
pub trait MarkDetector {
    /// Landmarks for the single tracked face, or `None` when no face is
    /// found in the frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the detection service itself fails (as opposed
    /// to finding no face).
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>>;
}
