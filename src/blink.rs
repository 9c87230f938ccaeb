//! Blink detection from the eye aspect ratio.
//!
//! The eye aspect ratio (EAR) compares the vertical opening of each eye to
//! its horizontal extent, both measured in pixels of the working frame. A
//! blink is reported only after the ratio has stayed at or below the
//! configured threshold for more than the configured number of consecutive
//! ticks, so a single noisy frame never clicks.

use crate::constants::EPSILON;
use crate::detection::{EyeLandmarks, FrameGeometry, LandmarkSet, LEFT_EYE, RIGHT_EYE};
use crate::settings::ThresholdConfig;

/// Eye aspect ratio averaged over both eyes.
///
/// Returns `None` when either eye's horizontal extent degenerates to zero,
/// which only happens on malformed detector output.
#[must_use]
pub fn eye_aspect_ratio(landmarks: &LandmarkSet, geometry: &FrameGeometry) -> Option<f64> {
    let left = single_eye_ratio(landmarks, &LEFT_EYE, geometry)?;
    let right = single_eye_ratio(landmarks, &RIGHT_EYE, geometry)?;
    Some((left + right) / 2.0)
}

fn single_eye_ratio(
    landmarks: &LandmarkSet,
    eye: &EyeLandmarks,
    geometry: &FrameGeometry,
) -> Option<f64> {
    let width = f64::from(geometry.width);
    let height = f64::from(geometry.height);

    let mut vertical_sum = 0.0;
    for &(top, bottom) in &eye.vertical {
        let top_y = f64::from(landmarks.point(top).y);
        let bottom_y = f64::from(landmarks.point(bottom).y);
        vertical_sum += (top_y - bottom_y).abs() * height;
    }

    let (inner, outer) = eye.horizontal;
    let inner_x = f64::from(landmarks.point(inner).x);
    let outer_x = f64::from(landmarks.point(outer).x);
    let horizontal = (inner_x - outer_x).abs() * width;
    if horizontal < EPSILON {
        return None;
    }
    Some(vertical_sum / (2.0 * horizontal))
}

/// Counts consecutive closed-eye ticks and reports completed blinks
pub struct BlinkDetector {
    ear_threshold: f64,
    frame_threshold: u32,
    counter: u32,
}

impl BlinkDetector {
    /// Create a detector with thresholds taken from the settings
    #[must_use]
    pub fn new(settings: &ThresholdConfig) -> Self {
        Self {
            ear_threshold: settings.ear_threshold,
            frame_threshold: settings.blink_frames(),
            counter: 0,
        }
    }

    /// Feed one tick's eye aspect ratio.
    ///
    /// Returns `true` when a blink completes, that is when the ratio has
    /// been at or below the threshold for more than `frame_threshold`
    /// consecutive ticks. Any open-eye tick resets the count.
    pub fn update(&mut self, ear: f64) -> bool {
        if ear <= self.ear_threshold {
            if self.counter >= self.frame_threshold {
                self.counter = 0;
                return true;
            }
            self.counter += 1;
            return false;
        }
        self.counter = 0;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_FACE_LANDMARKS;
    use nalgebra::Point3;

    /// Landmarks with both eyes 0.1 frame-widths wide and the given
    /// normalized vertical gap at each of the four vertical pairs
    fn eye_test_landmarks(gap: f32) -> LandmarkSet {
        let mut points = vec![Point3::new(0.5f32, 0.5, 0.0); NUM_FACE_LANDMARKS];

        points[33] = Point3::new(0.30, 0.5, 0.0);
        points[133] = Point3::new(0.40, 0.5, 0.0);
        points[160] = Point3::new(0.33, 0.5 - gap / 2.0, 0.0);
        points[144] = Point3::new(0.33, 0.5 + gap / 2.0, 0.0);
        points[158] = Point3::new(0.37, 0.5 - gap / 2.0, 0.0);
        points[153] = Point3::new(0.37, 0.5 + gap / 2.0, 0.0);

        points[362] = Point3::new(0.60, 0.5, 0.0);
        points[263] = Point3::new(0.70, 0.5, 0.0);
        points[385] = Point3::new(0.63, 0.5 - gap / 2.0, 0.0);
        points[380] = Point3::new(0.63, 0.5 + gap / 2.0, 0.0);
        points[387] = Point3::new(0.67, 0.5 - gap / 2.0, 0.0);
        points[373] = Point3::new(0.67, 0.5 + gap / 2.0, 0.0);

        LandmarkSet::new(points).unwrap()
    }

    #[test]
    fn test_eye_aspect_ratio_matches_geometry() {
        let geometry = FrameGeometry::from_capture(480, 360);
        // Vertical gap 0.04 * 360 px over horizontal 0.1 * 480 px:
        // (2 * 14.4) / (2 * 48) = 0.3
        let ear = eye_aspect_ratio(&eye_test_landmarks(0.04), &geometry).unwrap();
        assert!((ear - 0.3).abs() < 1e-5, "ear was {ear}");
    }

    #[test]
    fn test_closed_eye_has_lower_ratio_than_open() {
        let geometry = FrameGeometry::from_capture(480, 360);
        let open = eye_aspect_ratio(&eye_test_landmarks(0.04), &geometry).unwrap();
        let closed = eye_aspect_ratio(&eye_test_landmarks(0.01), &geometry).unwrap();
        assert!(closed < open);
    }

    #[test]
    fn test_collapsed_eye_returns_none() {
        let geometry = FrameGeometry::from_capture(480, 360);
        let points = vec![Point3::new(0.5f32, 0.5, 0.0); NUM_FACE_LANDMARKS];
        let landmarks = LandmarkSet::new(points).unwrap();
        assert!(eye_aspect_ratio(&landmarks, &geometry).is_none());
    }

    #[test]
    fn test_blink_fires_after_threshold_consecutive_frames() {
        let mut detector = BlinkDetector::new(&ThresholdConfig::default());
        for _ in 0..5 {
            assert!(!detector.update(0.1));
        }
        // The sixth consecutive closed tick completes the blink
        assert!(detector.update(0.1));
    }

    #[test]
    fn test_open_frame_resets_the_count() {
        let mut detector = BlinkDetector::new(&ThresholdConfig::default());
        for _ in 0..4 {
            assert!(!detector.update(0.1));
        }
        assert!(!detector.update(0.4));
        for _ in 0..5 {
            assert!(!detector.update(0.1));
        }
        assert!(detector.update(0.1));
    }

    #[test]
    fn test_open_eyes_never_fire() {
        let mut detector = BlinkDetector::new(&ThresholdConfig::default());
        for _ in 0..20 {
            assert!(!detector.update(0.35));
        }
    }

    #[test]
    fn test_ratio_at_threshold_counts_as_closed() {
        let mut detector = BlinkDetector::new(&ThresholdConfig::default());
        for _ in 0..5 {
            assert!(!detector.update(0.2));
        }
        assert!(detector.update(0.2));
    }

    #[test]
    fn test_held_closure_fires_repeatedly() {
        let mut detector = BlinkDetector::new(&ThresholdConfig::default());
        let fired: Vec<u32> = (1..=18).filter(|_| detector.update(0.1)).collect();
        assert_eq!(fired, vec![6, 12, 18]);
    }
}
