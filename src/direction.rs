//! Direction classification from head pose angles.
//!
//! Pitch and yaw are compared against the configured thresholds, with an
//! overshoot filter on each axis: when the head swings back across center
//! after a gesture, the rebound briefly crosses the opposite threshold and
//! would register as a spurious move. A tick whose angle changed sign while
//! losing more than the hysteresis margin of magnitude is ignored.

use crate::constants::HYSTERESIS_MARGIN;
use crate::pose_estimation::PoseAngles;
use crate::settings::ThresholdConfig;

/// Vertical movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vertical {
    /// Head tilted up
    Up,
    /// Head tilted down
    Down,
}

/// Horizontal movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizontal {
    /// Head turned left
    Left,
    /// Head turned right
    Right,
}

/// Per-axis classification outcome for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Directions {
    pub vertical: Option<Vertical>,
    pub horizontal: Option<Horizontal>,
}

impl Directions {
    /// True when neither axis produced a direction
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertical.is_none() && self.horizontal.is_none()
    }
}

/// Stateful classifier mapping pose angles to movement directions.
///
/// Keeps the previous tick's pitch and yaw so the overshoot filter can
/// compare consecutive ticks.
pub struct DirectionClassifier {
    up_threshold: f64,
    down_threshold: f64,
    left_threshold: f64,
    right_threshold: f64,
    previous_pitch: f64,
    previous_yaw: f64,
}

impl DirectionClassifier {
    /// Create a classifier with thresholds taken from the settings
    #[must_use]
    pub fn new(settings: &ThresholdConfig) -> Self {
        Self {
            up_threshold: settings.up_threshold,
            down_threshold: settings.down_threshold,
            left_threshold: settings.left_threshold,
            right_threshold: settings.right_threshold,
            previous_pitch: 0.0,
            previous_yaw: 0.0,
        }
    }

    /// Classify one tick's angles.
    ///
    /// History is updated on every call, including ticks where nothing
    /// fires, so the overshoot filter always compares adjacent ticks.
    pub fn classify(&mut self, angles: PoseAngles) -> Directions {
        let moved_vertically = moved_toward_threshold(angles.pitch, self.previous_pitch);
        let moved_horizontally = moved_toward_threshold(angles.yaw, self.previous_yaw);

        let vertical = if angles.pitch > self.up_threshold && moved_vertically {
            Some(Vertical::Up)
        } else if angles.pitch < self.down_threshold && moved_vertically {
            Some(Vertical::Down)
        } else {
            None
        };
        let horizontal = if angles.yaw < self.left_threshold && moved_horizontally {
            Some(Horizontal::Left)
        } else if angles.yaw > self.right_threshold && moved_horizontally {
            Some(Horizontal::Right)
        } else {
            None
        };

        self.previous_pitch = angles.pitch;
        self.previous_yaw = angles.yaw;

        Directions {
            vertical,
            horizontal,
        }
    }
}

/// A tick counts as deliberate movement unless the angle changed sign and
/// lost more than the hysteresis margin of magnitude since the previous
/// tick; that combination is the rebound of a return move, not a gesture.
fn moved_toward_threshold(current: f64, previous: f64) -> bool {
    let same_side = current == 0.0 || previous == 0.0 || (current > 0.0) == (previous > 0.0);
    same_side || current.abs() >= previous.abs() - HYSTERESIS_MARGIN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angles(pitch: f64, yaw: f64) -> PoseAngles {
        PoseAngles {
            pitch,
            yaw,
            roll: 0.0,
        }
    }

    #[test]
    fn test_neutral_pose_gives_no_direction() {
        let mut classifier = DirectionClassifier::new(&ThresholdConfig::default());
        assert!(classifier.classify(angles(0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_vertical_thresholds_are_strict() {
        let mut classifier = DirectionClassifier::new(&ThresholdConfig::default());
        assert_eq!(classifier.classify(angles(14.0, 0.0)).vertical, Some(Vertical::Up));
        assert_eq!(classifier.classify(angles(10.0, 0.0)).vertical, None);
        assert_eq!(classifier.classify(angles(-14.0, 0.0)).vertical, Some(Vertical::Down));
        assert_eq!(classifier.classify(angles(-10.0, 0.0)).vertical, None);
    }

    #[test]
    fn test_horizontal_thresholds_are_strict() {
        let mut classifier = DirectionClassifier::new(&ThresholdConfig::default());
        assert_eq!(
            classifier.classify(angles(0.0, -14.0)).horizontal,
            Some(Horizontal::Left)
        );
        assert_eq!(classifier.classify(angles(0.0, -10.0)).horizontal, None);
        assert_eq!(
            classifier.classify(angles(0.0, 14.0)).horizontal,
            Some(Horizontal::Right)
        );
        assert_eq!(classifier.classify(angles(0.0, 10.0)).horizontal, None);
    }

    #[test]
    fn test_both_axes_fire_on_one_tick() {
        let mut classifier = DirectionClassifier::new(&ThresholdConfig::default());
        let result = classifier.classify(angles(14.0, 14.0));
        assert_eq!(result.vertical, Some(Vertical::Up));
        assert_eq!(result.horizontal, Some(Horizontal::Right));
        assert!(!result.is_empty());
    }

    #[test]
    fn test_overshoot_predicate() {
        // Sign change with a large magnitude drop is a rebound
        assert!(!moved_toward_threshold(5.0, -10.0));
        // Keeping most of the magnitude across the sign change is a gesture
        assert!(moved_toward_threshold(8.0, -10.0));
        // Exactly at the margin still counts
        assert!(moved_toward_threshold(7.0, -10.0));
        // Small wobbles around zero are never suppressed
        assert!(moved_toward_threshold(-1.0, 2.0));
        // Same side is always movement, even with a magnitude drop
        assert!(moved_toward_threshold(4.0, 15.0));
        // A zero on either side counts as movement
        assert!(moved_toward_threshold(0.0, -10.0));
        assert!(moved_toward_threshold(14.0, 0.0));
    }

    #[test]
    fn test_return_overshoot_is_suppressed() {
        let settings = ThresholdConfig {
            up_threshold: 4.0,
            ..ThresholdConfig::default()
        };

        let mut classifier = DirectionClassifier::new(&settings);
        assert_eq!(
            classifier.classify(angles(-12.0, 0.0)).vertical,
            Some(Vertical::Down)
        );
        // Rebound past center: above the 4.0 threshold but suppressed
        assert_eq!(classifier.classify(angles(5.0, 0.0)).vertical, None);
        // The suppressed tick still became history, so holding the pose
        // fires on the next tick
        assert_eq!(classifier.classify(angles(5.0, 0.0)).vertical, Some(Vertical::Up));
    }

    #[test]
    fn test_deliberate_swing_is_not_suppressed() {
        let settings = ThresholdConfig {
            up_threshold: 4.0,
            ..ThresholdConfig::default()
        };

        let mut classifier = DirectionClassifier::new(&settings);
        classifier.classify(angles(-12.0, 0.0));
        assert_eq!(classifier.classify(angles(10.0, 0.0)).vertical, Some(Vertical::Up));
    }
}
