//! Persisted threshold settings for the pointer control engine.
//!
//! Settings are stored as a flat, fixed-order vector of 8 little-endian
//! `f64` values: [blink-frame-threshold, EAR-threshold, up, left, down,
//! right, cursor-sensitivity, scroll-sensitivity]. A missing, short, or
//! otherwise invalid file yields the documented defaults wholesale; partial
//! overrides are not supported.

use crate::{constants::DEFAULT_SETTINGS, Error, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Number of scalars in the persisted vector
pub const SETTINGS_LEN: usize = 8;

/// Size of the persisted vector in bytes
pub const SETTINGS_BYTE_LEN: usize = SETTINGS_LEN * 8;

/// Calibrated thresholds, loaded once at startup and passed by reference
/// to each component. Immutable during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    /// Consecutive low-EAR frames required before a blink fires (integer >= 1)
    pub blink_frame_threshold: f64,

    /// Eye-aspect-ratio at or below which an eye counts as closed, in (0, 1)
    pub ear_threshold: f64,

    /// Pitch above which the head counts as turned up (positive)
    pub up_threshold: f64,

    /// Yaw below which the head counts as turned left (negative)
    pub left_threshold: f64,

    /// Pitch below which the head counts as turned down (negative)
    pub down_threshold: f64,

    /// Yaw above which the head counts as turned right (positive)
    pub right_threshold: f64,

    /// Pointer displacement per emitted direction, in pixels
    pub cursor_sensitivity: f64,

    /// Scroll magnitude before platform adjustment
    pub scroll_sensitivity: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::from_vector(DEFAULT_SETTINGS)
    }
}

impl ThresholdConfig {
    /// Build a config from the fixed-order settings vector
    #[must_use]
    pub fn from_vector(values: [f64; SETTINGS_LEN]) -> Self {
        Self {
            blink_frame_threshold: values[0],
            ear_threshold: values[1],
            up_threshold: values[2],
            left_threshold: values[3],
            down_threshold: values[4],
            right_threshold: values[5],
            cursor_sensitivity: values[6],
            scroll_sensitivity: values[7],
        }
    }

    /// Export the config as the fixed-order settings vector
    #[must_use]
    pub fn to_vector(&self) -> [f64; SETTINGS_LEN] {
        [
            self.blink_frame_threshold,
            self.ear_threshold,
            self.up_threshold,
            self.left_threshold,
            self.down_threshold,
            self.right_threshold,
            self.cursor_sensitivity,
            self.scroll_sensitivity,
        ]
    }

    /// Load settings from a file, falling back to defaults wholesale if the
    /// file is missing, the wrong size, or fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Settings file {} not found, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read settings file {}: {e}. Using defaults.", path.display());
                return Self::default();
            }
        };

        if bytes.len() != SETTINGS_BYTE_LEN {
            warn!(
                "Settings file {} has {} bytes, expected {}. Using defaults.",
                path.display(),
                bytes.len(),
                SETTINGS_BYTE_LEN
            );
            return Self::default();
        }

        let mut values = [0.0; SETTINGS_LEN];
        for (i, value) in values.iter_mut().enumerate() {
            *value = LittleEndian::read_f64(&bytes[i * 8..]);
        }

        let config = Self::from_vector(values);
        if let Err(e) = config.validate() {
            warn!("Settings file {} is invalid: {e}. Using defaults.", path.display());
            return Self::default();
        }

        config
    }

    /// Save the settings vector to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut buf = Vec::with_capacity(SETTINGS_BYTE_LEN);
        for value in self.to_vector() {
            buf.write_f64::<LittleEndian>(value)?;
        }
        fs::write(path, &buf)?;
        Ok(())
    }

    /// Validate all 8 scalars against their documented ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first threshold that is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.to_vector().iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput("settings must be finite".to_string()));
        }
        if self.blink_frame_threshold < 1.0 {
            return Err(Error::InvalidInput(
                "blink frame threshold must be at least 1".to_string(),
            ));
        }
        if self.ear_threshold <= 0.0 || self.ear_threshold >= 1.0 {
            return Err(Error::InvalidInput(
                "EAR threshold must be between 0 and 1".to_string(),
            ));
        }
        if self.up_threshold <= 0.0 || self.right_threshold <= 0.0 {
            return Err(Error::InvalidInput(
                "up and right thresholds must be positive".to_string(),
            ));
        }
        if self.left_threshold >= 0.0 || self.down_threshold >= 0.0 {
            return Err(Error::InvalidInput(
                "left and down thresholds must be negative".to_string(),
            ));
        }
        if self.cursor_sensitivity <= 0.0 || self.scroll_sensitivity <= 0.0 {
            return Err(Error::InvalidInput(
                "sensitivities must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Blink frame threshold as a whole frame count
    #[must_use]
    pub fn blink_frames(&self) -> u32 {
        self.blink_frame_threshold as u32
    }

    /// Cursor sensitivity as a whole pixel step
    #[must_use]
    pub fn cursor_step(&self) -> i32 {
        self.cursor_sensitivity as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("headmouse_{}_{}.bin", std::process::id(), name))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ThresholdConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.to_vector(), DEFAULT_SETTINGS);
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let path = temp_path("roundtrip");
        let config = ThresholdConfig::from_vector([7.0, 0.23, 12.5, -8.25, -11.0, 9.75, 18.0, 450.0]);
        config.save(&path).unwrap();

        let reloaded = ThresholdConfig::load(&path);
        for (saved, loaded) in config.to_vector().iter().zip(reloaded.to_vector().iter()) {
            assert_eq!(saved.to_bits(), loaded.to_bits());
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        assert_eq!(ThresholdConfig::load(&path), ThresholdConfig::default());
    }

    #[test]
    fn test_short_file_yields_defaults() {
        let path = temp_path("short");
        std::fs::write(&path, [0u8; 24]).unwrap();
        assert_eq!(ThresholdConfig::load(&path), ThresholdConfig::default());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_invalid_values_yield_defaults() {
        // left threshold must be negative
        let path = temp_path("invalid");
        let bad = ThresholdConfig::from_vector([5.0, 0.2, 10.0, 10.0, -10.0, 10.0, 20.0, 500.0]);
        bad.save(&path).unwrap();
        assert_eq!(ThresholdConfig::load(&path), ThresholdConfig::default());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = ThresholdConfig {
            ear_threshold: 1.0,
            ..ThresholdConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ThresholdConfig {
            blink_frame_threshold: 0.0,
            ..ThresholdConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ThresholdConfig {
            scroll_sensitivity: f64::NAN,
            ..ThresholdConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_integer_accessors_truncate() {
        let config = ThresholdConfig::from_vector([5.9, 0.2, 10.0, -10.0, -10.0, 10.0, 20.7, 500.0]);
        assert_eq!(config.blink_frames(), 5);
        assert_eq!(config.cursor_step(), 20);
    }
}
