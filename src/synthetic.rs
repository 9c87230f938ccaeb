//! Synthetic faces and in-memory backends for tests and the simulator.
//!
//! Nothing in this module touches a camera, a landmark model, or a
//! display. [`build_face`] places the pose-reference landmarks in a fixed
//! layout whose eye openings produce a requested eye aspect ratio;
//! [`StaticCapture`] and [`ScriptedEyes`] stand in for the capture device
//! and the landmark detector; [`VirtualPointer`] records every pointer
//! action behind a shared handle for later inspection.

use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbImage;
use nalgebra::Point3;

use crate::constants::NUM_FACE_LANDMARKS;
use crate::cursor_control::{Modifier, PointerSurface};
use crate::detection::{FrameGeometry, FrameSource, LandmarkSet, MarkDetector};
use crate::{Error, Result};

/// Vertical position of the nose tip; depth ramps away from this line
const NOSE_LINE: f64 = 0.52;
/// Vertical position of both eye corner rows
const EYE_LINE: f64 = 0.40;
/// Horizontal extent of each eye, in normalized frame widths
const EYE_SPAN: f64 = 0.08;

/// Parameters of a synthetically generated face
#[derive(Debug, Clone, Copy)]
pub struct SyntheticFace {
    /// Eye aspect ratio both eyes will produce
    pub ear: f64,
    /// Depth slope along the vertical face axis; zero keeps every
    /// landmark in the camera plane, which makes the recovered pose
    /// angles exactly zero
    pub depth_tilt: f64,
}

impl Default for SyntheticFace {
    fn default() -> Self {
        Self {
            ear: 0.3,
            depth_tilt: 0.0,
        }
    }
}

fn place(points: &mut [Point3<f32>], index: usize, x: f64, y: f64, tilt: f64) {
    let z = tilt * (y - NOSE_LINE);
    points[index] = Point3::new(x as f32, y as f32, z as f32);
}

/// Build a full landmark set for a synthetic face.
///
/// # Errors
///
/// Propagates the landmark-count check; the fixed layout always passes it.
pub fn build_face(geometry: &FrameGeometry, face: &SyntheticFace) -> Result<LandmarkSet> {
    let mut points = vec![Point3::new(0.5f32, 0.5, 0.0); NUM_FACE_LANDMARKS];
    let tilt = face.depth_tilt;

    // Pose reference landmarks: nose tip, outer eye corners, mouth
    // corners, chin
    place(&mut points, 1, 0.50, NOSE_LINE, tilt);
    place(&mut points, 33, 0.36, EYE_LINE, tilt);
    place(&mut points, 263, 0.64, EYE_LINE, tilt);
    place(&mut points, 61, 0.42, 0.70, tilt);
    place(&mut points, 291, 0.58, 0.70, tilt);
    place(&mut points, 199, 0.50, 0.88, tilt);

    // Inner eye corners and lids, with the vertical gap chosen so each
    // eye's aspect ratio equals the requested value
    place(&mut points, 133, 0.44, EYE_LINE, tilt);
    place(&mut points, 362, 0.56, EYE_LINE, tilt);
    let gap = face.ear * EYE_SPAN * f64::from(geometry.width) / f64::from(geometry.height);
    let lid_columns = [(160, 144, 0.38), (158, 153, 0.42), (385, 380, 0.58), (387, 373, 0.62)];
    for (upper, lower, x) in lid_columns {
        place(&mut points, upper, x, EYE_LINE - gap / 2.0, tilt);
        place(&mut points, lower, x, EYE_LINE + gap / 2.0, tilt);
    }

    LandmarkSet::new(points)
}

/// Frame source yielding identical blank frames
pub struct StaticCapture {
    width: u32,
    height: u32,
    remaining: Option<usize>,
}

impl StaticCapture {
    /// Unlimited source of `width` by `height` frames
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            remaining: None,
        }
    }

    /// Source that runs dry after `count` frames
    #[must_use]
    pub fn limited(width: u32, height: u32, count: usize) -> Self {
        Self {
            width,
            height,
            remaining: Some(count),
        }
    }
}

impl FrameSource for StaticCapture {
    fn read(&mut self) -> Option<RgbImage> {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        Some(RgbImage::new(self.width, self.height))
    }
}

/// Mark detector replaying a script of eye aspect ratios.
///
/// Each `Some` entry produces a synthetic face with that ratio, each
/// `None` a frame with no detectable face. The script repeats from the
/// start once exhausted, so a short pattern can drive an arbitrarily long
/// run.
pub struct ScriptedEyes {
    script: Vec<Option<f64>>,
    cursor: usize,
    depth_tilt: f64,
}

impl ScriptedEyes {
    #[must_use]
    pub fn new(script: Vec<Option<f64>>) -> Self {
        Self {
            script,
            cursor: 0,
            depth_tilt: 0.0,
        }
    }

    /// Give the scripted faces a depth profile, making the recovered
    /// pose angles non-trivial
    #[must_use]
    pub fn with_depth_tilt(mut self, depth_tilt: f64) -> Self {
        self.depth_tilt = depth_tilt;
        self
    }
}

impl MarkDetector for ScriptedEyes {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>> {
        if self.script.is_empty() {
            return Ok(None);
        }
        let entry = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        match entry {
            Some(ear) => {
                let geometry = FrameGeometry {
                    width: frame.width(),
                    height: frame.height(),
                };
                let face = SyntheticFace {
                    ear,
                    depth_tilt: self.depth_tilt,
                };
                Ok(Some(build_face(&geometry, &face)?))
            }
            None => Ok(None),
        }
    }
}

/// One observable action on the virtual pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    MovedTo(i32, i32),
    Click,
    DoubleClick,
    Scroll(i32),
    Hotkey(Modifier, char),
}

/// Observable state of a [`VirtualPointer`]
#[derive(Debug)]
pub struct PointerState {
    pub x: i32,
    pub y: i32,
    pub screen: (u32, u32),
    pub events: Vec<PointerEvent>,
}

/// In-memory pointer surface.
///
/// State lives behind a shared handle so it stays inspectable after the
/// surface has been boxed into a controller.
pub struct VirtualPointer {
    state: Arc<Mutex<PointerState>>,
}

impl VirtualPointer {
    /// Pointer centered on a screen of the given size
    #[must_use]
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(PointerState {
                x: (screen_width / 2) as i32,
                y: (screen_height / 2) as i32,
                screen: (screen_width, screen_height),
                events: Vec::new(),
            })),
        }
    }

    /// Handle for inspecting the pointer after it has been boxed
    #[must_use]
    pub fn state(&self) -> Arc<Mutex<PointerState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PointerState>> {
        self.state
            .lock()
            .map_err(|_| Error::CursorControl("virtual pointer state poisoned".to_string()))
    }
}

impl PointerSurface for VirtualPointer {
    fn position(&self) -> Result<(i32, i32)> {
        let state = self.lock()?;
        Ok((state.x, state.y))
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        let mut state = self.lock()?;
        state.x = x;
        state.y = y;
        state.events.push(PointerEvent::MovedTo(x, y));
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        self.lock()?.events.push(PointerEvent::Click);
        Ok(())
    }

    fn double_click(&mut self) -> Result<()> {
        self.lock()?.events.push(PointerEvent::DoubleClick);
        Ok(())
    }

    fn scroll(&mut self, amount: i32) -> Result<()> {
        self.lock()?.events.push(PointerEvent::Scroll(amount));
        Ok(())
    }

    fn hotkey(&mut self, modifier: Modifier, key: char) -> Result<()> {
        self.lock()?.events.push(PointerEvent::Hotkey(modifier, key));
        Ok(())
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        Ok(self.lock()?.screen)
    }
}
