//! X11 implementation of the pointer surface.
//!
//! Pointer position and movement go through the core protocol
//! (`QueryPointer`, `WarpPointer`); clicks, scrolling and hotkeys are
//! synthesized with the XTest extension so they reach whichever window
//! has focus. The keyboard mapping is fetched once at connection time and
//! scanned to turn keysyms into keycodes.

use log::{debug, info};
use x11rb::{
    connection::Connection,
    protocol::xproto::{
        ConnectionExt, Screen, BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT, KEY_PRESS_EVENT,
        KEY_RELEASE_EVENT,
    },
    protocol::xtest::ConnectionExt as XTestConnectionExt,
    rust_connection::RustConnection,
};

use crate::cursor_control::{Modifier, PointerSurface};
use crate::{Error, Result};

const LEFT_BUTTON: u8 = 1;
const WHEEL_UP_BUTTON: u8 = 4;
const WHEEL_DOWN_BUTTON: u8 = 5;

const XK_SHIFT_L: u32 = 0xffe1;
const XK_CONTROL_L: u32 = 0xffe3;
const XK_SUPER_L: u32 = 0xffeb;

/// Pointer surface backed by an X11 display
pub struct X11PointerSurface {
    connection: RustConnection,
    screen: Screen,
    screen_width: u16,
    screen_height: u16,
    min_keycode: u8,
    keysyms_per_keycode: u8,
    keymap: Vec<u32>,
}

impl X11PointerSurface {
    /// Connect to the default X11 display.
    ///
    /// # Errors
    ///
    /// Returns an error when the display cannot be reached or the
    /// keyboard mapping cannot be fetched.
    pub fn new() -> Result<Self> {
        info!("Connecting to X11 display");

        let (connection, screen_num) = RustConnection::connect(None)
            .map_err(|e| Error::CursorControl(format!("Failed to connect to X11: {e}")))?;

        let screen = connection
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| Error::CursorControl("Failed to get screen".to_string()))?
            .clone();
        let screen_width = screen.width_in_pixels;
        let screen_height = screen.height_in_pixels;

        let min_keycode = connection.setup().min_keycode;
        let max_keycode = connection.setup().max_keycode;
        let mapping = connection
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)
            .map_err(|e| {
                Error::CursorControl(format!("Failed to send keyboard mapping request: {e}"))
            })?
            .reply()
            .map_err(|e| Error::CursorControl(format!("Failed to fetch keyboard mapping: {e}")))?;

        info!(
            "Connected to X11 display, screen: {}x{}",
            screen_width, screen_height
        );

        Ok(Self {
            connection,
            screen,
            screen_width,
            screen_height,
            min_keycode,
            keysyms_per_keycode: mapping.keysyms_per_keycode,
            keymap: mapping.keysyms,
        })
    }

    fn flush(&self) -> Result<()> {
        self.connection
            .flush()
            .map_err(|e| Error::CursorControl(format!("Failed to flush connection: {e}")))?;
        Ok(())
    }

    fn fake_input(&self, event_type: u8, detail: u8) -> Result<()> {
        self.connection
            .xtest_fake_input(
                event_type,
                detail,
                x11rb::CURRENT_TIME,
                self.screen.root,
                0,
                0,
                0,
            )
            .map_err(|e| Error::CursorControl(format!("Failed to send input event: {e}")))?;
        Ok(())
    }

    fn fake_button(&self, button: u8) -> Result<()> {
        self.fake_input(BUTTON_PRESS_EVENT, button)?;
        self.fake_input(BUTTON_RELEASE_EVENT, button)
    }

    fn fake_key(&self, keycode: u8, press: bool) -> Result<()> {
        let event_type = if press {
            KEY_PRESS_EVENT
        } else {
            KEY_RELEASE_EVENT
        };
        self.fake_input(event_type, keycode)
    }

    /// Locate the keycode producing a keysym, and whether it needs Shift.
    ///
    /// Keysym rows were fetched at connection time; odd columns in a row
    /// hold the shifted level of the key.
    fn find_keycode(&self, keysym: u32) -> Result<(u8, bool)> {
        let per = usize::from(self.keysyms_per_keycode);
        if per == 0 {
            return Err(Error::CursorControl("empty keyboard mapping".to_string()));
        }
        for (offset, row) in self.keymap.chunks(per).enumerate() {
            for (column, &sym) in row.iter().enumerate() {
                if sym == keysym {
                    return Ok((self.min_keycode + offset as u8, column % 2 == 1));
                }
            }
        }
        Err(Error::CursorControl(format!(
            "no keycode produces keysym {keysym:#06x}"
        )))
    }
}

impl PointerSurface for X11PointerSurface {
    fn position(&self) -> Result<(i32, i32)> {
        let reply = self
            .connection
            .query_pointer(self.screen.root)
            .map_err(|e| Error::CursorControl(format!("Failed to send query pointer: {e}")))?
            .reply()
            .map_err(|e| Error::CursorControl(format!("Failed to query pointer: {e}")))?;
        Ok((i32::from(reply.root_x), i32::from(reply.root_y)))
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        // Clamp to screen bounds
        let max_x = i32::from(self.screen_width.saturating_sub(1));
        let max_y = i32::from(self.screen_height.saturating_sub(1));
        let x = i16::try_from(x.clamp(0, max_x)).unwrap_or(i16::MAX);
        let y = i16::try_from(y.clamp(0, max_y)).unwrap_or(i16::MAX);

        debug!("Warping pointer to ({}, {})", x, y);

        self.connection
            .warp_pointer(x11rb::NONE, self.screen.root, 0, 0, 0, 0, x, y)
            .map_err(|e| Error::CursorControl(format!("Failed to warp pointer: {e}")))?;
        self.flush()
    }

    fn click(&mut self) -> Result<()> {
        self.fake_button(LEFT_BUTTON)?;
        self.flush()
    }

    fn double_click(&mut self) -> Result<()> {
        self.fake_button(LEFT_BUTTON)?;
        self.fake_button(LEFT_BUTTON)?;
        self.flush()
    }

    fn scroll(&mut self, amount: i32) -> Result<()> {
        let button = if amount >= 0 {
            WHEEL_UP_BUTTON
        } else {
            WHEEL_DOWN_BUTTON
        };
        for _ in 0..amount.unsigned_abs() {
            self.fake_button(button)?;
        }
        self.flush()
    }

    fn hotkey(&mut self, modifier: Modifier, key: char) -> Result<()> {
        let (modifier_code, _) = self.find_keycode(modifier_keysym(modifier))?;
        let (key_code, needs_shift) = self.find_keycode(char_keysym(key)?)?;
        let shift_code = if needs_shift {
            Some(self.find_keycode(XK_SHIFT_L)?.0)
        } else {
            None
        };

        self.fake_key(modifier_code, true)?;
        if let Some(shift) = shift_code {
            self.fake_key(shift, true)?;
        }
        self.fake_key(key_code, true)?;
        self.fake_key(key_code, false)?;
        if let Some(shift) = shift_code {
            self.fake_key(shift, false)?;
        }
        self.fake_key(modifier_code, false)?;
        self.flush()
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        Ok((u32::from(self.screen_width), u32::from(self.screen_height)))
    }
}

fn modifier_keysym(modifier: Modifier) -> u32 {
    match modifier {
        Modifier::Control => XK_CONTROL_L,
        // Super is the closest X11 analogue of the macOS Command key
        Modifier::Command => XK_SUPER_L,
    }
}

/// Latin-1 characters map directly onto their keysym value
fn char_keysym(key: char) -> Result<u32> {
    let code = u32::from(key);
    if (0x20..=0xff).contains(&code) {
        Ok(code)
    } else {
        Err(Error::CursorControl(format!(
            "unsupported hotkey character: {key:?}"
        )))
    }
}
