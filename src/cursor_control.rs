//! Pointer control on top of a pluggable pointer surface.
//!
//! [`CursorController`] turns classified head directions into relative
//! pointer moves, and GUI commands into delayed actions, on whatever
//! [`PointerSurface`] backend it is handed. Production uses the X11
//! surface; tests and the simulator use an in-memory one. Commands are
//! never executed immediately: a pending command waits out a fixed number
//! of ticks so the user can settle (or queue a different command) before
//! anything happens on screen.

use std::fmt;
use std::str::FromStr;

use log::{debug, info};

use crate::constants::{COMMAND_DELAY_TICKS, MACOS_SCROLL_DIVISOR};
use crate::direction::{Directions, Horizontal, Vertical};
use crate::settings::ThresholdConfig;
use crate::{Error, Result};

/// Key sent with the zoom modifier to zoom in
pub const ZOOM_IN_KEY: char = '+';
/// Key sent with the zoom modifier to zoom out
pub const ZOOM_OUT_KEY: char = '-';

/// Deferred commands accepted from the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Zoom in (Ctrl/Cmd + `+`)
    ZoomIn,
    /// Zoom out (Ctrl/Cmd + `-`)
    ZoomOut,
    /// Scroll up by the configured amount
    ScrollUp,
    /// Scroll down by the configured amount
    ScrollDown,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zoom-in" => Ok(Self::ZoomIn),
            "zoom-out" => Ok(Self::ZoomOut),
            "scroll-up" => Ok(Self::ScrollUp),
            "scroll-down" => Ok(Self::ScrollDown),
            other => Err(Error::InvalidInput(format!("unknown command: {other}"))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ZoomIn => "zoom-in",
            Self::ZoomOut => "zoom-out",
            Self::ScrollUp => "scroll-up",
            Self::ScrollDown => "scroll-down",
        };
        write!(f, "{name}")
    }
}

/// Modifier key used for zoom hotkeys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Control key
    Control,
    /// Command key (macOS)
    Command,
}

/// Platform-dependent input behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformCaps {
    /// Divisor applied to the scroll sensitivity setting
    pub scroll_divisor: f64,
    /// Modifier used for zoom hotkeys
    pub zoom_modifier: Modifier,
}

impl PlatformCaps {
    /// Capabilities of the platform this binary was built for
    #[must_use]
    pub fn native() -> Self {
        if cfg!(target_os = "macos") {
            Self {
                scroll_divisor: MACOS_SCROLL_DIVISOR,
                zoom_modifier: Modifier::Command,
            }
        } else {
            Self {
                scroll_divisor: 1.0,
                zoom_modifier: Modifier::Control,
            }
        }
    }
}

/// Backend able to observe and drive the pointer.
///
/// All methods are fallible; implementations report backend failures as
/// [`Error::CursorControl`].
pub trait PointerSurface {
    /// Current pointer position in screen coordinates
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be queried.
    fn position(&self) -> Result<(i32, i32)>;

    /// Move the pointer to an absolute position
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the move.
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;

    /// Left-click at the current position
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the event.
    fn click(&mut self) -> Result<()>;

    /// Double left-click at the current position
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the event.
    fn double_click(&mut self) -> Result<()>;

    /// Scroll by `amount` wheel notches; positive scrolls up
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the event.
    fn scroll(&mut self, amount: i32) -> Result<()>;

    /// Press and release a modifier-plus-key combination
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the event.
    fn hotkey(&mut self, modifier: Modifier, key: char) -> Result<()>;

    /// Full screen size in pixels
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be queried.
    fn screen_size(&self) -> Result<(u32, u32)>;
}

/// Drives a pointer surface from classified directions and GUI commands
pub struct CursorController {
    surface: Box<dyn PointerSurface>,
    move_step: i32,
    scroll_amount: i32,
    zoom_modifier: Modifier,
    pending_command: Option<Command>,
    delay_counter: u32,
}

impl CursorController {
    /// Create a controller over the given surface
    pub fn new(
        surface: Box<dyn PointerSurface>,
        settings: &ThresholdConfig,
        caps: PlatformCaps,
    ) -> Self {
        let scroll_amount = (settings.scroll_sensitivity / caps.scroll_divisor) as i32;
        info!(
            "Initializing cursor controller: step {} px, scroll {} notches",
            settings.cursor_step(),
            scroll_amount
        );
        Self {
            surface,
            move_step: settings.cursor_step(),
            scroll_amount,
            zoom_modifier: caps.zoom_modifier,
            pending_command: None,
            delay_counter: 0,
        }
    }

    /// Move the pointer one step along each classified direction.
    ///
    /// The position is read once, both axes are applied, and the result is
    /// written back as a single move. Ticks with no direction never touch
    /// the surface.
    ///
    /// # Errors
    ///
    /// Returns an error when the surface cannot be read or moved.
    pub fn move_by(&mut self, directions: Directions) -> Result<()> {
        if directions.is_empty() {
            return Ok(());
        }
        let (mut x, mut y) = self.surface.position()?;
        match directions.vertical {
            Some(Vertical::Up) => y -= self.move_step,
            Some(Vertical::Down) => y += self.move_step,
            None => {}
        }
        match directions.horizontal {
            Some(Horizontal::Left) => x -= self.move_step,
            Some(Horizontal::Right) => x += self.move_step,
            None => {}
        }
        debug!("Moving pointer to ({x}, {y})");
        self.surface.move_to(x, y)
    }

    /// Left-click at the current position
    ///
    /// # Errors
    ///
    /// Returns an error when the surface rejects the click.
    pub fn click(&mut self) -> Result<()> {
        self.surface.click()
    }

    /// Queue a command, replacing any pending one and restarting the delay
    pub fn add_command(&mut self, command: Command) {
        debug!("Queued command {command}");
        self.pending_command = Some(command);
        self.delay_counter = 0;
    }

    /// True when a command is queued and still waiting out its delay
    #[must_use]
    pub fn has_pending_command(&self) -> bool {
        self.pending_command.is_some()
    }

    /// Advance the command delay by one tick.
    ///
    /// Returns `true` when the pending command's delay elapsed this tick
    /// and the command was executed. Ticks without a pending command do
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error when executing the command fails; the command is
    /// dropped either way.
    pub fn tick_command(&mut self) -> Result<bool> {
        let Some(command) = self.pending_command else {
            return Ok(false);
        };
        self.delay_counter += 1;
        if self.delay_counter <= COMMAND_DELAY_TICKS {
            return Ok(false);
        }
        self.pending_command = None;
        self.delay_counter = 0;
        self.execute(command)?;
        Ok(true)
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        info!("Executing command {command}");
        // Focus the window under the pointer before acting on it
        self.surface.double_click()?;
        match command {
            Command::ZoomIn => self.surface.hotkey(self.zoom_modifier, ZOOM_IN_KEY),
            Command::ZoomOut => self.surface.hotkey(self.zoom_modifier, ZOOM_OUT_KEY),
            Command::ScrollUp => self.surface.scroll(self.scroll_amount),
            Command::ScrollDown => self.surface.scroll(-self.scroll_amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        MoveTo(i32, i32),
        Click,
        DoubleClick,
        Scroll(i32),
        Hotkey(Modifier, char),
    }

    #[derive(Default)]
    struct MockState {
        position: (i32, i32),
        calls: Vec<Call>,
        fail_position: bool,
    }

    struct MockSurface {
        state: Rc<RefCell<MockState>>,
    }

    impl PointerSurface for MockSurface {
        fn position(&self) -> Result<(i32, i32)> {
            let state = self.state.borrow();
            if state.fail_position {
                return Err(Error::CursorControl("position unavailable".to_string()));
            }
            Ok(state.position)
        }

        fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
            let mut state = self.state.borrow_mut();
            state.position = (x, y);
            state.calls.push(Call::MoveTo(x, y));
            Ok(())
        }

        fn click(&mut self) -> Result<()> {
            self.state.borrow_mut().calls.push(Call::Click);
            Ok(())
        }

        fn double_click(&mut self) -> Result<()> {
            self.state.borrow_mut().calls.push(Call::DoubleClick);
            Ok(())
        }

        fn scroll(&mut self, amount: i32) -> Result<()> {
            self.state.borrow_mut().calls.push(Call::Scroll(amount));
            Ok(())
        }

        fn hotkey(&mut self, modifier: Modifier, key: char) -> Result<()> {
            self.state.borrow_mut().calls.push(Call::Hotkey(modifier, key));
            Ok(())
        }

        fn screen_size(&self) -> Result<(u32, u32)> {
            Ok((1920, 1080))
        }
    }

    fn mock_controller() -> (CursorController, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(MockState {
            position: (100, 100),
            ..MockState::default()
        }));
        let surface = MockSurface {
            state: Rc::clone(&state),
        };
        let caps = PlatformCaps {
            scroll_divisor: 1.0,
            zoom_modifier: Modifier::Control,
        };
        let controller = CursorController::new(Box::new(surface), &ThresholdConfig::default(), caps);
        (controller, state)
    }

    #[test]
    fn test_move_by_applies_both_axes_in_one_move() {
        let (mut controller, state) = mock_controller();
        let directions = Directions {
            vertical: Some(Vertical::Up),
            horizontal: Some(Horizontal::Right),
        };
        controller.move_by(directions).unwrap();
        assert_eq!(state.borrow().calls, vec![Call::MoveTo(120, 80)]);
    }

    #[test]
    fn test_single_axis_moves() {
        let (mut controller, state) = mock_controller();
        controller
            .move_by(Directions {
                vertical: Some(Vertical::Down),
                horizontal: None,
            })
            .unwrap();
        controller
            .move_by(Directions {
                vertical: None,
                horizontal: Some(Horizontal::Left),
            })
            .unwrap();
        assert_eq!(
            state.borrow().calls,
            vec![Call::MoveTo(100, 120), Call::MoveTo(80, 120)]
        );
    }

    #[test]
    fn test_empty_directions_never_touch_the_surface() {
        let (mut controller, state) = mock_controller();
        // Position reads would fail, proving the early return skips them
        state.borrow_mut().fail_position = true;
        controller.move_by(Directions::default()).unwrap();
        assert!(state.borrow().calls.is_empty());
    }

    #[test]
    fn test_surface_errors_propagate() {
        let (mut controller, state) = mock_controller();
        state.borrow_mut().fail_position = true;
        let result = controller.move_by(Directions {
            vertical: Some(Vertical::Up),
            horizontal: None,
        });
        assert!(matches!(result, Err(Error::CursorControl(_))));
    }

    #[test]
    fn test_command_fires_after_the_delay() {
        let (mut controller, state) = mock_controller();
        controller.add_command(Command::ZoomIn);
        for _ in 0..COMMAND_DELAY_TICKS {
            assert!(!controller.tick_command().unwrap());
            assert!(controller.has_pending_command());
        }
        assert!(controller.tick_command().unwrap());
        assert!(!controller.has_pending_command());
        // The double-click focuses the target window before the hotkey
        assert_eq!(
            state.borrow().calls,
            vec![Call::DoubleClick, Call::Hotkey(Modifier::Control, '+')]
        );
    }

    #[test]
    fn test_new_command_replaces_pending_and_restarts_delay() {
        let (mut controller, state) = mock_controller();
        controller.add_command(Command::ZoomIn);
        for _ in 0..20 {
            assert!(!controller.tick_command().unwrap());
        }
        controller.add_command(Command::ScrollUp);
        for _ in 0..COMMAND_DELAY_TICKS {
            assert!(!controller.tick_command().unwrap());
        }
        assert!(controller.tick_command().unwrap());
        assert_eq!(
            state.borrow().calls,
            vec![Call::DoubleClick, Call::Scroll(500)]
        );
    }

    #[test]
    fn test_scroll_down_uses_negative_notches() {
        let (mut controller, state) = mock_controller();
        controller.add_command(Command::ScrollDown);
        for _ in 0..=COMMAND_DELAY_TICKS {
            controller.tick_command().unwrap();
        }
        assert_eq!(
            state.borrow().calls,
            vec![Call::DoubleClick, Call::Scroll(-500)]
        );
    }

    #[test]
    fn test_tick_without_command_is_inert() {
        let (mut controller, state) = mock_controller();
        for _ in 0..40 {
            assert!(!controller.tick_command().unwrap());
        }
        assert!(state.borrow().calls.is_empty());
    }

    #[test]
    fn test_mac_style_caps_divide_scroll_and_use_command_key() {
        let state = Rc::new(RefCell::new(MockState::default()));
        let surface = MockSurface {
            state: Rc::clone(&state),
        };
        let caps = PlatformCaps {
            scroll_divisor: MACOS_SCROLL_DIVISOR,
            zoom_modifier: Modifier::Command,
        };
        let mut controller =
            CursorController::new(Box::new(surface), &ThresholdConfig::default(), caps);

        controller.add_command(Command::ScrollUp);
        for _ in 0..=COMMAND_DELAY_TICKS {
            controller.tick_command().unwrap();
        }
        controller.add_command(Command::ZoomOut);
        for _ in 0..=COMMAND_DELAY_TICKS {
            controller.tick_command().unwrap();
        }
        assert_eq!(
            state.borrow().calls,
            vec![
                Call::DoubleClick,
                Call::Scroll(10),
                Call::DoubleClick,
                Call::Hotkey(Modifier::Command, '-'),
            ]
        );
    }

    #[test]
    fn test_command_parsing_round_trips() {
        for command in [
            Command::ZoomIn,
            Command::ZoomOut,
            Command::ScrollUp,
            Command::ScrollDown,
        ] {
            assert_eq!(command.to_string().parse::<Command>().unwrap(), command);
        }
        assert!(matches!(
            "pinch-zoom".parse::<Command>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_native_caps_are_consistent() {
        let caps = PlatformCaps::native();
        match caps.zoom_modifier {
            Modifier::Command => assert_eq!(caps.scroll_divisor, MACOS_SCROLL_DIVISOR),
            Modifier::Control => assert_eq!(caps.scroll_divisor, 1.0),
        }
    }
}
