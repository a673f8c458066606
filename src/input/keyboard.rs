//! Keyboard bindings for driving the robot.
//!
//! | Key | Press | Release |
//! |-----|-------|---------|
//! | Arrow Up / Down / Left / Right | `FORWARD` / `REVERSE` / `LEFT` / `RIGHT` | `DRIVE_STOP` |
//! | W / S / A / D | `CAM_UP` / `CAM_DOWN` / `CAM_LEFT` / `CAM_RIGHT` | `CAM_STOP` |
//! | R | `CAM_REHOME` | - |
//! | P, Space | `CAM_TAKE_PHOTO` | - |
//! | I / O | `IR_ON` / `IR_OFF` | - |
//! | N / M | `NIGHT_MODE_ON` / `NIGHT_MODE_OFF` | - |
//! | 1 / 2 / 3 | `CAM_MODE_1` / `CAM_MODE_2` / `CAM_MODE_3` | - |
//!
//! # Example
//!
//! ```
//! use rover_link::{Command, Key, KeyboardController};
//!
//! let mut keys = KeyboardController::new();
//! assert_eq!(keys.key_down(Key::ArrowUp), Some(Command::Forward));
//! // Auto-repeat and other keys are ignored while ArrowUp is held
//! assert_eq!(keys.key_down(Key::ArrowUp), None);
//! assert_eq!(keys.key_down(Key::W), None);
//! assert_eq!(keys.key_up(Key::ArrowUp), Some(Command::DriveStop));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::protocol::Command;

// ============================================================================
// Key Enum
// ============================================================================

/// Keys with a robot binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    // ========================================================================
    // Drive
    // ========================================================================
    /// Arrow Up
    ArrowUp,
    /// Arrow Down
    ArrowDown,
    /// Arrow Left
    ArrowLeft,
    /// Arrow Right
    ArrowRight,

    // ========================================================================
    // Camera
    // ========================================================================
    /// W key
    W,
    /// A key
    A,
    /// S key
    S,
    /// D key
    D,
    /// R key
    R,
    /// P key
    P,
    /// Space bar
    Space,

    // ========================================================================
    // Imaging
    // ========================================================================
    /// I key
    I,
    /// O key
    O,
    /// N key
    N,
    /// M key
    M,
    /// Digit 1
    Digit1,
    /// Digit 2
    Digit2,
    /// Digit 3
    Digit3,
}

impl Key {
    /// Every bound key.
    pub const ALL: [Key; 18] = [
        Key::ArrowUp,
        Key::ArrowDown,
        Key::ArrowLeft,
        Key::ArrowRight,
        Key::W,
        Key::A,
        Key::S,
        Key::D,
        Key::R,
        Key::P,
        Key::Space,
        Key::I,
        Key::O,
        Key::N,
        Key::M,
        Key::Digit1,
        Key::Digit2,
        Key::Digit3,
    ];

    /// Returns the key properties: (key, code).
    ///
    /// Letters use the lowercase `key` value.
    #[must_use]
    pub fn properties(self) -> (&'static str, &'static str) {
        match self {
            Key::ArrowUp => ("ArrowUp", "ArrowUp"),
            Key::ArrowDown => ("ArrowDown", "ArrowDown"),
            Key::ArrowLeft => ("ArrowLeft", "ArrowLeft"),
            Key::ArrowRight => ("ArrowRight", "ArrowRight"),
            Key::W => ("w", "KeyW"),
            Key::A => ("a", "KeyA"),
            Key::S => ("s", "KeyS"),
            Key::D => ("d", "KeyD"),
            Key::R => ("r", "KeyR"),
            Key::P => ("p", "KeyP"),
            Key::Space => (" ", "Space"),
            Key::I => ("i", "KeyI"),
            Key::O => ("o", "KeyO"),
            Key::N => ("n", "KeyN"),
            Key::M => ("m", "KeyM"),
            Key::Digit1 => ("1", "Digit1"),
            Key::Digit2 => ("2", "Digit2"),
            Key::Digit3 => ("3", "Digit3"),
        }
    }

    /// Returns the key value string.
    #[inline]
    #[must_use]
    pub fn key(self) -> &'static str {
        self.properties().0
    }

    /// Returns the code string.
    #[inline]
    #[must_use]
    pub fn code(self) -> &'static str {
        self.properties().1
    }

    /// Looks a key up by its key value or code. Letters match either case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| {
            let (value, code) = key.properties();
            name == code || name.eq_ignore_ascii_case(value) || (name == "Spacebar" && *key == Key::Space)
        })
    }

    /// Returns the key's binding.
    #[must_use]
    pub fn binding(self) -> Binding {
        match self {
            Key::ArrowUp => Binding::hold(Command::Forward, Command::DriveStop),
            Key::ArrowDown => Binding::hold(Command::Reverse, Command::DriveStop),
            Key::ArrowLeft => Binding::hold(Command::Left, Command::DriveStop),
            Key::ArrowRight => Binding::hold(Command::Right, Command::DriveStop),
            Key::W => Binding::hold(Command::CamUp, Command::CamStop),
            Key::S => Binding::hold(Command::CamDown, Command::CamStop),
            Key::A => Binding::hold(Command::CamLeft, Command::CamStop),
            Key::D => Binding::hold(Command::CamRight, Command::CamStop),
            Key::R => Binding::tap(Command::CamRehome),
            Key::P | Key::Space => Binding::tap(Command::CamTakePhoto),
            Key::I => Binding::tap(Command::IrOn),
            Key::O => Binding::tap(Command::IrOff),
            Key::N => Binding::tap(Command::NightModeOn),
            Key::M => Binding::tap(Command::NightModeOff),
            Key::Digit1 => Binding::tap(Command::CamMode(1)),
            Key::Digit2 => Binding::tap(Command::CamMode(2)),
            Key::Digit3 => Binding::tap(Command::CamMode(3)),
        }
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::invalid_argument(format!("unbound key: {s:?}")))
    }
}

// ============================================================================
// Binding
// ============================================================================

/// Commands a key sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Sent on key-down.
    pub press: Command,
    /// Sent on key-up, for keys that move something while held.
    pub release: Option<Command>,
}

impl Binding {
    fn hold(press: Command, release: Command) -> Self {
        Self {
            press,
            release: Some(release),
        }
    }

    fn tap(press: Command) -> Self {
        Self {
            press,
            release: None,
        }
    }
}

// ============================================================================
// KeyboardController
// ============================================================================

/// Turns key events into commands, one held key at a time.
#[derive(Debug, Clone, Default)]
pub struct KeyboardController {
    held: Option<Key>,
}

impl KeyboardController {
    /// Creates a controller with no key held.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key currently held, if any.
    #[inline]
    #[must_use]
    pub fn held(&self) -> Option<Key> {
        self.held
    }

    /// Handles a key-down. Ignored while any key is held.
    pub fn key_down(&mut self, key: Key) -> Option<Command> {
        if self.held.is_some() {
            return None;
        }
        self.held = Some(key);
        Some(key.binding().press)
    }

    /// Handles a key-up. Only the held key's release counts.
    pub fn key_up(&mut self, key: Key) -> Option<Command> {
        if self.held != Some(key) {
            return None;
        }
        self.held = None;
        key.binding().release
    }

    /// Forgets the held key, e.g. when the window loses focus.
    ///
    /// Returns the release command of the key that was held.
    pub fn release_all(&mut self) -> Option<Command> {
        self.held.take().and_then(|key| key.binding().release)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_properties() {
        let (key, code) = Key::W.properties();
        assert_eq!(key, "w");
        assert_eq!(code, "KeyW");
        assert_eq!(Key::Space.key(), " ");
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Key::from_name("ArrowUp"), Some(Key::ArrowUp));
        assert_eq!(Key::from_name("W"), Some(Key::W));
        assert_eq!(Key::from_name("KeyD"), Some(Key::D));
        assert_eq!(Key::from_name(" "), Some(Key::Space));
        assert_eq!(Key::from_name("Spacebar"), Some(Key::Space));
        assert_eq!(Key::from_name("Escape"), None);
        assert!("x".parse::<Key>().is_err());
        assert_eq!("2".parse::<Key>().unwrap(), Key::Digit2);
    }

    #[test]
    fn test_arrow_press_and_release() {
        let mut keys = KeyboardController::new();
        assert_eq!(keys.key_down(Key::ArrowLeft), Some(Command::Left));
        assert_eq!(keys.held(), Some(Key::ArrowLeft));
        assert_eq!(keys.key_up(Key::ArrowLeft), Some(Command::DriveStop));
        assert_eq!(keys.held(), None);
    }

    #[test]
    fn test_held_key_blocks_others() {
        let mut keys = KeyboardController::new();
        assert_eq!(keys.key_down(Key::D), Some(Command::CamRight));
        assert_eq!(keys.key_down(Key::D), None);
        assert_eq!(keys.key_down(Key::ArrowUp), None);

        // Releasing a key that is not held emits nothing
        assert_eq!(keys.key_up(Key::ArrowUp), None);
        assert_eq!(keys.key_up(Key::D), Some(Command::CamStop));
        assert_eq!(keys.key_down(Key::ArrowUp), Some(Command::Forward));
    }

    #[test]
    fn test_tap_keys() {
        let mut keys = KeyboardController::new();
        assert_eq!(keys.key_down(Key::Space), Some(Command::CamTakePhoto));
        assert_eq!(keys.key_up(Key::Space), None);
        assert_eq!(keys.key_down(Key::Digit3), Some(Command::CamMode(3)));
        assert_eq!(keys.key_up(Key::Digit3), None);
        assert_eq!(keys.key_down(Key::N), Some(Command::NightModeOn));
    }

    #[test]
    fn test_release_all() {
        let mut keys = KeyboardController::new();
        keys.key_down(Key::ArrowDown);
        assert_eq!(keys.release_all(), Some(Command::DriveStop));
        assert_eq!(keys.release_all(), None);
    }

    #[test]
    fn test_every_key_is_bound_to_a_wire_command() {
        for key in Key::ALL {
            let binding = key.binding();
            assert!(!binding.press.action().is_empty());
            if let Some(release) = binding.release {
                assert!(matches!(release, Command::DriveStop | Command::CamStop));
            }
        }
    }
}
