//! Operator input.
//!
//! Maps key events to [`Command`](crate::protocol::Command)s.

pub mod keyboard;

pub use keyboard::{Binding, Key, KeyboardController};
