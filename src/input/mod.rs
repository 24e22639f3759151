//! Global mouse monitor for the push-to-talk trigger button
//!
//! Uses a macOS CGEventTap to observe side-button press/release events
//! system-wide, independent of window focus.

mod buttons;
mod listener;

pub use buttons::{ButtonPhase, InputEvent};
pub use listener::{MonitorError, MonitorEvent, MouseListener};
