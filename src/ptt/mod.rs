//! Push-to-talk state machine
//!
//! Two states:
//! - Muted: default, mic closed
//! - Talking: momentary, while the trigger button is held (plus a grace
//!   period after release that absorbs quick re-presses)

mod controller;

pub use controller::{PttController, PttState};
