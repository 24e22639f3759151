//! Raw mouse button event types

/// Whether a button went down or came back up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPhase {
    /// Button pressed
    Press,
    /// Button released
    Release,
}

/// A single observed button transition
///
/// Produced by the mouse listener, consumed once by the controller,
/// not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// OS button number (0 = left, 1 = right, 2 = middle, 3+ = side)
    pub button: i64,
    /// Press or release
    pub phase: ButtonPhase,
}

impl InputEvent {
    /// Check whether this event is for the configured trigger button
    pub fn is_trigger(&self, trigger_button: i64) -> bool {
        self.button == trigger_button
    }
}
