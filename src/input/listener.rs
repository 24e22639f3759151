//! Global mouse listener using macOS CGEventTap
//!
//! Monitors system-wide mouse button events for the push-to-talk trigger.
//! Runs on a dedicated thread with its own CFRunLoop; events are marshaled
//! onto the main loop through a bounded channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    EventField,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::buttons::{ButtonPhase, InputEvent};

/// Events sent from the mouse listener to the controller
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// The trigger button changed state
    Button(InputEvent),
    /// Event tap was disabled by macOS (needs re-registration)
    TapDisabled,
}

/// Global listener that monitors trigger-button press/release events
pub struct MouseListener {
    event_tx: mpsc::Sender<MonitorEvent>,
    trigger_button: i64,
    running: Arc<AtomicBool>,
}

impl MouseListener {
    /// Create a new mouse listener for the given trigger button
    pub fn new(event_tx: mpsc::Sender<MonitorEvent>, trigger_button: i64) -> Self {
        Self {
            event_tx,
            trigger_button,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the mouse listener
    ///
    /// Spawns a dedicated thread running a CFRunLoop to receive CGEventTap
    /// callbacks. The listener runs until `stop()` is called or the program
    /// exits. If the tap cannot be installed, push-to-talk is unavailable
    /// and the error must be surfaced by the caller.
    pub fn start(&self) -> Result<(), MonitorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let trigger_button = self.trigger_button;
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("mouse-listener".to_string())
            .spawn(move || {
                info!("mouse listener thread started");

                if let Err(e) = run_event_loop(event_tx, trigger_button, running.clone()) {
                    error!(?e, "mouse listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("mouse listener thread stopped");
            })
            .map_err(|e| MonitorError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    /// Stop the mouse listener
    ///
    /// The listener thread checks the flag between run-loop intervals and
    /// exits on its next poll.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the mouse listener
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("mouse listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// Raw events handed out of the CGEventTap callback
enum RawEvent {
    Button { button: i64, phase: ButtonPhase },
    TapDisabled,
}

/// Run the CFRunLoop with the event tap
fn run_event_loop(
    event_tx: mpsc::Sender<MonitorEvent>,
    trigger_button: i64,
    running: Arc<AtomicBool>,
) -> Result<(), MonitorError> {
    // Channel out of the tap callback; the callback must stay non-blocking
    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<RawEvent>();

    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        match event_type {
            CGEventType::OtherMouseDown | CGEventType::OtherMouseUp => {
                let button = event.get_integer_value_field(EventField::MOUSE_EVENT_BUTTON_NUMBER);
                let phase = if matches!(event_type, CGEventType::OtherMouseDown) {
                    ButtonPhase::Press
                } else {
                    ButtonPhase::Release
                };
                let _ = callback_tx.send(RawEvent::Button { button, phase });
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                let _ = callback_tx.send(RawEvent::TapDisabled);
            }
            _ => {}
        }
        Some(event.clone())
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::OtherMouseDown, CGEventType::OtherMouseUp],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        MonitorError::EventTapCreation
    })?;

    tap.enable();

    let run_loop_source = tap.mach_port.create_runloop_source(0).unwrap();
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!(trigger_button, "event tap created and enabled");

    while running.load(Ordering::SeqCst) {
        // Run the loop for a short interval, then drain callback events
        unsafe {
            CFRunLoop::run_in_mode(
                kCFRunLoopDefaultMode,
                std::time::Duration::from_millis(100),
                true,
            );
        }

        while let Ok(raw) = callback_rx.try_recv() {
            let event = match raw {
                RawEvent::Button { button, phase } => {
                    let input = InputEvent { button, phase };
                    // Only the trigger button crosses into the main loop
                    if !input.is_trigger(trigger_button) {
                        continue;
                    }
                    debug!(button, ?phase, "trigger button event");
                    MonitorEvent::Button(input)
                }
                RawEvent::TapDisabled => {
                    warn!("event tap disabled, will re-enable");
                    MonitorEvent::TapDisabled
                }
            };

            // blocking_send: we are on the listener thread, not in async context
            if event_tx.blocking_send(event).is_err() {
                warn!("failed to send input event - channel closed?");
                break;
            }
        }
    }

    // Tap is cleaned up when it goes out of scope

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = MouseListener::new(tx, 3);
        assert!(!listener.is_running());
    }

    #[test]
    fn test_stop_clears_running_flag() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = MouseListener::new(tx, 3);
        listener.running.store(true, Ordering::SeqCst);

        listener.stop();
        assert!(!listener.is_running());
    }
}
