//! Core push-to-talk controller
//!
//! Consumes trigger-button events and page messages on a single task,
//! decides when to emit mic directives, and owns the one pending
//! mute deadline. Arming a new deadline replaces the old one; a press
//! always cancels it.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::bridge::{HostMessage, PageMessage};
use crate::input::{ButtonPhase, MonitorEvent};
use crate::session::SessionTracker;

/// The two states of the push-to-talk machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PttState {
    /// Mic closed, waiting for the trigger
    #[default]
    Muted,
    /// Mic open; a mic-open directive was sent and not yet closed
    Talking,
}

impl std::fmt::Display for PttState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PttState::Muted => write!(f, "Muted"),
            PttState::Talking => write!(f, "Talking"),
        }
    }
}

/// The controller that drives mic directives from input and page events
pub struct PttController {
    /// Current state
    state: PttState,
    /// Pending mic-close deadline; None means no close is scheduled
    mute_deadline: Option<Instant>,
    /// Grace period between trigger release and mic close
    grace: Duration,
    /// Dev-mode flag echoed to the page on DOMready
    dev_mode: bool,
    /// Time the mic was opened, for duration logging
    opened_at: Option<Instant>,
    /// Session flags (this task is the only writer)
    session: SessionTracker,
    /// Outbound directives to the bridge
    host_tx: broadcast::Sender<HostMessage>,
}

impl PttController {
    /// Create a new controller in the Muted state
    pub fn new(
        session: SessionTracker,
        host_tx: broadcast::Sender<HostMessage>,
        grace: Duration,
        dev_mode: bool,
    ) -> Self {
        Self {
            state: PttState::Muted,
            mute_deadline: None,
            grace,
            dev_mode,
            opened_at: None,
            session,
            host_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> PttState {
        self.state
    }

    /// Run the controller, processing input events and page messages
    ///
    /// All decision state lives on this one task; the listener thread and
    /// bridge clients only reach it through the channels.
    pub async fn run(
        &mut self,
        mut input_rx: mpsc::Receiver<MonitorEvent>,
        mut page_rx: mpsc::Receiver<PageMessage>,
    ) {
        info!(grace_ms = self.grace.as_millis() as u64, "controller started in Muted state");

        loop {
            tokio::select! {
                event = input_rx.recv() => match event {
                    Some(MonitorEvent::Button(input)) => match input.phase {
                        ButtonPhase::Press => self.handle_press().await,
                        ButtonPhase::Release => self.handle_release(),
                    },
                    Some(MonitorEvent::TapDisabled) => {
                        warn!("input tap disabled, trigger events may be missed");
                    }
                    None => break,
                },
                message = page_rx.recv() => match message {
                    Some(message) => self.handle_page_message(message).await,
                    None => break,
                },
                _ = time::sleep_until(self.mute_deadline.unwrap_or_else(Instant::now)),
                    if self.mute_deadline.is_some() =>
                {
                    self.close_mic().await;
                }
            }
        }

        info!("controller stopped");
    }

    /// Trigger button pressed: cancel any pending close, open the mic
    async fn handle_press(&mut self) {
        // Unconditional: a press must never let a scheduled close fire
        self.mute_deadline = None;

        if self.session.snapshot().await.self_muted {
            debug!("press ignored while self-muted");
            return;
        }

        if self.state == PttState::Talking {
            // Mic already open; cancelling the pending close is enough
            debug!("press while talking, pending close cancelled");
            return;
        }

        self.state = PttState::Talking;
        self.opened_at = Some(Instant::now());
        self.session.set_talking(true).await;
        info!("mic open");
        self.send_host(HostMessage::MicOpen);
    }

    /// Trigger button released: schedule the close after the grace period
    fn handle_release(&mut self) {
        if self.state == PttState::Talking {
            self.mute_deadline = Some(Instant::now() + self.grace);
            debug!(grace_ms = self.grace.as_millis() as u64, "mic close scheduled");
        }
    }

    /// The grace period elapsed without a re-press: close the mic
    async fn close_mic(&mut self) {
        self.mute_deadline = None;
        self.state = PttState::Muted;
        self.session.set_talking(false).await;

        let open_ms = self
            .opened_at
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        info!(open_ms, "mic closed");
        self.send_host(HostMessage::MicClose);
    }

    /// Handle a message relayed from the embedded page
    async fn handle_page_message(&mut self, message: PageMessage) {
        match message {
            PageMessage::Connected => self.session.set_connected(true).await,
            PageMessage::Disconnected => self.session.set_connected(false).await,
            PageMessage::SelfMuted => self.session.set_self_muted(true).await,
            PageMessage::SelfUnmuted => self.session.set_self_muted(false).await,
            PageMessage::DomReady => {
                info!(dev_mode = self.dev_mode, "page loaded");
                self.send_host(HostMessage::DevMode {
                    enabled: self.dev_mode,
                });
            }
            PageMessage::ConfirmMicClose => self.repair_desync().await,
            PageMessage::PermissionRequest { .. } => {
                // Answered inline by the bridge server, never forwarded here
                debug!("permission request reached controller, ignoring");
            }
        }
    }

    /// The page reports a closed mic while we believe we are talking
    ///
    /// Happens when the page was reloaded or missed an injected key event.
    /// Re-emitting mic-open repairs the divergence without a state change.
    async fn repair_desync(&mut self) {
        if self.state != PttState::Talking {
            return;
        }
        if self.session.snapshot().await.self_muted {
            return;
        }

        warn!("mic desync detected, re-opening");
        self.send_host(HostMessage::MicOpen);
    }

    /// Send a directive to the bridge; delivery failure is not fatal
    fn send_host(&self, message: HostMessage) {
        if self.host_tx.send(message.clone()).is_err() {
            warn!(directive = %message, "bridge unavailable, directive dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputEvent;

    fn create_controller() -> (PttController, broadcast::Receiver<HostMessage>) {
        let (tx, rx) = broadcast::channel(16);
        let controller =
            PttController::new(SessionTracker::new(), tx, Duration::from_millis(1000), false);
        (controller, rx)
    }

    fn trigger(phase: ButtonPhase) -> MonitorEvent {
        MonitorEvent::Button(InputEvent { button: 3, phase })
    }

    #[tokio::test]
    async fn test_press_opens_mic_once() {
        let (mut controller, mut rx) = create_controller();

        controller.handle_press().await;
        assert_eq!(controller.state(), PttState::Talking);
        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicOpen);
        assert!(rx.try_recv().is_err());
        assert!(controller.session.snapshot().await.talking);
    }

    #[tokio::test]
    async fn test_repeated_press_does_not_duplicate_mic_open() {
        let (mut controller, mut rx) = create_controller();

        controller.handle_press().await;
        controller.handle_release();
        assert!(controller.mute_deadline.is_some());

        controller.handle_press().await;
        assert!(controller.mute_deadline.is_none());
        assert_eq!(controller.state(), PttState::Talking);

        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicOpen);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_press_while_self_muted_is_ignored() {
        let (mut controller, mut rx) = create_controller();
        controller.session.set_self_muted(true).await;

        controller.handle_press().await;
        assert_eq!(controller.state(), PttState::Muted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_deadline_fire_closes_mic() {
        let (mut controller, mut rx) = create_controller();

        controller.handle_press().await;
        controller.handle_release();
        controller.close_mic().await;

        assert_eq!(controller.state(), PttState::Muted);
        assert!(!controller.session.snapshot().await.talking);
        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicOpen);
        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicClose);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_release_while_muted_schedules_nothing() {
        let (mut controller, _rx) = create_controller();

        controller.handle_release();
        assert!(controller.mute_deadline.is_none());
    }

    #[tokio::test]
    async fn test_self_mute_while_talking_does_not_force_close() {
        let (mut controller, mut rx) = create_controller();

        controller.handle_press().await;
        controller.handle_page_message(PageMessage::SelfMuted).await;

        // No forced close; the mic stays governed by release timing
        assert_eq!(controller.state(), PttState::Talking);
        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicOpen);
        assert!(rx.try_recv().is_err());

        controller.handle_release();
        controller.close_mic().await;
        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicClose);

        // The next press emits nothing while still self-muted
        controller.handle_press().await;
        assert_eq!(controller.state(), PttState::Muted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_desync_repair_while_talking() {
        let (mut controller, mut rx) = create_controller();

        controller.handle_press().await;
        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicOpen);

        controller
            .handle_page_message(PageMessage::ConfirmMicClose)
            .await;
        assert_eq!(controller.state(), PttState::Talking);
        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicOpen);
    }

    #[tokio::test]
    async fn test_desync_check_while_muted_has_no_effect() {
        let (mut controller, mut rx) = create_controller();

        controller
            .handle_page_message(PageMessage::ConfirmMicClose)
            .await;
        assert_eq!(controller.state(), PttState::Muted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dom_ready_replies_with_dev_mode() {
        let (tx, mut rx) = broadcast::channel(16);
        let mut controller =
            PttController::new(SessionTracker::new(), tx, Duration::from_millis(1000), true);

        controller.handle_page_message(PageMessage::DomReady).await;
        assert_eq!(rx.try_recv().unwrap(), HostMessage::DevMode { enabled: true });
    }

    #[tokio::test]
    async fn test_directive_without_bridge_still_updates_state() {
        let (tx, rx) = broadcast::channel(16);
        drop(rx);
        let mut controller =
            PttController::new(SessionTracker::new(), tx, Duration::from_millis(1000), false);

        controller.handle_press().await;
        assert_eq!(controller.state(), PttState::Talking);
        assert!(controller.session.snapshot().await.talking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_fires_after_grace_period() {
        let (mut controller, mut rx) = create_controller();
        let (input_tx, input_rx) = mpsc::channel(8);
        let (_page_tx, page_rx) = mpsc::channel::<PageMessage>(8);

        let handle = tokio::spawn(async move {
            controller.run(input_rx, page_rx).await;
        });

        input_tx.send(trigger(ButtonPhase::Press)).await.unwrap();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(rx.recv().await.unwrap(), HostMessage::MicOpen);

        input_tx.send(trigger(ButtonPhase::Release)).await.unwrap();
        time::sleep(Duration::from_millis(1)).await;
        let released_at = Instant::now();

        assert_eq!(rx.recv().await.unwrap(), HostMessage::MicClose);
        let elapsed = released_at.elapsed();
        assert!(elapsed >= Duration::from_millis(990), "closed after {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(1100), "closed after {elapsed:?}");

        drop(input_tx);
        drop(_page_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_repress_cancels_pending_close() {
        let (mut controller, mut rx) = create_controller();
        let (input_tx, input_rx) = mpsc::channel(8);
        let (_page_tx, page_rx) = mpsc::channel::<PageMessage>(8);

        let handle = tokio::spawn(async move {
            controller.run(input_rx, page_rx).await;
        });

        // press -> release after 200ms -> press again 500ms later
        input_tx.send(trigger(ButtonPhase::Press)).await.unwrap();
        time::sleep(Duration::from_millis(200)).await;
        input_tx.send(trigger(ButtonPhase::Release)).await.unwrap();
        time::sleep(Duration::from_millis(500)).await;
        input_tx.send(trigger(ButtonPhase::Press)).await.unwrap();

        // Well past where the cancelled close would have fired
        time::sleep(Duration::from_millis(3000)).await;

        assert_eq!(rx.try_recv().unwrap(), HostMessage::MicOpen);
        assert!(rx.try_recv().is_err(), "no close and no duplicate open");

        drop(input_tx);
        drop(_page_tx);
        handle.await.unwrap();
    }
}
