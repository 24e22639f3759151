//! Session state reported by the embedded page
//!
//! A handful of flags with a single writer (the push-to-talk controller
//! task) and snapshot readers (the permission gate). All fields start
//! false and live for the process lifetime.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

/// Point-in-time view of the session flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// A voice session is established in the embedded page
    pub connected: bool,
    /// User muted themselves via the page UI
    pub self_muted: bool,
    /// A mic-open directive was sent and not yet followed by mic-close
    pub talking: bool,
    /// Set the first time the user self-mutes; never cleared.
    /// While set, the permission gate denies everything (fail closed).
    pub permission_revoked: bool,
}

/// Shared handle to the session flags
#[derive(Clone)]
pub struct SessionTracker {
    inner: Arc<RwLock<SessionSnapshot>>,
}

impl SessionTracker {
    /// Create a tracker with all flags false
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionSnapshot::default())),
        }
    }

    /// Record whether a voice session is established
    pub async fn set_connected(&self, connected: bool) {
        let mut state = self.inner.write().await;
        if state.connected != connected {
            info!(connected, "voice session state changed");
        }
        state.connected = connected;
    }

    /// Record whether the user is self-muted via the page UI
    ///
    /// The first self-mute permanently revokes permission granting.
    pub async fn set_self_muted(&self, self_muted: bool) {
        let mut state = self.inner.write().await;
        if state.self_muted != self_muted {
            info!(self_muted, "self-mute state changed");
        }
        state.self_muted = self_muted;
        if self_muted && !state.permission_revoked {
            info!("permission gate disabled until restart");
            state.permission_revoked = true;
        }
    }

    /// Record whether the mic is believed open
    pub async fn set_talking(&self, talking: bool) {
        self.inner.write().await.talking = talking;
    }

    /// Read the current flags
    pub async fn snapshot(&self) -> SessionSnapshot {
        *self.inner.read().await
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
