//! Permission gate for the embedded origin
//!
//! Microphone access is granted only to the single allowed origin, only
//! while the page reports an active voice session. A self-mute disables
//! the gate entirely until restart.

use tracing::{debug, info};
use url::Url;

use crate::session::{SessionSnapshot, SessionTracker};

/// Outcome of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Grant,
    Deny,
}

impl Decision {
    pub fn is_grant(self) -> bool {
        matches!(self, Decision::Grant)
    }
}

/// Decides permission requests arriving from the embedding shell
#[derive(Clone)]
pub struct PermissionGate {
    allowed_origin: Url,
    session: SessionTracker,
}

impl PermissionGate {
    /// Create a gate for the given allowed origin
    pub fn new(allowed_origin: Url, session: SessionTracker) -> Self {
        Self {
            allowed_origin,
            session,
        }
    }

    /// Decide a permission request against the current session flags
    pub async fn decide(&self, origin: &str, kind: &str) -> Decision {
        let snapshot = self.session.snapshot().await;
        let decision = Self::evaluate(&self.allowed_origin, origin, kind, snapshot);

        match decision {
            Decision::Grant => {
                info!(origin, kind, "permission granted");
            }
            Decision::Deny => {
                debug!(origin, kind, "permission denied");
            }
        }

        decision
    }

    /// Pure decision rule: media, matching origin, connected, not revoked
    fn evaluate(allowed: &Url, origin: &str, kind: &str, snapshot: SessionSnapshot) -> Decision {
        if snapshot.permission_revoked {
            return Decision::Deny;
        }

        if kind != "media" {
            return Decision::Deny;
        }

        // An unparseable origin can never match the allowed one
        let origin = match Url::parse(origin) {
            Ok(url) => url,
            Err(_) => return Decision::Deny,
        };

        if origin.origin() != allowed.origin() {
            return Decision::Deny;
        }

        if snapshot.connected {
            Decision::Grant
        } else {
            Decision::Deny
        }
    }
}
