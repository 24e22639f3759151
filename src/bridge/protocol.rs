//! Bridge message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian
//! length. Message names mirror the identifiers the page scripts use, so
//! the tags are a mix of camelCase and kebab-case rather than snake_case.

use serde::{Deserialize, Serialize};

/// Messages from the shell/page to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageMessage {
    /// Voice session established
    #[serde(rename = "connected")]
    Connected,

    /// Voice session ended
    #[serde(rename = "disconnected")]
    Disconnected,

    /// User muted via the page UI
    #[serde(rename = "self-muted")]
    SelfMuted,

    /// User unmuted via the page UI
    #[serde(rename = "self-unmuted")]
    SelfUnmuted,

    /// Page finished loading; the daemon replies with the dev-mode flag
    #[serde(rename = "DOMready")]
    DomReady,

    /// Page believes the mic is closed; desync check while talking
    #[serde(rename = "confirmMicClose")]
    ConfirmMicClose,

    /// Shell asks whether a permission request from the page may be granted
    #[serde(rename = "permissionRequest")]
    PermissionRequest { origin: String, kind: String },
}

/// Messages from the daemon to the shell/page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    /// Instructs the page to simulate the mute-toggle key down
    #[serde(rename = "micOpen")]
    MicOpen,

    /// Instructs the page to simulate the mute-toggle key up
    #[serde(rename = "micClose")]
    MicClose,

    /// Whether developer tooling should be exposed to the page
    #[serde(rename = "devMode")]
    DevMode { enabled: bool },

    /// Answer to a permission request
    #[serde(rename = "permissionDecision")]
    PermissionDecision { grant: bool },
}

impl std::fmt::Display for HostMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostMessage::MicOpen => write!(f, "micOpen"),
            HostMessage::MicClose => write!(f, "micClose"),
            HostMessage::DevMode { enabled } => write!(f, "devMode({})", enabled),
            HostMessage::PermissionDecision { grant } => {
                write!(f, "permissionDecision({})", grant)
            }
        }
    }
}
