//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Mouse button number for the first side button ("back") on macOS.
const DEFAULT_TRIGGER_BUTTON: i64 = 3;

/// Grace period between trigger release and mic close.
const DEFAULT_GRACE_MS: u64 = 1000;

/// Origin of the embedded voice client.
const DEFAULT_ORIGIN: &str = "https://discordapp.com";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket the shell connects to
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// The single origin allowed to request microphone access
    pub allowed_origin: Url,

    /// OS button number of the push-to-talk trigger
    pub trigger_button: i64,

    /// Delay between trigger release and the mic-close directive
    pub mute_grace: Duration,

    /// Whether developer tooling is exposed to the embedded page
    pub dev_mode: bool,
}

impl Config {
    /// Load configuration from process arguments, environment, and defaults
    pub fn load() -> Result<Self> {
        Self::from_env_and_args(std::env::args().skip(1))
    }

    fn from_env_and_args(args: impl Iterator<Item = String>) -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("ptt-shell");

        let socket_path = data_dir.join("bridge.sock");

        let allowed_origin = match std::env::var("PTT_SHELL_ORIGIN") {
            Ok(raw) => Url::parse(&raw).context("PTT_SHELL_ORIGIN is not a valid URL")?,
            Err(_) => Url::parse(DEFAULT_ORIGIN).expect("default origin parses"),
        };

        let trigger_button = match std::env::var("PTT_SHELL_TRIGGER_BUTTON") {
            Ok(raw) => raw
                .parse()
                .context("PTT_SHELL_TRIGGER_BUTTON is not a number")?,
            Err(_) => DEFAULT_TRIGGER_BUTTON,
        };

        let grace_ms = match std::env::var("PTT_SHELL_GRACE_MS") {
            Ok(raw) => raw.parse().context("PTT_SHELL_GRACE_MS is not a number")?,
            Err(_) => DEFAULT_GRACE_MS,
        };

        let dev_mode = Self::dev_mode_from_args(args);

        Ok(Self {
            socket_path,
            data_dir,
            allowed_origin,
            trigger_button,
            mute_grace: Duration::from_millis(grace_ms),
            dev_mode,
        })
    }

    /// The only CLI surface: an optional flag enabling developer mode
    fn dev_mode_from_args(mut args: impl Iterator<Item = String>) -> bool {
        args.any(|a| a == "dev" || a == "--dev")
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.socket_path.to_string_lossy().contains("ptt-shell"));
    }

    #[test]
    fn test_dev_mode_flag() {
        assert!(Config::dev_mode_from_args(
            vec!["dev".to_string()].into_iter()
        ));
        assert!(Config::dev_mode_from_args(
            vec!["--dev".to_string()].into_iter()
        ));
        assert!(!Config::dev_mode_from_args(std::iter::empty()));
    }

    #[test]
    fn test_default_origin() {
        let config = Config::load().unwrap();
        assert_eq!(config.allowed_origin.host_str(), Some("discordapp.com"));
    }
}
