//! ptt-shell-daemon: push-to-talk core for an embedded web voice client
//!
//! The daemon provides:
//! - Global mouse-button monitoring via CGEventTap (the push-to-talk trigger)
//! - A two-state controller that opens the mic while the trigger is held and
//!   closes it after a grace period on release
//! - A bridge socket the embedding shell connects to for mic directives,
//!   page lifecycle messages, and permission decisions
//!
//! Window creation, navigation lockdown, and the page scripts themselves
//! live in the shell; this process only decides when the mic opens.

mod bridge;
mod config;
mod input;
mod lifecycle;
mod permissions;
mod ptt;
mod session;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::bridge::BridgeServer;
use crate::config::Config;
use crate::input::MouseListener;
use crate::lifecycle::shutdown_signal;
use crate::permissions::PermissionGate;
use crate::ptt::PttController;
use crate::session::SessionTracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "ptt-shell-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        allowed_origin = %config.allowed_origin,
        trigger_button = config.trigger_button,
        dev_mode = config.dev_mode,
        "configuration loaded"
    );

    // Channels for inter-component communication
    // Mouse listener -> controller
    let (input_tx, input_rx) = mpsc::channel(64);
    // Bridge clients -> controller
    let (page_tx, page_rx) = mpsc::channel(64);
    // Controller -> bridge clients (mic directives, dev-mode flag)
    let (host_tx, _host_rx) = broadcast::channel(32);

    // Session flags: written by the controller, read by the permission gate
    let session = SessionTracker::new();
    let gate = PermissionGate::new(config.allowed_origin.clone(), session.clone());

    let mut controller = PttController::new(
        session,
        host_tx.clone(),
        config.mute_grace,
        config.dev_mode,
    );

    // Start the mouse listener (runs on a dedicated thread). Without it the
    // daemon still serves the bridge, but push-to-talk does nothing.
    let mouse_listener = MouseListener::new(input_tx, config.trigger_button);
    match mouse_listener.start() {
        Ok(()) => {
            info!("mouse listener started");
        }
        Err(e) => {
            error!(?e, "failed to start mouse listener");
            warn!("push-to-talk disabled - check Accessibility permissions");
        }
    }

    // Bridge server the embedding shell connects to
    let server = BridgeServer::new(&config.socket_path, page_tx, host_tx, gate)?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the controller (processes input events and page messages)
        _ = controller.run(input_rx, page_rx) => {
            info!("controller exited");
        }

        // Run the bridge server (accepts shell connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "bridge server error");
            }
        }

        // Wait for shutdown signal
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    mouse_listener.stop();
    server.shutdown().await;

    info!("ptt-shell-daemon stopped");

    Ok(())
}
