//! Process lifecycle handling
//!
//! The daemon exits on SIGTERM or SIGINT; socket cleanup happens in main
//! after the event loop unwinds.

use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// Resolve once a shutdown signal (SIGTERM or SIGINT) arrives
pub async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => debug!("received SIGTERM"),
        _ = sigint.recv() => debug!("received SIGINT"),
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, task};

    #[tokio::test]
    async fn test_shutdown_wait_is_pending_without_signal() {
        let mut wait = task::spawn(super::shutdown_signal());
        assert_pending!(wait.poll());
    }
}
