//! Unix domain socket server for the embedding shell
//!
//! The shell relays page lifecycle messages inbound; mic directives and
//! the dev-mode flag flow outbound. Permission requests are answered
//! inline from the gate without a round trip through the controller.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::bridge::protocol::{HostMessage, PageMessage};
use crate::permissions::PermissionGate;

/// Upper bound on a single message frame; real messages are tiny
const MAX_FRAME_LEN: usize = 64 * 1024;

/// Bridge server handling shell connections
pub struct BridgeServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    page_tx: mpsc::Sender<PageMessage>,
    host_tx: broadcast::Sender<HostMessage>,
    gate: PermissionGate,
    shutdown_tx: broadcast::Sender<()>,
}

impl BridgeServer {
    /// Create a new bridge server bound to the given socket path
    pub fn new(
        socket_path: &Path,
        page_tx: mpsc::Sender<PageMessage>,
        host_tx: broadcast::Sender<HostMessage>,
        gate: PermissionGate,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Socket permissions owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "bridge server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            page_tx,
            host_tx,
            gate,
            shutdown_tx,
        })
    }

    /// Run the server, accepting shell connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("shell connected");
                    let page_tx = self.page_tx.clone();
                    let host_rx = self.host_tx.subscribe();
                    let gate = self.gate.clone();
                    let shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        if let Err(e) =
                            Self::handle_client(stream, page_tx, host_rx, gate, shutdown_rx).await
                        {
                            warn!(?e, "client handler error");
                        }
                        debug!("shell disconnected");
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single shell connection
    async fn handle_client(
        stream: UnixStream,
        page_tx: mpsc::Sender<PageMessage>,
        mut host_rx: broadcast::Receiver<HostMessage>,
        gate: PermissionGate,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // Per-client replies (permission decisions) share the write half
        // with the broadcast directives
        let (reply_tx, mut reply_rx) = mpsc::channel::<HostMessage>(8);

        let writer_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    directive = host_rx.recv() => match directive {
                        Ok(message) => message,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "directive receiver lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    reply = reply_rx.recv() => match reply {
                        Some(message) => message,
                        None => break,
                    },
                    _ = shutdown_rx.recv() => break,
                };

                if let Err(e) = Self::send_message(&mut writer, &message).await {
                    debug!(?e, "client write failed");
                    break;
                }
            }
        });

        let result = Self::read_loop(&mut reader, &page_tx, &gate, &reply_tx).await;

        drop(reply_tx);
        writer_task.abort();
        result
    }

    /// Read and dispatch inbound frames until the client disconnects
    async fn read_loop<R: AsyncRead + Unpin>(
        reader: &mut R,
        page_tx: &mpsc::Sender<PageMessage>,
        gate: &PermissionGate,
        reply_tx: &mpsc::Sender<HostMessage>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_FRAME_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            // Unknown identifiers are logged and ignored, never a fault
            let message: PageMessage = match serde_json::from_slice(&msg_buf) {
                Ok(message) => message,
                Err(e) => {
                    warn!(?e, "unrecognized message, ignoring");
                    continue;
                }
            };

            debug!(?message, "received message");

            match message {
                PageMessage::PermissionRequest { origin, kind } => {
                    let decision = gate.decide(&origin, &kind).await;
                    let reply = HostMessage::PermissionDecision {
                        grant: decision.is_grant(),
                    };
                    if reply_tx.send(reply).await.is_err() {
                        return Ok(());
                    }
                }
                message => {
                    if page_tx.send(message).await.is_err() {
                        // Controller is gone; nothing left to relay to
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<W, T>(writer: &mut W, message: &T) -> Result<()>
    where
        W: AsyncWrite + Unpin,
        T: serde::Serialize,
    {
        let msg_bytes = serde_json::to_vec(message)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("bridge server shutdown complete");
    }
}
