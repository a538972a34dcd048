//! Socket-map listener: `unix:<path>` or TCP `host:port`.

use super::handler::SocketmapHandler;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use tlspol_domain::TlspolError;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

pub struct SocketmapServer {
    handler: Arc<SocketmapHandler>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl SocketmapServer {
    pub fn new(handler: Arc<SocketmapHandler>, shutdown: CancellationToken) -> Self {
        Self {
            handler,
            shutdown,
            tracker: TaskTracker::new(),
        }
    }

    /// Accept until the shutdown token fires, then wait for the in-flight
    /// connection handlers to drain.
    pub async fn run(
        &self,
        address: &str,
        socket_permissions: Option<&str>,
    ) -> Result<(), TlspolError> {
        if let Some(path) = address.strip_prefix("unix:") {
            // A previous run may have left the socket file behind.
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(TlspolError::Io(err.to_string())),
            }
            let listener =
                UnixListener::bind(path).map_err(|e| TlspolError::Io(e.to_string()))?;
            if let Some(mode) = socket_permissions {
                let mode = u32::from_str_radix(mode, 8).map_err(|_| {
                    TlspolError::Config(format!("invalid socket-permissions: {:?}", mode))
                })?;
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                    .map_err(|e| TlspolError::Io(e.to_string()))?;
            }
            info!(path = %path, "Listening on UNIX socket");
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => self.spawn_connection(stream),
                        Err(err) => error!(error = %err, "Error accepting connection"),
                    }
                }
            }
        } else {
            let listener = TcpListener::bind(address)
                .await
                .map_err(|e| TlspolError::Io(e.to_string()))?;
            info!(address = %address, "Listening on TCP");
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => self.spawn_connection(stream),
                        Err(err) => error!(error = %err, "Error accepting connection"),
                    }
                }
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        Ok(())
    }

    fn spawn_connection<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let handler = Arc::clone(&self.handler);
        self.tracker.spawn(async move {
            handler.handle_connection(stream).await;
        });
    }
}
