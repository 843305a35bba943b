//! # Loopback control socket binding.
//!
//! Listens on `127.0.0.1:<control_port>`, one command line in, one text
//! response out. A connection stays open across commands until the client
//! closes it or sends `shutdown`. Command execution still happens inside
//! the supervisor loop; this task only shuttles lines.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::control::{ControlHandle, ControlTransport};
use crate::error::KernelError;

/// The loopback TCP binding.
pub struct SocketBinding {
    listener: TcpListener,
}

impl SocketBinding {
    /// Binds the loopback listener. A port that cannot be bound is fatal
    /// at initialization.
    pub async fn bind(port: u16) -> Result<Self, KernelError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| KernelError::Config {
                reason: format!("cannot bind control socket on port {port}: {e}"),
            })?;
        log::info!("control socket listening on 127.0.0.1:{port}");
        Ok(Self { listener })
    }

    /// The bound local address (useful when port 0 was requested).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, KernelError> {
        self.listener.local_addr().map_err(KernelError::from)
    }
}

#[async_trait]
impl ControlTransport for SocketBinding {
    async fn serve(self, handle: ControlHandle, shutdown: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    log::debug!("control client connected from {peer}");
                    tokio::spawn(serve_client(stream, handle.clone(), shutdown.clone()));
                }
                Err(e) => {
                    log::warn!("control socket accept failed: {e}");
                }
            }
        }
        log::info!("control socket closed");
    }
}

async fn serve_client(stream: TcpStream, handle: ControlHandle, shutdown: CancellationToken) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let ends_kernel = line.eq_ignore_ascii_case("shutdown");
        let response = match handle.submit_line(line).await {
            Ok(response) => response,
            Err(_) => break,
        };
        if writer.write_all(response.text.as_bytes()).await.is_err() {
            break;
        }
        if ends_kernel {
            break;
        }
    }
    log::debug!("control client disconnected");
}
