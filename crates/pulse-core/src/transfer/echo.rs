//! Minimal counterpart server for local testing.
//!
//! Reads a whole request (until the client half-closes), replies with
//! `"Server response data: "` followed by the request bytes, then half-closes
//! its own side.

use crate::cancel::CancellationToken;
use crate::config::TransferConfig;
use crate::error::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// How often `serve_until` re-checks its token while idle.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Longest `serve_until` spends on one client, request and reply together.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Echo server bound to a local address.
pub struct EchoServer {
    listener: TcpListener,
}

impl EchoServer {
    /// Bind to `addr`; port 0 picks a free port.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and answer exactly one connection. Returns the request size.
    pub async fn serve_one(&self) -> Result<usize> {
        let (conn, peer) = self.listener.accept().await?;
        info!("Connected by {}", peer);
        handle_connection(conn).await
    }

    /// Answer connections one at a time until `token` fires.
    ///
    /// A client that never half-closes is dropped after `CONNECTION_TIMEOUT`,
    /// or as soon as `token` fires.
    pub async fn serve_until(&self, token: &CancellationToken) -> Result<()> {
        self.serve_until_with_limit(token, CONNECTION_TIMEOUT).await
    }

    async fn serve_until_with_limit(
        &self,
        token: &CancellationToken,
        limit: Duration,
    ) -> Result<()> {
        while token.check().is_ok() {
            let accepted =
                match tokio::time::timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                    Ok(accepted) => accepted?,
                    Err(_) => continue,
                };
            let (conn, peer) = accepted;
            info!("Connected by {}", peer);
            tokio::select! {
                handled = tokio::time::timeout(limit, handle_connection(conn)) => match handled {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("Connection from {} failed: {}", peer, e),
                    Err(_) => warn!("Connection from {} timed out after {:?}", peer, limit),
                },
                e = token.cancelled() => {
                    warn!("Dropping connection from {}: {}", peer, e);
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(mut conn: TcpStream) -> Result<usize> {
    let mut received = Vec::new();
    let mut buf = [0u8; TransferConfig::CHUNK_SIZE];
    loop {
        let n = conn.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }
    debug!("Data received from client: {} bytes", received.len());

    let mut response = TransferConfig::ECHO_RESPONSE_PREFIX.to_vec();
    response.extend_from_slice(&received);
    conn.write_all(&response).await?;
    conn.shutdown().await?;

    Ok(received.len())
}
