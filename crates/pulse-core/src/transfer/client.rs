//! TCP client that pushes a file or buffer to the processing server.
//!
//! The protocol has no framing. The client writes its payload, half-closes
//! its write side to mark the end, and (optionally) reads the reply until the
//! server closes its own write side.

use crate::config::{Endpoint, TransferConfig};
use crate::error::{RelayError, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info};

/// What gets sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSource {
    /// Stream this file from disk in chunks.
    File(PathBuf),
    /// Send these bytes in one full write.
    Buffer(Bytes),
}

/// Summary of a finished transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferReport {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Where the reply was written, if one was requested.
    pub response_path: Option<PathBuf>,
}

/// One connection, owned for the duration of a single transfer.
struct TransferSession {
    stream: TcpStream,
    endpoint: Endpoint,
}

impl TransferSession {
    async fn send(&mut self, source: &TransferSource) -> Result<u64> {
        match source {
            TransferSource::Buffer(data) => {
                self.stream
                    .write_all(data)
                    .await
                    .map_err(|e| RelayError::socket(&self.endpoint, e))?;
                Ok(data.len() as u64)
            }
            TransferSource::File(path) => {
                let mut file = File::open(path)
                    .await
                    .map_err(|e| RelayError::io_with_path(e, path))?;
                let mut buf = [0u8; TransferConfig::CHUNK_SIZE];
                let mut sent = 0u64;
                loop {
                    let n = file
                        .read(&mut buf)
                        .await
                        .map_err(|e| RelayError::io_with_path(e, path))?;
                    if n == 0 {
                        break;
                    }
                    self.stream
                        .write_all(&buf[..n])
                        .await
                        .map_err(|e| RelayError::socket(&self.endpoint, e))?;
                    sent += n as u64;
                }
                Ok(sent)
            }
        }
    }

    /// Signal end of payload by shutting down our write side.
    async fn finish_sending(&mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| RelayError::socket(&self.endpoint, e))
    }

    /// Append every received chunk to `path` (truncated first) until EOF.
    async fn receive_into(&mut self, path: &Path) -> Result<u64> {
        let mut out = File::create(path)
            .await
            .map_err(|e| RelayError::io_with_path(e, path))?;
        let mut buf = [0u8; TransferConfig::CHUNK_SIZE];
        let mut received = 0u64;
        let mut chunks = 0usize;
        loop {
            let n = self
                .stream
                .read(&mut buf)
                .await
                .map_err(|e| RelayError::socket(&self.endpoint, e))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .await
                .map_err(|e| RelayError::io_with_path(e, path))?;
            received += n as u64;
            chunks += 1;
        }
        out.flush()
            .await
            .map_err(|e| RelayError::io_with_path(e, path))?;
        debug!("Received {} bytes in {} chunks", received, chunks);
        Ok(received)
    }

    /// Consume the session; the socket is closed when `self` drops here.
    fn close(self) {
        debug!("Closing connection to {}", self.endpoint);
    }
}

/// Client for the processing server at one endpoint.
#[derive(Debug, Clone)]
pub struct TransferClient {
    endpoint: Endpoint,
}

impl TransferClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn open_session(&self) -> Result<TransferSession> {
        let stream = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
            .await
            .map_err(|e| RelayError::Connect {
                endpoint: self.endpoint.to_string(),
                source: e,
            })?;

        info!("Connected to server {}", self.endpoint);
        Ok(TransferSession {
            stream,
            endpoint: self.endpoint.clone(),
        })
    }

    /// Send `source`, then optionally read the reply into `response_path`.
    ///
    /// The session is closed on every path, including errors in either phase.
    pub async fn transfer(
        &self,
        source: TransferSource,
        response_path: Option<&Path>,
    ) -> Result<TransferReport> {
        let mut session = self.open_session().await?;
        let result = Self::exchange(&mut session, &source, response_path).await;
        session.close();
        result
    }

    async fn exchange(
        session: &mut TransferSession,
        source: &TransferSource,
        response_path: Option<&Path>,
    ) -> Result<TransferReport> {
        let bytes_sent = session.send(source).await?;
        session.finish_sending().await?;
        debug!("Sent {} bytes to {}", bytes_sent, session.endpoint);

        let mut report = TransferReport {
            bytes_sent,
            ..TransferReport::default()
        };
        if let Some(path) = response_path {
            report.bytes_received = session.receive_into(path).await?;
            report.response_path = Some(path.to_path_buf());
        }
        Ok(report)
    }

    /// Stream a file to the server without reading any reply.
    pub async fn send_file(&self, path: &Path) -> Result<TransferReport> {
        let report = self
            .transfer(TransferSource::File(path.to_path_buf()), None)
            .await?;
        info!("File sent to the server successfully.");
        Ok(report)
    }

    /// Send `buffer`, then write the server's reply to `response_path`.
    pub async fn send_buffer_and_receive(
        &self,
        buffer: impl Into<Bytes>,
        response_path: &Path,
    ) -> Result<TransferReport> {
        let report = self
            .transfer(TransferSource::Buffer(buffer.into()), Some(response_path))
            .await?;
        info!("Data buffer sent to the server successfully.");
        info!(
            "Response received from server and written to {}.",
            response_path.display()
        );
        Ok(report)
    }

    /// `send_file` that logs failures instead of returning them.
    pub async fn send_file_logged(&self, path: &Path) -> Option<TransferReport> {
        match self.send_file(path).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Failed to send file to server: {}", e);
                None
            }
        }
    }

    /// `send_buffer_and_receive` that logs failures instead of returning them.
    pub async fn send_buffer_logged(
        &self,
        buffer: impl Into<Bytes>,
        response_path: &Path,
    ) -> Option<TransferReport> {
        match self.send_buffer_and_receive(buffer, response_path).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Failed to communicate with server: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("127.0.0.1", port))
    }

    #[tokio::test]
    async fn test_send_file_streams_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("params.dat");
        // Spans several chunks
        let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &payload).unwrap();

        let (listener, endpoint) = listener().await;
        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            conn.read_to_end(&mut received).await.unwrap();
            received
        });

        let report = TransferClient::new(endpoint).send_file(&path).await.unwrap();

        assert_eq!(report.bytes_sent, 3000);
        assert_eq!(report.response_path, None);
        assert_eq!(server.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on
        let (listener, endpoint) = listener().await;
        drop(listener);

        let client = TransferClient::new(endpoint);
        let err = client
            .send_buffer_and_receive(Bytes::from_static(b"abc"), Path::new("unused.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_logged_wrappers_swallow_errors() {
        let (listener, endpoint) = listener().await;
        drop(listener);
        let temp_dir = TempDir::new().unwrap();

        let client = TransferClient::new(endpoint);
        assert!(client
            .send_file_logged(&temp_dir.path().join("params.dat"))
            .await
            .is_none());
        assert!(client
            .send_buffer_logged(Bytes::from_static(b"abc"), &temp_dir.path().join("out.bin"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_source_file() {
        let (listener, endpoint) = listener().await;
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        let temp_dir = TempDir::new().unwrap();

        let err = TransferClient::new(endpoint)
            .send_file(&temp_dir.path().join("absent.dat"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_response_file_truncated() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("sequence.bin");
        std::fs::write(&out, b"stale content that is much longer than the reply").unwrap();

        let (listener, endpoint) = listener().await;
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut sink = Vec::new();
            conn.read_to_end(&mut sink).await.unwrap();
            conn.write_all(b"ok").await.unwrap();
            conn.shutdown().await.unwrap();
        });

        let report = TransferClient::new(endpoint)
            .send_buffer_and_receive(Bytes::from_static(b"x"), &out)
            .await
            .unwrap();

        assert_eq!(report.bytes_received, 2);
        assert_eq!(std::fs::read(&out).unwrap(), b"ok");
    }
}
