//! Waiting for an input file to finish being written.
//!
//! "Finished" is a heuristic: the file's size is sampled twice, `interval`
//! apart, and must be non-zero and unchanged. The watch loop retries that
//! check until it passes; without a token it waits forever.

use crate::cancel::CancellationToken;
use crate::error::{RelayError, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Two size observations of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityCheck {
    pub path: PathBuf,
    pub interval: Duration,
    pub first_size: u64,
    pub second_size: u64,
}

impl StabilityCheck {
    pub fn is_stable(&self) -> bool {
        self.first_size == self.second_size && self.first_size > 0
    }
}

/// Size-based file stability detection.
pub struct FileStabilityWatcher;

impl FileStabilityWatcher {
    /// Sample the size of `path`, sleep `interval`, sample again.
    ///
    /// Fails if either sample cannot be taken (e.g. the file was deleted
    /// between the two reads).
    pub async fn check(path: &Path, interval: Duration) -> Result<StabilityCheck> {
        let first_size = file_size(path).await?;
        tokio::time::sleep(interval).await;
        let second_size = file_size(path).await?;

        debug!(
            "Stability check {}: {} -> {} bytes",
            path.display(),
            first_size,
            second_size
        );

        Ok(StabilityCheck {
            path: path.to_path_buf(),
            interval,
            first_size,
            second_size,
        })
    }

    /// Whether `path` looks fully written. Never fails.
    pub async fn is_complete(path: &Path, interval: Duration) -> bool {
        match Self::check(path, interval).await {
            Ok(check) => check.is_stable(),
            Err(e) => {
                debug!("Stability check failed for {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Block until `path` is complete, then run `on_ready` once.
    ///
    /// Waits indefinitely.
    pub async fn watch<F, Fut, T>(path: &Path, interval: Duration, on_ready: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            if Self::poll_once(path, interval).await {
                info!("File detected and is ready: {}", path.display());
                return on_ready().await;
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// As `watch`, but stops with `Cancelled`/`DeadlineExceeded` once `token`
    /// fires. A token that fires while `on_ready` is still running drops it
    /// mid-flight.
    pub async fn watch_with<F, Fut, T>(
        path: &Path,
        interval: Duration,
        token: &CancellationToken,
        on_ready: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            token.check()?;

            if Self::poll_once(path, interval).await {
                info!("File detected and is ready: {}", path.display());
                return tokio::select! {
                    value = on_ready() => Ok(value),
                    e = token.cancelled() => Err(e.into()),
                };
            }

            // Never sleep past the deadline
            let pause = match token.remaining() {
                Some(left) => interval.min(left),
                None => interval,
            };
            tokio::time::sleep(pause).await;
        }
    }

    async fn poll_once(path: &Path, interval: Duration) -> bool {
        let exists = tokio::fs::try_exists(path).await.unwrap_or(false);
        exists && Self::is_complete(path, interval).await
    }
}

async fn file_size(path: &Path) -> Result<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(|e| RelayError::io_with_path(e, path))
}
