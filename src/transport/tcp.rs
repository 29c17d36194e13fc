// src/transport/tcp.rs
//! Per-record TCP delivery

use crate::error::{BridgeError, Result};
use crate::gps::GgaFix;
use crate::transport::Transport;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a fresh connection for every record and closes it right after the
/// write. A failed delivery is reported to the caller; the next record
/// starts over with a clean connection attempt.
pub struct TcpTransport {
    target: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn format_payload(&self, fix: &GgaFix, _raw_line: &str) -> String {
        fix.to_record()
    }

    async fn send(&mut self, payload: &str) -> Result<()> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(&self.target))
            .await
            .map_err(|_| {
                BridgeError::Connection(format!("Connection to {} timed out", self.target))
            })?
            .map_err(|e| {
                BridgeError::Connection(format!("Failed to connect to {}: {}", self.target, e))
            })?;

        stream.write_all(payload.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn close(&mut self) {
        // No persistent state to release
    }
}
