// src/transport/ws.rs
//! Persistent WebSocket delivery with automatic reconnection

use crate::error::{BridgeError, Result};
use crate::gps::GgaFix;
use crate::transport::Transport;
use async_trait::async_trait;
use futures_util::SinkExt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, Connector, MaybeTlsStream,
    WebSocketStream,
};
use tracing::{info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Append the device identifier to the endpoint URL as a query parameter.
pub fn append_device_id(url: &str, device_id: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}id={}", url, separator, device_id)
}

/// Maintains at most one open WebSocket connection and retries a failed
/// delivery indefinitely with a fixed delay between attempts. The stop flag
/// is checked before every attempt, so a shutdown request is observed within
/// one reconnect delay.
pub struct WsTransport {
    url: String,
    line_prefix: Option<String>,
    ignore_ssl: bool,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    running: Arc<AtomicBool>,
    stream: Option<WsStream>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, running: Arc<AtomicBool>) -> Self {
        Self {
            url: url.into(),
            line_prefix: None,
            ignore_ssl: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            running,
            stream: None,
        }
    }

    /// Token prepended to every forwarded sentence.
    pub fn with_line_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.line_prefix = Some(prefix.into());
        self
    }

    /// Skip TLS certificate validation (self-signed endpoints).
    pub fn with_ignore_ssl(mut self, ignore_ssl: bool) -> Self {
        self.ignore_ssl = ignore_ssl;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    async fn connect(&self) -> Result<WsStream> {
        let connector = if self.ignore_ssl {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .build()?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let connect = connect_async_tls_with_config(self.url.as_str(), None, false, connector);
        match timeout(self.connect_timeout, connect).await {
            Ok(Ok((stream, _response))) => Ok(stream),
            Ok(Err(e)) => Err(BridgeError::WebSocket(e)),
            Err(_) => Err(BridgeError::Connection(format!(
                "Connection to {} timed out",
                self.url
            ))),
        }
    }

    async fn discard_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close(None).await.ok();
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn format_payload(&self, _fix: &GgaFix, raw_line: &str) -> String {
        match &self.line_prefix {
            Some(prefix) => format!("{} {}", prefix, raw_line),
            None => raw_line.to_string(),
        }
    }

    async fn send(&mut self, payload: &str) -> Result<()> {
        loop {
            if !self.is_running() {
                return Err(BridgeError::Interrupted);
            }

            if self.stream.is_none() {
                match self.connect().await {
                    Ok(stream) => {
                        info!("WebSocket connection to {} open", self.url);
                        self.stream = Some(stream);
                    }
                    Err(e) => {
                        warn!(
                            "WebSocket connect failed ({}), retrying in {}s",
                            e,
                            self.reconnect_delay.as_secs()
                        );
                        sleep(self.reconnect_delay).await;
                        continue;
                    }
                }
            }

            if let Some(stream) = self.stream.as_mut() {
                match stream.send(Message::Text(payload.to_string())).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        warn!(
                            "WebSocket send failed ({}), reconnecting in {}s",
                            e,
                            self.reconnect_delay.as_secs()
                        );
                        self.discard_stream().await;
                        sleep(self.reconnect_delay).await;
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        self.discard_stream().await;
    }
}
