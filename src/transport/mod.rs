// src/transport/mod.rs
//! Outbound delivery capability and its two realizations

pub mod tcp;
pub mod ws;

use crate::error::Result;
use crate::gps::GgaFix;
use async_trait::async_trait;

pub use tcp::TcpTransport;
pub use ws::{append_device_id, WsTransport};

/// One outbound delivery channel.
///
/// Two realizations exist: a connection-per-record TCP sender and a
/// persistent WebSocket session with internal retry. The bridge picks one at
/// startup and drives it through this interface, so the mode never branches
/// inside the forwarding loop.
#[async_trait]
pub trait Transport: Send {
    /// Build the wire payload for one accepted sentence. Each transport
    /// defines its own format.
    fn format_payload(&self, fix: &GgaFix, raw_line: &str) -> String;

    /// Deliver one payload. A per-record transport reports failure to the
    /// caller and performs no retry; a persistent transport retries
    /// internally and returns early only when asked to stop.
    async fn send(&mut self, payload: &str) -> Result<()>;

    /// Release any open connection.
    async fn close(&mut self);
}
