// src/lib.rs
//! GPS Bridge Library
//!
//! Reads NMEA GGA sentences from a serial-connected GPS receiver and
//! forwards position fixes to a remote endpoint, surviving transport
//! failures without losing the read loop.

pub mod bridge;
pub mod config;
pub mod error;
pub mod gps;
pub mod transport;

// Re-export main types for convenience
pub use bridge::{BridgeStats, GpsBridge};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use gps::data::GgaFix;
pub use transport::{TcpTransport, Transport, WsTransport};
