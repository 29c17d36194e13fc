// src/bridge.rs
//! The serial-to-network forwarding loop

use crate::{
    error::{BridgeError, Result},
    gps::{
        data::GgaFix,
        nmea::{self, GgaRejection},
    },
    transport::Transport,
};
use chrono::{DateTime, Utc};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(50);

/// Counters and last-seen state exposed to observers while the loop runs.
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    pub forwarded: u64,
    pub no_fix: u64,
    pub malformed: u64,
    pub send_failures: u64,
    pub last_fix: Option<GgaFix>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Reads lines from a GPS source, parses GGA sentences and hands accepted
/// fixes to the configured transport. A transport failure never stops the
/// read loop; only a source failure or an explicit stop ends it.
pub struct GpsBridge {
    stats: Arc<RwLock<BridgeStats>>,
    running: Arc<AtomicBool>,
    idle_delay: Duration,
}

impl GpsBridge {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(BridgeStats::default())),
            running: Arc::new(AtomicBool::new(true)),
            idle_delay: DEFAULT_IDLE_DELAY,
        }
    }

    /// Delay between empty polls of the line source. Bounds how long a stop
    /// request can go unnoticed while the source is quiet.
    pub fn with_idle_delay(mut self, idle_delay: Duration) -> Self {
        self.idle_delay = idle_delay;
        self
    }

    /// The shared stop flag; clearing it winds the loop down at the next
    /// suspension point.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Request the loop to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Check if the bridge is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get a snapshot of the current counters
    pub fn stats(&self) -> BridgeStats {
        self.stats.read().unwrap().clone()
    }

    /// Open the serial port and forward sentences until stopped.
    pub async fn run_serial(
        &self,
        port: &str,
        baudrate: u32,
        transport: &mut dyn Transport,
    ) -> Result<()> {
        info!("Connecting to GPS on {} at {} baud", port, baudrate);

        let serial = tokio_serial::new(port, baudrate)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| {
                BridgeError::Connection(format!("Failed to open serial port {}: {}", port, e))
            })?;

        self.run(BufReader::new(serial), transport).await
    }

    /// Forward GGA sentences from any buffered line source until the source
    /// ends or `stop` is called.
    ///
    /// Returns `Ok(())` on a stop request. A source failure (EOF or a read
    /// error, e.g. the device disconnected) is fatal and propagates; there
    /// is nothing left to forward.
    pub async fn run<R>(&self, reader: R, transport: &mut dyn Transport) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();

        while self.running.load(Ordering::Relaxed) {
            // next_line is cancel safe, so an idle timeout cannot lose a
            // partially received sentence
            let line = match timeout(self.idle_delay, lines.next_line()).await {
                Err(_) => continue, // nothing available yet, re-check the stop flag
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => {
                    transport.close().await;
                    return Err(BridgeError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "line source closed",
                    )));
                }
                Ok(Err(e)) => {
                    transport.close().await;
                    return Err(BridgeError::Io(e));
                }
            };

            let line = line.trim();
            if line.is_empty() || !nmea::is_gga_sentence(line) {
                continue;
            }

            let fix = match nmea::parse_gga(line) {
                Ok(fix) => fix,
                Err(GgaRejection::NoFix) => {
                    info!("Waiting for GPS signal (no fix)");
                    let mut stats = self.stats.write().unwrap();
                    stats.no_fix += 1;
                    stats.last_update = Some(Utc::now());
                    continue;
                }
                Err(GgaRejection::Malformed) => {
                    debug!("Discarding malformed sentence: {}", line);
                    self.stats.write().unwrap().malformed += 1;
                    continue;
                }
            };

            let payload = transport.format_payload(&fix, line);
            match transport.send(&payload).await {
                Ok(()) => {
                    debug!(
                        "Forwarded fix: {:.6} {:.6} alt {:.1} sats {} quality {}",
                        fix.latitude, fix.longitude, fix.altitude, fix.satellites, fix.quality
                    );
                    let mut stats = self.stats.write().unwrap();
                    stats.forwarded += 1;
                    stats.last_fix = Some(fix);
                    stats.last_update = Some(Utc::now());
                }
                Err(BridgeError::Interrupted) => {
                    debug!("Send interrupted by stop request");
                }
                Err(e) => {
                    // A failed delivery never stops the read loop; the next
                    // sentence gets a fresh attempt
                    warn!("Send failed: {}", e);
                    self.stats.write().unwrap().send_failures += 1;
                }
            }
        }

        transport.close().await;
        Ok(())
    }
}

impl Default for GpsBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// List available serial ports
pub fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| BridgeError::Other(format!("Failed to list serial ports: {}", e)))?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    const FIX_LINE_1: &str = "$GNGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,,,,";
    const FIX_LINE_2: &str = "$GNGGA,123520,4807.100,N,01131.050,E,1,08,0.9,545.6,M,,,,";
    const FIX_LINE_3: &str = "$GNGGA,123521,4807.162,N,01131.100,E,2,09,0.8,545.8,M,,,,";
    const NO_FIX_LINE: &str = "$GNGGA,123519,,,,,,,,,,,,";

    struct MockTransport {
        sent: Vec<String>,
        fail_remaining: usize,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                fail_remaining: 0,
            }
        }

        fn failing_first(count: usize) -> Self {
            Self {
                sent: Vec::new(),
                fail_remaining: count,
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn format_payload(&self, fix: &GgaFix, _raw_line: &str) -> String {
            fix.to_record()
        }

        async fn send(&mut self, payload: &str) -> Result<()> {
            if self.fail_remaining > 0 {
                self.fail_remaining -= 1;
                return Err(BridgeError::Connection("simulated failure".to_string()));
            }
            self.sent.push(payload.to_string());
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn reader(lines: &[&str]) -> BufReader<std::io::Cursor<Vec<u8>>> {
        let mut data = String::new();
        for line in lines {
            data.push_str(line);
            data.push_str("\r\n");
        }
        BufReader::new(std::io::Cursor::new(data.into_bytes()))
    }

    fn expect_source_closed(result: Result<()>) {
        match result {
            Err(BridgeError::Io(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof)
            }
            other => panic!("expected source failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_payloads_keep_source_order() {
        let bridge = GpsBridge::new();
        let mut transport = MockTransport::new();

        let result = bridge
            .run(reader(&[FIX_LINE_1, FIX_LINE_2, FIX_LINE_3]), &mut transport)
            .await;

        expect_source_closed(result);
        assert_eq!(transport.sent.len(), 3);
        assert!(transport.sent[0].starts_with("48.117300;"));
        assert!(transport.sent[1].starts_with("48.118333;"));
        assert!(transport.sent[2].starts_with("48.119367;"));
        assert_eq!(bridge.stats().forwarded, 3);
    }

    #[tokio::test]
    async fn test_no_fix_produces_no_payload() {
        let bridge = GpsBridge::new();
        let mut transport = MockTransport::new();

        let result = bridge.run(reader(&[NO_FIX_LINE]), &mut transport).await;

        expect_source_closed(result);
        assert!(transport.sent.is_empty());
        let stats = bridge.stats();
        assert_eq!(stats.no_fix, 1);
        assert_eq!(stats.forwarded, 0);
    }

    #[tokio::test]
    async fn test_malformed_and_foreign_lines_are_skipped() {
        let bridge = GpsBridge::new();
        let mut transport = MockTransport::new();

        let lines = [
            FIX_LINE_1,
            "$GNGGA,123519,48xx.038,N,01131.000,E,1,08,0.9,545.4,M,,,,",
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,,",
            "",
            FIX_LINE_2,
        ];
        let result = bridge.run(reader(&lines), &mut transport).await;

        expect_source_closed(result);
        assert_eq!(transport.sent.len(), 2);
        let stats = bridge.stats();
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.forwarded, 2);
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_the_loop() {
        let bridge = GpsBridge::new();
        let mut transport = MockTransport::failing_first(1);

        let result = bridge
            .run(reader(&[FIX_LINE_1, FIX_LINE_2]), &mut transport)
            .await;

        expect_source_closed(result);
        assert_eq!(transport.sent.len(), 1);
        assert!(transport.sent[0].starts_with("48.118333;"));
        let stats = bridge.stats();
        assert_eq!(stats.send_failures, 1);
        assert_eq!(stats.forwarded, 1);
    }

    #[tokio::test]
    async fn test_stop_request_ends_an_idle_loop() {
        let bridge = GpsBridge::new().with_idle_delay(Duration::from_millis(10));
        let mut transport = MockTransport::new();

        // A source that stays open but never produces a line
        let (_writer, source) = tokio::io::duplex(64);

        let running = bridge.running_flag();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            running.store(false, Ordering::Relaxed);
        });

        let result = bridge.run(BufReader::new(source), &mut transport).await;

        assert!(result.is_ok());
        assert!(transport.sent.is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_is_a_source_failure() {
        let bridge = GpsBridge::new();
        let mut transport = MockTransport::new();

        let result = bridge.run(reader(&[]), &mut transport).await;

        expect_source_closed(result);
    }
}
