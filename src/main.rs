// src/main.rs
//! GPS Bridge - forwards serial NMEA GGA fixes to a network endpoint

use clap::Parser;
use gps_bridge::{
    bridge::{list_serial_ports, GpsBridge},
    transport::{append_device_id, TcpTransport, Transport, WsTransport},
    BridgeConfig,
};
use std::sync::{atomic::Ordering, Arc};
use tracing::info;

#[derive(Parser)]
#[command(name = "gps-bridge")]
#[command(about = "Serial-to-network NMEA GGA bridge")]
struct Args {
    /// Serial port of the GPS receiver (e.g. COM6 or /dev/ttyUSB0)
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baudrate: Option<u32>,

    /// Delivery mode: "tcp" (one connection per record) or "ws" (persistent)
    #[arg(long)]
    mode: Option<String>,

    /// TCP target as host:port (tcp mode)
    #[arg(long)]
    tcp_target: Option<String>,

    /// WebSocket endpoint URL (ws mode)
    #[arg(long)]
    url: Option<String>,

    /// GPS identifier appended to the endpoint URL (?id=)
    #[arg(long)]
    device_id: Option<String>,

    /// Optional token prepended to every forwarded sentence
    #[arg(long)]
    prefix: Option<String>,

    /// Disable TLS certificate validation (self-signed endpoints)
    #[arg(long)]
    ignore_ssl: bool,

    /// Delay between empty reads of the source, in milliseconds
    #[arg(long)]
    idle_delay_ms: Option<u64>,

    /// Delay between reconnect attempts, in seconds
    #[arg(long)]
    reconnect_delay_secs: Option<u64>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Write the effective configuration to disk and exit
    #[arg(long)]
    save_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn apply_overrides(config: &mut BridgeConfig, args: &Args) {
    if let Some(port) = &args.port {
        config.serial_port = port.clone();
    }
    if let Some(baudrate) = args.baudrate {
        config.baudrate = baudrate;
    }
    if let Some(mode) = &args.mode {
        config.mode = mode.clone();
    }
    if let Some(target) = &args.tcp_target {
        config.tcp_target = target.clone();
    }
    if let Some(url) = &args.url {
        config.ws_url = url.clone();
    }
    if let Some(device_id) = &args.device_id {
        config.device_id = device_id.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.line_prefix = Some(prefix.clone());
    }
    if args.ignore_ssl {
        config.ignore_ssl = true;
    }
    if let Some(idle) = args.idle_delay_ms {
        config.idle_delay_ms = idle;
    }
    if let Some(delay) = args.reconnect_delay_secs {
        config.reconnect_delay_secs = delay;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if args.debug { "debug" } else { "info" })
            }),
        )
        .init();

    if args.list_ports {
        list_serial_ports()?;
        return Ok(());
    }

    let mut config = BridgeConfig::load().unwrap_or_default();
    apply_overrides(&mut config, &args);

    if args.save_config {
        config.save()?;
        info!("Configuration saved");
        return Ok(());
    }

    let bridge = GpsBridge::new().with_idle_delay(config.idle_delay());
    let running = bridge.running_flag();

    // Ctrl+C clears the stop flag; the loop winds down at its next
    // suspension point
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    let mut transport: Box<dyn Transport> = match config.mode.as_str() {
        "tcp" => Box::new(
            TcpTransport::new(config.tcp_target.clone())
                .with_connect_timeout(config.tcp_connect_timeout()),
        ),
        "ws" => {
            let url = append_device_id(&config.ws_url, &config.device_id);
            let mut transport = WsTransport::new(url, Arc::clone(&running))
                .with_connect_timeout(config.ws_connect_timeout())
                .with_reconnect_delay(config.reconnect_delay())
                .with_ignore_ssl(config.ignore_ssl);
            if let Some(prefix) = config.line_prefix.clone() {
                transport = transport.with_line_prefix(prefix);
            }
            Box::new(transport)
        }
        other => anyhow::bail!("Unknown mode '{}': expected 'tcp' or 'ws'", other),
    };

    let target = match config.mode.as_str() {
        "tcp" => config.tcp_target.clone(),
        _ => config.ws_url.clone(),
    };
    info!(
        "Forwarding GGA sentences from {} at {} baud to {} ({} mode)",
        config.serial_port, config.baudrate, target, config.mode
    );

    let result = bridge
        .run_serial(&config.serial_port, config.baudrate, transport.as_mut())
        .await;

    let stats = bridge.stats();
    info!(
        "Forwarded {} fixes ({} without fix, {} malformed, {} failed sends)",
        stats.forwarded, stats.no_fix, stats.malformed, stats.send_failures
    );

    result?;
    Ok(())
}
