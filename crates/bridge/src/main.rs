//! carlink bridge
//!
//! Attaches the USB link to a carlink dongle and drives a projection
//! session: performs session init when the dongle reports ready, logs
//! media statistics, and optionally dumps the H.264 elementary stream for
//! offline inspection.

mod config;
mod sink;

use std::fs::File;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use link::transport::usb::UsbTransport;
use link::Link;
use protocol::{ManufacturerInfo, Message, Open, SendFile};
use tokio::signal;
use tracing::{error, info};

use config::BridgeConfig;
use sink::BridgeSink;

#[derive(Parser, Debug)]
#[command(name = "carlink-bridge")]
#[command(
    author,
    version,
    about = "carlink bridge - drive a CarPlay dongle over USB"
)]
#[command(long_about = "
Attaches to a carlink USB dongle, opens a projection session, and streams
its media callbacks into logs. The link reconnects automatically when the
dongle is unplugged and replugged.

EXAMPLES:
    # Run with default config
    carlink-bridge

    # Run with custom config and debug logging
    carlink-bridge --config /path/to/bridge.toml --log-level debug

    # Save the H.264 elementary stream while the session runs
    carlink-bridge --dump-video session.h264

CONFIGURATION:
    The bridge looks for configuration in the following order:
    1. Path specified with --config
    2. ~/.config/carlink/bridge.toml
    3. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to the default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Write the raw H.264 elementary stream to this file
    #[arg(long, value_name = "PATH")]
    dump_video: Option<std::path::PathBuf>,
}

/// Push the session-init sequence the dongle expects after attach
fn send_session_init(link: &Link, config: &BridgeConfig) -> link::Result<()> {
    let display = &config.display;
    let session = &config.session;

    link.send(Message::SendFile(SendFile::with_i32(
        "/tmp/screen_dpi",
        display.dpi,
    )))?;
    link.send(Message::Open(Open {
        width: display.width,
        height: display.height,
        video_frame_rate: display.fps,
        format: 5,
        packet_max: 4_915_200,
        i_box_version: 2,
        phone_work_mode: 2,
    }))?;
    link.send(Message::ManufacturerInfo(ManufacturerInfo { a: 0, b: 0 }))?;
    link.send(Message::SendFile(SendFile::with_i32(
        "/tmp/night_mode",
        session.night_mode as i32,
    )))?;
    link.send(Message::SendFile(SendFile::with_i32(
        "/tmp/hand_drive_mode",
        session.hand_drive_mode as i32,
    )))?;
    link.send(Message::SendFile(SendFile::with_i32(
        "/tmp/charge_mode",
        session.charge_mode as i32,
    )))?;
    link.send(Message::SendFile(SendFile::with_string(
        "/tmp/box_name",
        &session.box_name,
    )))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = BridgeConfig::default();
        let path = BridgeConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        BridgeConfig::load(path).context("Failed to load configuration")?
    } else {
        BridgeConfig::load_or_default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("carlink-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "display: {}x{} @ {} fps, {} dpi",
        config.display.width, config.display.height, config.display.fps, config.display.dpi
    );

    let dump = match &args.dump_video {
        Some(path) => {
            info!("dumping H.264 stream to {}", path.display());
            Some(File::create(path).with_context(|| {
                format!("Failed to create video dump file: {}", path.display())
            })?)
        }
        None => None,
    };

    let (ready_tx, mut ready_rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = Arc::new(BridgeSink::new(ready_tx, dump));

    let transport = UsbTransport::new().context("Failed to initialise USB context")?;
    let mut link = Link::new();
    link.start(Box::new(transport), sink)
        .context("Failed to start link")?;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            Some(()) = ready_rx.recv() => {
                info!("running session init");
                if let Err(e) = send_session_init(&link, &config) {
                    error!("session init failed: {}", e);
                }
            }
        }
    }

    link.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{wait_until, DEFAULT_TEST_TIMEOUT};
    use link::transport::mock::MockTransport;
    use link::NullEvents;
    use protocol::marshal;

    #[test]
    fn test_session_init_sequence_and_order() {
        let (transport, control) = MockTransport::new();
        let mut link = Link::new();
        link.start(Box::new(transport), Arc::new(NullEvents)).unwrap();
        assert!(wait_until(DEFAULT_TEST_TIMEOUT, || control.open_count() == 1));

        let config = BridgeConfig::default();
        send_session_init(&link, &config).unwrap();

        let expected: Vec<u8> = [
            Message::SendFile(SendFile::with_i32("/tmp/screen_dpi", 160)),
            Message::Open(Open {
                width: 1280,
                height: 720,
                video_frame_rate: 30,
                format: 5,
                packet_max: 4_915_200,
                i_box_version: 2,
                phone_work_mode: 2,
            }),
            Message::ManufacturerInfo(ManufacturerInfo { a: 0, b: 0 }),
            Message::SendFile(SendFile::with_i32("/tmp/night_mode", 1)),
            Message::SendFile(SendFile::with_i32("/tmp/hand_drive_mode", 1)),
            Message::SendFile(SendFile::with_i32("/tmp/charge_mode", 0)),
            Message::SendFile(SendFile::with_string("/tmp/box_name", "BoxName")),
        ]
        .iter()
        .flat_map(marshal)
        .collect();

        // Heartbeats are their own 16-byte writes; everything else must be
        // the init sequence, batched in order
        let heartbeat = marshal(&Message::Heartbeat);
        assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
            let non_heartbeat: Vec<u8> = control
                .writes()
                .iter()
                .filter(|w| *w != &heartbeat)
                .flatten()
                .copied()
                .collect();
            non_heartbeat == expected
        }));

        link.stop();
    }
}
