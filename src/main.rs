//! CLI entry point for treadmill-monitor
//!
//! Runs a capture session against the real serial ports and polls it the
//! way a tracking host does, once per simulated frame.
//!
//! # Usage
//!
//! ```bash
//! treadmill-monitor --list
//! treadmill-monitor --device "USB-SERIAL CH340" --baud 9600 --csv run.csv
//! TREADMILL_BAUD_RATE=115200 treadmill-monitor --duration-secs 30
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use treadmill_capture::discovery::{list_ports, normalized_port};
use treadmill_capture::hardware::SystemSerial;
use treadmill_capture::recorder::SampleRecorder;
use treadmill_capture::{CaptureSettings, TreadmillDriver};

#[derive(Parser)]
#[command(name = "treadmill-monitor")]
#[command(about = "Capture and monitor load-cell treadmill samples", long_about = None)]
struct Cli {
    /// List serial devices and exit
    #[arg(long)]
    list: bool,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Optional settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Substring of the device name to connect to
    #[arg(long)]
    device: Option<String>,

    /// Serial speed
    #[arg(long)]
    baud: Option<u32>,

    /// Host frame rate to poll at
    #[arg(long, default_value = "90")]
    rate_hz: f64,

    /// Record every polled sample to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn settings(&self) -> Result<CaptureSettings> {
        let mut settings = match &self.config {
            Some(path) => CaptureSettings::load_from(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => CaptureSettings::load().context("Failed to load settings")?,
        };
        if let Some(device) = &self.device {
            settings.device_name_substring = device.clone();
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str())),
        )
        .init();

    if cli.list {
        return list_devices();
    }

    let settings = cli.settings()?;
    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    monitor(&cli, settings).await
}

fn list_devices() -> Result<()> {
    let ports = list_ports(&SystemSerial::new());
    if ports.is_empty() {
        println!("No serial devices found");
        return Ok(());
    }

    for port in &ports {
        let ids = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!(" [{:04x}:{:04x}]", vid, pid),
            _ => String::new(),
        };
        println!("{:<12} {}{}", normalized_port(port), port.name, ids);
    }
    Ok(())
}

async fn monitor(cli: &Cli, settings: CaptureSettings) -> Result<()> {
    if !(cli.rate_hz.is_finite() && cli.rate_hz > 0.0) {
        bail!("--rate-hz must be a positive number, got {}", cli.rate_hz);
    }

    let mut recorder = match &cli.csv {
        Some(path) => Some(
            SampleRecorder::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => None,
    };

    let driver = TreadmillDriver::new(settings);
    driver.start_capture()?;

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / cli.rate_hz));
    let deadline = cli
        .duration_secs
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut last_connected = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Ctrl+C received, stopping");
                break;
            }
            _ = ticker.tick() => {
                let snapshot = driver.snapshot();
                if last_connected != Some(snapshot.connected) {
                    println!(
                        "{}",
                        if snapshot.connected { "connected" } else { "waiting for device" }
                    );
                    last_connected = Some(snapshot.connected);
                }
                if let Some(recorder) = recorder.as_mut() {
                    recorder.record(snapshot)?;
                }
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
            }
        }
    }

    // stop joins the capture thread, which may sit in a serial read
    let driver = tokio::task::spawn_blocking(move || driver.stop_capture().map(|()| driver))
        .await
        .context("Capture shutdown task failed")??;
    if let Some(recorder) = recorder {
        let rows = recorder.rows();
        recorder.finish()?;
        println!("Recorded {} samples", rows);
    }
    println!("Last sample: {}", driver.get_sample());
    Ok(())
}
