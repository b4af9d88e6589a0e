//! 433 MHz weather station capture
//!
//! Reads OOK bit captures from an external demodulator (or a replay
//! file), runs them through the AOK-5055 frame pipeline, tracks stations
//! by device identifier, and writes accepted readings as JSON lines.

mod aok5055;
mod bitbuffer;
mod config;
mod ook;
mod station_tracker;

use anyhow::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use aok5055::{Reject, SensorReading};
use config::Config;
use ook::{OokCapture, OokConfig};
use station_tracker::StationTracker;

/// One accepted reading as emitted to the sink.
#[derive(serde::Serialize)]
struct ReadingEvent {
    timestamp_ms: u64,
    #[serde(flatten)]
    reading: SensorReading,
}

/// Rejection counters, one per reason.
#[derive(Debug, Default)]
struct RejectCounters {
    preamble_not_found: u64,
    insufficient_bits: u64,
    repeat_mismatch: u64,
}

impl RejectCounters {
    fn count(&mut self, reject: Reject) {
        match reject {
            Reject::PreambleNotFound => self.preamble_not_found += 1,
            Reject::InsufficientBits => self.insufficient_bits += 1,
            Reject::RepeatMismatch { .. } => self.repeat_mismatch += 1,
        }
    }

    fn total(&self) -> u64 {
        self.preamble_not_found + self.insufficient_bits + self.repeat_mismatch
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("===========================================");
    info!("   AOK-5055 Capture - 433 MHz OOK decoder");
    info!("===========================================");

    let config = Config::from_env();

    info!("Configuration:");
    if let Some(path) = &config.replay_path {
        info!("  Replay file: {:?}", path);
    } else {
        info!("  Demodulator: {:?}", config.demod_path);
        info!("  Device index: {}", config.device_index);
        info!("  Frequency: {} MHz", config.frequency_hz as f64 / 1e6);
        info!("  Sample rate: {} kHz", config.sample_rate / 1000);
        info!("  Gain: {} dB", config.gain_db);
        info!("  PPM error: {}", config.ppm_error);
    }
    match &config.readings_path {
        Some(path) => info!("  Readings sink: {:?}", path),
        None => info!("  Readings sink: stdout"),
    }

    // Sink task for accepted readings
    let (reading_tx, reading_rx) = mpsc::channel::<ReadingEvent>(1000);
    let readings_path = config.readings_path.clone();
    let sink_handle = tokio::spawn(async move {
        if let Err(e) = run_sink(reading_rx, readings_path).await {
            error!("Reading sink failed: {}", e);
        }
    });

    // Start the capture source
    let ook_config = OokConfig {
        device_index: config.device_index,
        frequency_hz: config.frequency_hz,
        sample_rate: config.sample_rate,
        gain: (config.gain_db * 10.0) as i32,
        ppm_error: config.ppm_error,
        demod_path: config.demod_path.to_string_lossy().to_string(),
        replay_path: config.replay_path.clone(),
    };
    let capture = OokCapture::new(ook_config);
    let capture_rx = match capture.start() {
        Ok(rx) => rx,
        Err(e) => {
            error!("Failed to start OOK capture: {}", e);
            return Err(e);
        }
    };

    info!("Waiting for captures...");

    let mut tracker = StationTracker::new(16);
    let mut rejects = RejectCounters::default();
    let mut captures_processed = 0u64;
    let mut readings_accepted = 0u64;
    let mut last_stats_report = Instant::now();

    loop {
        match capture_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(bit_capture) => {
                captures_processed += 1;

                match aok5055::decode(&bit_capture) {
                    Ok(reading) => {
                        readings_accepted += 1;
                        info!(
                            ">>> READING: id={:02X} {:.1} C {} % wind {} {} km/h rain {:.2} mm [{:?}] *{}",
                            reading.id,
                            reading.temperature_c,
                            reading.humidity_pct,
                            reading.wind_direction.trim(),
                            reading.wind_speed_kmh,
                            reading.rain_mm,
                            reading.battery,
                            reading.raw
                        );

                        if let Some(state) = tracker.update(&reading) {
                            debug!(
                                "Station {:02X}: {} readings, {:.2} mm rain this session",
                                state.id,
                                state.readings,
                                state.rain_since_first_seen_mm()
                            );
                        }

                        let event = ReadingEvent {
                            timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
                            reading,
                        };
                        if let Err(e) = reading_tx.send(event).await {
                            warn!("Failed to queue reading event: {}", e);
                        }
                    }
                    Err(reject) => {
                        rejects.count(reject);
                        debug!("Capture rejected: {}", reject);
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // No capture; fall through to periodic reporting.
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                info!("Capture channel closed");
                break;
            }
        }

        if last_stats_report.elapsed() >= Duration::from_secs(config.stats_interval_secs) {
            let stats = capture.stats();
            info!(
                "[Pipeline] Captures: {} (parse errors: {}) | Accepted: {} | Rejected: {} (no preamble: {}, short: {}, mismatch: {}) | {}",
                stats.captures_read.load(std::sync::atomic::Ordering::Relaxed),
                stats.parse_errors.load(std::sync::atomic::Ordering::Relaxed),
                readings_accepted,
                rejects.total(),
                rejects.preamble_not_found,
                rejects.insufficient_bits,
                rejects.repeat_mismatch,
                tracker.stats_summary()
            );
            last_stats_report = Instant::now();
        }

        if !capture.is_running() && capture_rx.is_empty() {
            break;
        }
    }

    capture.stop();

    // Close the sink and let it flush queued events.
    drop(reading_tx);
    let _ = sink_handle.await;

    info!(
        "Shutdown complete. Captures: {}, accepted: {}, rejected: {}",
        captures_processed,
        readings_accepted,
        rejects.total()
    );
    Ok(())
}

/// Write reading events as JSON lines to a file or stdout.
async fn run_sink(
    mut reading_rx: mpsc::Receiver<ReadingEvent>,
    path: Option<PathBuf>,
) -> Result<()> {
    let mut out: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = match path {
        Some(path) => Box::new(
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    while let Some(event) = reading_rx.recv().await {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
    Ok(())
}
