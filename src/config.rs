//! Configuration loaded from environment variables

use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the OOK demodulator executable
    pub demod_path: PathBuf,

    /// RTL-SDR device index
    pub device_index: u32,

    /// Tuner frequency in Hz
    pub frequency_hz: u32,

    /// Demodulator sample rate in Hz
    pub sample_rate: u32,

    /// Tuner gain in dB (use 0 for auto)
    pub gain_db: f32,

    /// PPM frequency correction
    pub ppm_error: i32,

    /// Replay captures from this file instead of live capture
    pub replay_path: Option<PathBuf>,

    /// Write accepted readings here as JSON lines (stdout if unset)
    pub readings_path: Option<PathBuf>,

    /// Pipeline statistics reporting interval in seconds
    pub stats_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            demod_path: std::env::var("OOK_DEMOD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("ook_demod")),

            device_index: std::env::var("DEVICE_INDEX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),

            frequency_hz: std::env::var("FREQUENCY_HZ")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(433_920_000),

            sample_rate: std::env::var("SAMPLE_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(250_000),

            gain_db: std::env::var("DEVICE_GAIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),

            ppm_error: std::env::var("PPM_ERROR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),

            replay_path: std::env::var("REPLAY_PATH").ok().map(PathBuf::from),

            readings_path: std::env::var("READINGS_PATH").ok().map(PathBuf::from),

            stats_interval_secs: std::env::var("STATS_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}
