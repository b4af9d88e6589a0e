//! OOK capture via external demodulator process
//!
//! Spawns the demodulator to tune 433.92 MHz and slice OOK pulses into
//! bit rows, one capture per output line in the form `{<bit_count>}<hex>`.
//! A replay path switches the source to a recorded file of the same
//! format. Parsed captures go to the decode loop over a bounded channel.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::bitbuffer::BitBuffer;

/// Demodulator configuration
#[derive(Clone)]
pub struct OokConfig {
    pub device_index: u32,
    pub frequency_hz: u32,
    pub sample_rate: u32,
    /// Gain in tenths of dB, 0 for auto
    pub gain: i32,
    pub ppm_error: i32,
    pub demod_path: String,
    /// Replay captures from this file instead of running the demodulator
    pub replay_path: Option<PathBuf>,
}

impl Default for OokConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            frequency_hz: 433_920_000,
            sample_rate: 250_000,
            gain: 0,
            ppm_error: 0,
            demod_path: "ook_demod".to_string(),
            replay_path: None,
        }
    }
}

/// Capture statistics (atomic for cross-thread access)
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub captures_read: AtomicU64,
    pub parse_errors: AtomicU64,
}

impl CaptureStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// Capture controller; owns the reader thread.
pub struct OokCapture {
    config: OokConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl OokCapture {
    pub fn new(config: OokConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: CaptureStats::new(),
        }
    }

    /// Start the capture source and return a receiver for bit captures.
    pub fn start(&self) -> Result<Receiver<BitBuffer>> {
        let (capture_tx, capture_rx) = bounded::<BitBuffer>(256);

        let config = self.config.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();

        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("ook-capture".to_string())
            .spawn(move || {
                let result = match config.replay_path.clone() {
                    Some(path) => run_replay(path, &running, &stats, &capture_tx),
                    None => run_live(config, &running, &stats, &capture_tx),
                };
                if let Err(e) = result {
                    error!("OOK capture error: {}", e);
                }
                running.store(false, Ordering::SeqCst);
            })
            .context("Failed to spawn capture thread")?;

        Ok(capture_rx)
    }

    pub fn stop(&self) {
        info!("Stopping OOK capture...");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &Arc<CaptureStats> {
        &self.stats
    }
}

impl Drop for OokCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Parse a demodulator output line of the form `{<bit_count>}<hex>`.
///
/// Lines that do not carry a capture (status chatter, malformed rows)
/// yield `None`.
fn parse_bit_line(line: &str) -> Option<BitBuffer> {
    let line = line.trim();
    let rest = line.strip_prefix('{')?;
    let (count, hex_str) = rest.split_once('}')?;
    let bit_len: usize = count.trim().parse().ok()?;
    let bytes = hex::decode(hex_str).ok()?;
    if bit_len == 0 || bit_len > bytes.len() * 8 {
        return None;
    }
    Some(BitBuffer::with_bit_len(&bytes, bit_len))
}

/// Live capture loop: spawn the demodulator and stream its stdout.
fn run_live(
    config: OokConfig,
    running: &AtomicBool,
    stats: &CaptureStats,
    capture_tx: &Sender<BitBuffer>,
) -> Result<()> {
    info!(
        "Starting {}: -d {} -f {} -s {} -g {:.1} -p {}",
        config.demod_path,
        config.device_index,
        config.frequency_hz,
        config.sample_rate,
        config.gain as f32 / 10.0,
        config.ppm_error
    );

    let mut cmd = Command::new(&config.demod_path);
    cmd.arg("-d")
        .arg(config.device_index.to_string())
        .arg("-f")
        .arg(config.frequency_hz.to_string())
        .arg("-s")
        .arg(config.sample_rate.to_string());
    if config.gain != 0 {
        cmd.arg("-g").arg((config.gain as f32 / 10.0).to_string());
    }
    if config.ppm_error != 0 {
        cmd.arg("-p").arg(config.ppm_error.to_string());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", config.demod_path))?;

    let stdout = child
        .stdout
        .take()
        .context("Failed to capture demodulator stdout")?;

    // Relay demodulator chatter, which goes to stderr.
    if let Some(stderr) = child.stderr.take() {
        let demod_name = config.demod_path.clone();
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if !line.trim().is_empty() {
                    info!("[{}] {}", demod_name, line.trim());
                }
            }
        });
    }

    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Error reading demodulator output: {}", e);
                break;
            }
        };

        match parse_bit_line(&line) {
            Some(capture) => {
                stats.captures_read.fetch_add(1, Ordering::Relaxed);
                if capture_tx.try_send(capture).is_err() {
                    debug!("Capture channel full, dropping capture");
                }
            }
            None if line.trim_start().starts_with('{') => {
                stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                debug!("Failed to parse capture line: {}", line);
            }
            None => {}
        }
    }

    let _ = child.kill();
    info!(
        "OOK capture stopped. Captures: {}, parse errors: {}",
        stats.captures_read.load(Ordering::Relaxed),
        stats.parse_errors.load(Ordering::Relaxed)
    );
    Ok(())
}

/// Replay loop: read recorded capture lines from a file.
fn run_replay(
    path: PathBuf,
    running: &AtomicBool,
    stats: &CaptureStats,
    capture_tx: &Sender<BitBuffer>,
) -> Result<()> {
    info!("Replaying captures from {:?}", path);

    let file = File::open(&path).with_context(|| format!("Failed to open {:?}", path))?;
    for line in BufReader::new(file).lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = line.context("Error reading replay file")?;
        match parse_bit_line(&line) {
            Some(capture) => {
                stats.captures_read.fetch_add(1, Ordering::Relaxed);
                // Replay must not drop captures; block until consumed.
                if capture_tx.send(capture).is_err() {
                    warn!("Capture channel closed, stopping replay");
                    break;
                }
            }
            None if !line.trim().is_empty() => {
                stats.parse_errors.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }
    }

    info!(
        "Replay finished. Captures: {}, parse errors: {}",
        stats.captures_read.load(Ordering::Relaxed),
        stats.parse_errors.load(Ordering::Relaxed)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bit_line() {
        let line = "{96}aaa5980f00905305e02da380";
        let capture = parse_bit_line(line).unwrap();
        assert_eq!(capture.len(), 96);
    }

    #[test]
    fn test_parse_bit_line_partial_byte() {
        let capture = parse_bit_line("{93}aaa5980f00905305e02da380").unwrap();
        assert_eq!(capture.len(), 93);
    }

    #[test]
    fn test_parse_bit_line_with_whitespace() {
        assert!(parse_bit_line("  {96}aaa5980f00905305e02da380\r\n").is_some());
    }

    #[test]
    fn test_parse_bit_line_invalid() {
        assert!(parse_bit_line("not a capture").is_none());
        assert!(parse_bit_line("{96}nothex").is_none());
        assert!(parse_bit_line("{}aaa598").is_none());
        assert!(parse_bit_line("{0}").is_none());
        // Declared bits exceed the hex payload.
        assert!(parse_bit_line("{200}aaa598").is_none());
    }
}
