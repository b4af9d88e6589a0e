//! OOK bitstream front-end
//!
//! Runs an external demodulator process that slices 433 MHz OOK pulses
//! into bit captures, or replays previously recorded captures from a
//! file, and feeds them to the decode loop.

mod capture;

pub use capture::{CaptureStats, OokCapture, OokConfig};
