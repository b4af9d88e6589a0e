//! Frame pipeline: locate, extract, repeat-validate, decode
//!
//! The AOK-5055 sends each 96-bit frame five times back to back. A single
//! copy carries no checksum that can be verified arithmetically, so
//! agreement across consecutive copies is the only error detection: at
//! least three copies must match byte for byte, excluding each frame's
//! trailing pause byte.

use thiserror::Error;

use crate::bitbuffer::BitBuffer;

use super::fields::decode_fields;
use super::types::SensorReading;

/// Synchronization pattern opening every frame.
pub const PREAMBLE: [u8; 3] = [0xAA, 0xA5, 0x98];

/// Bits of the preamble compared during the search.
const PREAMBLE_BITS: usize = 24;

/// Length of one transmission of the sensor message.
pub const FRAME_BYTES: usize = 12;
const FRAME_BITS: usize = FRAME_BYTES * 8;

/// Copies the sensor sends per transmission burst.
pub const TX_REPEATS: usize = 5;

/// Copies that must agree before a reading is accepted. Protocol
/// parameter: observed device variants want 3, 4, or 5.
pub const MIN_REPEATS: usize = 3;

/// Trailing bytes of each frame excluded from repeat comparison; the
/// pause byte legitimately differs between copies.
pub const PAUSE_BYTES: usize = 1;

/// Rejection reasons. All are expected, frequent outcomes of noisy or
/// partial captures, never fatal errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    #[error("preamble not found in capture")]
    PreambleNotFound,
    #[error("capture too short for required repeats after preamble")]
    InsufficientBits,
    #[error("repeat {repeat} disagrees at frame byte {byte}")]
    RepeatMismatch { repeat: usize, byte: usize },
}

/// Decode one capture into a sensor reading.
///
/// The capture is the demodulator's raw output. The link arrives
/// inverted, so the pipeline complements the bits once up front; the
/// preamble search and everything after it assume corrected polarity.
/// All scratch state is stack-allocated per call, so concurrent
/// invocations over separate captures are safe.
pub fn decode(capture: &BitBuffer) -> Result<SensorReading, Reject> {
    let capture = capture.inverted();

    let bitpos = capture
        .search(0, &PREAMBLE, PREAMBLE_BITS)
        .ok_or(Reject::PreambleNotFound)?;

    let mut repeats = [0u8; FRAME_BYTES * MIN_REPEATS];
    if !capture.extract_bytes(bitpos, FRAME_BITS * MIN_REPEATS, &mut repeats) {
        return Err(Reject::InsufficientBits);
    }

    validate_repeats(&repeats)?;

    let mut frame = [0u8; FRAME_BYTES];
    frame.copy_from_slice(&repeats[..FRAME_BYTES]);
    Ok(decode_fields(&frame))
}

/// Require byte-for-byte agreement of every copy with the first, pause
/// byte excluded. Exact match only, no voting.
fn validate_repeats(repeats: &[u8; FRAME_BYTES * MIN_REPEATS]) -> Result<(), Reject> {
    let first = &repeats[..FRAME_BYTES];
    for repeat in 1..MIN_REPEATS {
        let copy = &repeats[repeat * FRAME_BYTES..(repeat + 1) * FRAME_BYTES];
        for byte in 0..FRAME_BYTES - PAUSE_BYTES {
            if copy[byte] != first[byte] {
                return Err(Reject::RepeatMismatch { repeat, byte });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aok5055::types::Battery;

    const SAMPLE: &str = "aaa5980f00905305e02da380";

    fn sample_frame() -> [u8; FRAME_BYTES] {
        hex::decode(SAMPLE).unwrap().try_into().unwrap()
    }

    /// Concatenate logical frames behind `lead_bits` zero bits and flip
    /// the whole thing to on-air polarity.
    fn capture_with_lead(lead_bits: usize, frames: &[[u8; FRAME_BYTES]]) -> BitBuffer {
        let mut bits: Vec<bool> = vec![false; lead_bits];
        for frame in frames {
            for byte in frame {
                for i in 0..8 {
                    bits.push((byte >> (7 - i)) & 1 != 0);
                }
            }
        }
        let mut bytes = vec![0u8; (bits.len() + 7) / 8];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                bytes[i / 8] |= 1 << (7 - i % 8);
            }
        }
        let mut capture = BitBuffer::with_bit_len(&bytes, bits.len());
        capture.invert();
        capture
    }

    fn capture_of(frames: &[[u8; FRAME_BYTES]]) -> BitBuffer {
        capture_with_lead(0, frames)
    }

    #[test]
    fn test_decode_sample_burst() {
        let frame = sample_frame();
        let reading = decode(&capture_of(&[frame, frame, frame])).unwrap();
        assert_eq!(reading.model, "Renkforce AOK-5055");
        assert_eq!(reading.id, 0x0F);
        assert_eq!(reading.temperature_c, 14.4);
        assert_eq!(reading.humidity_pct, 83);
        assert_eq!(reading.rain_mm, 70.5);
        assert_eq!(reading.wind_speed_kmh, 2);
        assert_eq!(reading.wind_direction, "WNW");
        assert_eq!(reading.battery, Battery::Ok);
        assert_eq!(reading.raw, SAMPLE);
    }

    #[test]
    fn test_full_transmission_burst() {
        // The sensor sends five copies; the pipeline needs only the
        // first MIN_REPEATS of them.
        let frame = sample_frame();
        let reading = decode(&capture_of(&[frame; TX_REPEATS])).unwrap();
        assert_eq!(reading.raw, SAMPLE);
    }

    #[test]
    fn test_preamble_not_found() {
        let capture = BitBuffer::from_bytes(&[0x00; 64]);
        assert_eq!(decode(&capture), Err(Reject::PreambleNotFound));
    }

    #[test]
    fn test_locates_offset_frames() {
        let frame = sample_frame();
        // Byte-aligned and odd bit offsets before the first preamble.
        for lead in [0, 16, 5, 23] {
            let capture = capture_with_lead(lead, &[frame, frame, frame]);
            let reading = decode(&capture).unwrap();
            assert_eq!(reading.raw, SAMPLE, "lead of {lead} bits");
        }
    }

    #[test]
    fn test_insufficient_repeats() {
        let frame = sample_frame();
        assert_eq!(
            decode(&capture_of(&[frame, frame])),
            Err(Reject::InsufficientBits)
        );
    }

    #[test]
    fn test_truncated_last_repeat() {
        let frame = sample_frame();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&frame);
        bytes.extend_from_slice(&frame);
        bytes.extend_from_slice(&frame[..FRAME_BYTES - 1]);
        let mut capture = BitBuffer::from_bytes(&bytes);
        capture.invert();
        assert_eq!(decode(&capture), Err(Reject::InsufficientBits));
    }

    #[test]
    fn test_repeat_mismatch_on_flipped_bit() {
        let frame = sample_frame();
        // Flip one bit in a data byte of the second copy.
        let mut corrupted = frame;
        corrupted[6] ^= 0x04;
        assert_eq!(
            decode(&capture_of(&[frame, corrupted, frame])),
            Err(Reject::RepeatMismatch { repeat: 1, byte: 6 })
        );
    }

    #[test]
    fn test_repeat_mismatch_in_checksum_byte() {
        // Byte 10 is opaque but still inside the compared region.
        let frame = sample_frame();
        let mut corrupted = frame;
        corrupted[10] ^= 0x01;
        assert_eq!(
            decode(&capture_of(&[frame, frame, corrupted])),
            Err(Reject::RepeatMismatch { repeat: 2, byte: 10 })
        );
    }

    #[test]
    fn test_pause_byte_may_differ() {
        let frame = sample_frame();
        let mut second = frame;
        let mut third = frame;
        second[FRAME_BYTES - 1] = 0x00;
        third[FRAME_BYTES - 1] = 0xFF;
        let reading = decode(&capture_of(&[frame, second, third])).unwrap();
        assert_eq!(reading.raw, SAMPLE);
    }

    #[test]
    fn test_capture_shorter_than_preamble() {
        let capture = BitBuffer::from_bytes(&[!0xAA]);
        assert_eq!(decode(&capture), Err(Reject::PreambleNotFound));
    }
}
