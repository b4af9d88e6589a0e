//! Frame field extraction and physical-unit scaling

use super::decoder::FRAME_BYTES;
use super::types::{Battery, SensorReading};

/// Reported model tag.
pub const MODEL: &str = "Renkforce AOK-5055";

/// Rain gauge step size in millimetres.
pub const RAIN_STEP_MM: f64 = 0.75;

/// Angular width of one wind direction index.
pub const DIRECTION_STEP_DEG: f32 = 22.5;

/// Compass labels for the 4-bit wind direction index.
const DIRECTIONS: [&str; 16] = [
    "  N", "NNO", " NO", "ONO", "  O", "OSO", " SO", "SSO", "  S", "SSW", "SWW", " SW", "  W",
    "WNW", " NW", "NNW",
];

/// Decode the packed fields of one validated frame.
///
/// Every byte index used is in range for a frame of `FRAME_BYTES`, so
/// this is a total function over validated frames; it cannot fail on
/// data. The 12-bit temperature is taken as unsigned tenths of a degree;
/// the sign convention for sub-zero readings is unconfirmed.
pub fn decode_fields(frame: &[u8; FRAME_BYTES]) -> SensorReading {
    let battery = if frame[4] >> 4 == 0x0F {
        Battery::Low
    } else {
        Battery::Ok
    };
    let temp_tenths = ((frame[4] as u16 & 0x0F) << 8) | frame[5] as u16;
    let rain_steps = ((frame[7] as u16) << 4) | (frame[8] as u16 >> 4);
    let wind_speed = ((frame[8] as u16 & 0x0F) << 8) | (frame[9] as u16 >> 4);
    let direction = (frame[9] & 0x0F) as usize;

    SensorReading {
        model: MODEL,
        id: frame[3],
        temperature_c: temp_tenths as f32 / 10.0,
        humidity_pct: frame[6],
        wind_direction: DIRECTIONS[direction],
        wind_degrees: direction as f32 * DIRECTION_STEP_DEG,
        wind_speed_kmh: wind_speed,
        rain_mm: rain_steps as f64 * RAIN_STEP_MM,
        battery,
        raw: hex::encode(frame),
    }
}
