//! Renkforce AOK-5055 weather station decoding

mod decoder;
mod fields;
mod types;

pub use decoder::{decode, Reject, FRAME_BYTES, MIN_REPEATS, PREAMBLE, TX_REPEATS};
pub use fields::MODEL;
pub use types::{Battery, SensorReading};
