//! Decoded weather station data types

use serde::Serialize;

/// Battery status flag carried in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Battery {
    Ok,
    Low,
}

/// One validated, decoded weather station transmission.
///
/// Serialized field names are the contract with the downstream sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    /// Device model tag
    pub model: &'static str,

    /// Random device identifier, re-rolled on battery replacement
    pub id: u8,

    /// Temperature in °C, one decimal
    #[serde(rename = "temperature")]
    pub temperature_c: f32,

    /// Relative humidity in percent, passed through without clamping
    #[serde(rename = "humidity")]
    pub humidity_pct: u8,

    /// Three-character compass label
    pub wind_direction: &'static str,

    /// Wind direction in degrees
    pub wind_degrees: f32,

    /// Wind speed in km/h
    #[serde(rename = "wind_speed")]
    pub wind_speed_kmh: u16,

    /// Accumulated rain volume in mm
    #[serde(rename = "rain_volume")]
    pub rain_mm: f64,

    /// Battery status
    pub battery: Battery,

    /// Hex representation of the validated frame
    pub raw: String,
}
