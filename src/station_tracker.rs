//! Weather station state tracking
//!
//! Aggregates accepted readings per device identifier. The identifier
//! byte is re-rolled when the sensor's batteries are replaced, so a
//! station that loses power reappears under a new id and the old entry
//! ages out.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::aok5055::{Battery, SensorReading};

/// Maximum age for station state before removal. The sensor transmits
/// roughly every 30 seconds; this tolerates many missed bursts.
const STATION_TIMEOUT_SECS: u64 = 600;

/// Aggregated state for one station.
#[derive(Debug, Clone)]
pub struct StationState {
    /// Device identifier byte
    pub id: u8,
    /// Most recent accepted reading
    pub last: SensorReading,
    /// Rain counter value when the station was first seen
    pub rain_baseline_mm: f64,
    /// Accepted readings so far
    pub readings: u64,
    /// Whether any reading reported a low battery
    pub battery_low_seen: bool,
    pub first_seen: Instant,
    pub last_seen: Instant,
}

impl StationState {
    fn new(reading: &SensorReading) -> Self {
        let now = Instant::now();
        Self {
            id: reading.id,
            last: reading.clone(),
            rain_baseline_mm: reading.rain_mm,
            readings: 0,
            battery_low_seen: false,
            first_seen: now,
            last_seen: now,
        }
    }

    fn update(&mut self, reading: &SensorReading) {
        self.last_seen = Instant::now();
        self.readings += 1;
        if reading.battery == Battery::Low && !self.battery_low_seen {
            info!("Station {:02X} reports low battery", self.id);
            self.battery_low_seen = true;
        }
        self.last = reading.clone();
    }

    /// Rain accumulated since this station was first seen. The gauge
    /// counter is cumulative over the sensor's lifetime; the baseline
    /// turns it into a per-session figure.
    pub fn rain_since_first_seen_mm(&self) -> f64 {
        (self.last.rain_mm - self.rain_baseline_mm).max(0.0)
    }

    pub fn is_stale(&self) -> bool {
        self.last_seen.elapsed() > Duration::from_secs(STATION_TIMEOUT_SECS)
    }

    pub fn age_secs(&self) -> u64 {
        self.last_seen.elapsed().as_secs()
    }
}

/// Station tracker keyed by the frame's device identifier byte.
pub struct StationTracker {
    stations: HashMap<u8, StationState>,
    max_stations: usize,
    last_cleanup: Instant,
}

impl StationTracker {
    pub fn new(max_stations: usize) -> Self {
        Self {
            stations: HashMap::with_capacity(max_stations),
            max_stations,
            last_cleanup: Instant::now(),
        }
    }

    /// Fold a reading into the tracked state, returning the updated
    /// station.
    pub fn update(&mut self, reading: &SensorReading) -> Option<&StationState> {
        let id = reading.id;

        if !self.stations.contains_key(&id) {
            if self.stations.len() >= self.max_stations {
                self.cleanup_stale();
            }
            self.stations.insert(id, StationState::new(reading));
            debug!("New station tracked: {:02X}", id);
        }

        let state = self.stations.get_mut(&id)?;
        state.update(reading);

        if self.last_cleanup.elapsed() > Duration::from_secs(60) {
            self.cleanup_stale();
            self.last_cleanup = Instant::now();
        }

        self.stations.get(&id)
    }

    pub fn get(&self, id: u8) -> Option<&StationState> {
        self.stations.get(&id)
    }

    pub fn count(&self) -> usize {
        self.stations.len()
    }

    fn cleanup_stale(&mut self) {
        let before = self.stations.len();
        self.stations.retain(|_, state| !state.is_stale());
        let removed = before - self.stations.len();
        if removed > 0 {
            debug!(
                "Cleaned up {} stale stations, {} remaining",
                removed,
                self.stations.len()
            );
        }
    }

    /// Summary statistics for periodic logging.
    pub fn stats_summary(&self) -> TrackerStats {
        let active = self.stations.values().filter(|s| !s.is_stale()).count();
        let battery_low = self
            .stations
            .values()
            .filter(|s| s.battery_low_seen && !s.is_stale())
            .count();
        let total_readings: u64 = self.stations.values().map(|s| s.readings).sum();

        TrackerStats {
            stations: active,
            battery_low,
            total_readings,
        }
    }
}

/// Tracker statistics
#[derive(Debug, Clone)]
pub struct TrackerStats {
    pub stations: usize,
    pub battery_low: usize,
    pub total_readings: u64,
}

impl std::fmt::Display for TrackerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stations: {} active, {} low battery, {} readings",
            self.stations, self.battery_low, self.total_readings
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aok5055::MODEL;

    fn reading(id: u8, rain_mm: f64, battery: Battery) -> SensorReading {
        SensorReading {
            model: MODEL,
            id,
            temperature_c: 14.4,
            humidity_pct: 83,
            wind_direction: "WNW",
            wind_degrees: 292.5,
            wind_speed_kmh: 2,
            rain_mm,
            battery,
            raw: String::new(),
        }
    }

    #[test]
    fn test_tracks_per_station() {
        let mut tracker = StationTracker::new(16);
        tracker.update(&reading(0x0F, 70.5, Battery::Ok));
        tracker.update(&reading(0x0F, 71.25, Battery::Ok));
        tracker.update(&reading(0x42, 0.0, Battery::Ok));

        assert_eq!(tracker.count(), 2);
        let state = tracker.get(0x0F).unwrap();
        assert_eq!(state.readings, 2);
        assert_eq!(state.rain_since_first_seen_mm(), 0.75);
    }

    #[test]
    fn test_battery_low_latches() {
        let mut tracker = StationTracker::new(16);
        tracker.update(&reading(0x0F, 0.0, Battery::Low));
        tracker.update(&reading(0x0F, 0.0, Battery::Ok));
        assert!(tracker.get(0x0F).unwrap().battery_low_seen);
        assert_eq!(tracker.stats_summary().battery_low, 1);
    }
}
