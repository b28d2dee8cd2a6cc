//! Mapping of raw upstream records onto the canonical [`StationReading`].
//!
//! One raw record yields zero or one reading. A record that cannot be
//! normalized is dropped on its own; the rest of the batch is unaffected.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{station_id, Coordinates, Pollutants, StationReading};
use crate::severity::{severity_index, Category, UNAVAILABLE};
use crate::upstream::{RawMeasurement, RawStation};

/// µg/m³ per ppb of NO2 at 25 °C and 1 atm (46.0055 g/mol / 24.45 L/mol).
const NO2_UG_PER_PPB: f64 = 1.8816;

/// Ratios used to display pollutant values for sources that only report an index.
const PM25_PER_INDEX: f64 = 0.7;
const PM10_PER_INDEX: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pollutant {
    Pm25,
    Pm10,
    No2,
}

// ---

/// Converts raw upstream records into canonical readings.
#[derive(Debug, Clone)]
pub struct Normalizer {
    // ---
    default_zone: String,
}

impl Normalizer {
    // ---
    pub fn new(default_zone: impl Into<String>) -> Self {
        Self {
            default_zone: default_zone.into(),
        }
    }

    pub fn default_zone(&self) -> &str {
        &self.default_zone
    }

    /// Normalize one record, using `now` when the record carries no timestamp.
    ///
    /// Returns `None` when the record lacks a usable name or coordinates.
    pub fn normalize(&self, raw: &RawStation, now: DateTime<Utc>) -> Option<StationReading> {
        // ---
        match self.try_normalize(raw, now) {
            Ok(reading) => Some(reading),
            Err(reason) => {
                debug!("Dropping upstream record {:?}: {}", raw.name, reason);
                None
            }
        }
    }

    /// Normalize a whole batch, skipping records that cannot be normalized.
    pub fn normalize_batch(&self, raws: &[RawStation]) -> Vec<StationReading> {
        // ---
        let now = Utc::now();
        let readings: Vec<StationReading> = raws
            .iter()
            .filter_map(|raw| self.normalize(raw, now))
            .collect();

        let dropped = raws.len() - readings.len();
        if dropped > 0 {
            warn!(
                "Dropped {} of {} upstream records during normalization",
                dropped,
                raws.len()
            );
        }

        readings
    }

    fn try_normalize(
        &self,
        raw: &RawStation,
        now: DateTime<Utc>,
    ) -> Result<StationReading, &'static str> {
        // ---
        let name = non_blank(raw.name.as_deref()).ok_or("missing station name")?;

        let latitude = raw
            .latitude
            .as_ref()
            .and_then(number)
            .filter(|v| (-90.0..=90.0).contains(v))
            .ok_or("missing or invalid latitude")?;
        let longitude = raw
            .longitude
            .as_ref()
            .and_then(number)
            .filter(|v| (-180.0..=180.0).contains(v))
            .ok_or("missing or invalid longitude")?;

        let pm25 = raw.pm25.as_ref().and_then(|m| micrograms(Pollutant::Pm25, m));
        let pm10 = raw.pm10.as_ref().and_then(|m| micrograms(Pollutant::Pm10, m));
        let no2 = raw.no2.as_ref().and_then(|m| micrograms(Pollutant::No2, m));

        let index = raw
            .index
            .as_ref()
            .and_then(reported_index)
            .or_else(|| pm25.and_then(severity_index));

        let (aqi, pollutants) = match index {
            None => (UNAVAILABLE, Pollutants::default()),
            Some(aqi) if pm25.is_none() && pm10.is_none() && no2.is_none() => {
                (aqi, estimated_from_index(aqi))
            }
            Some(aqi) => (
                aqi,
                Pollutants {
                    pm25: pm25.unwrap_or(0.0),
                    pm10: pm10.unwrap_or(0.0),
                    no2: no2.unwrap_or(0.0),
                },
            ),
        };

        let zone = non_blank(raw.zone.as_deref())
            .unwrap_or(&self.default_zone)
            .to_string();
        let address = non_blank(raw.address.as_deref())
            .map(String::from)
            .unwrap_or_else(|| format!("{}, {}", name, zone));

        Ok(StationReading {
            station_id: station_id(name),
            name: name.to_string(),
            address,
            zone,
            coordinates: Coordinates {
                latitude,
                longitude,
            },
            pollutants,
            aqi,
            category: Category::from_index(aqi),
            observed_at: raw.observed_at.unwrap_or(now),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A finite number from a JSON number or numeric string.
fn number(value: &Value) -> Option<f64> {
    // ---
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// Upstream index when it is a non-negative number; `"-"` and friends are absent.
fn reported_index(value: &Value) -> Option<i32> {
    number(value).filter(|v| *v >= 0.0).map(|v| v.round() as i32)
}

fn estimated_from_index(aqi: i32) -> Pollutants {
    // ---
    Pollutants {
        pm25: (aqi as f64 * PM25_PER_INDEX).floor(),
        pm10: (aqi as f64 * PM10_PER_INDEX).floor(),
        no2: 0.0,
    }
}

/// Convert a measurement to µg/m³. Returns `None` for negative values, values
/// that are not numbers, and mixing-ratio units with no known conversion.
fn micrograms(pollutant: Pollutant, measurement: &RawMeasurement) -> Option<f64> {
    // ---
    let value = number(&measurement.value).filter(|v| *v >= 0.0)?;

    let unit = measurement
        .unit
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
        .replace(['µ', 'μ'], "u")
        .replace('³', "3");

    let converted = match unit.as_str() {
        "" | "ug/m3" => value,
        "mg/m3" => value * 1000.0,
        "ppb" | "ppm" => {
            let factor = match pollutant {
                Pollutant::No2 => NO2_UG_PER_PPB,
                Pollutant::Pm25 | Pollutant::Pm10 => {
                    debug!("No {} conversion for {:?}", unit, pollutant);
                    return None;
                }
            };
            let ppb = if unit == "ppm" { value * 1000.0 } else { value };
            ppb * factor
        }
        other => {
            warn!("Unknown unit '{}' for {:?}, using value as-is", other, pollutant);
            value
        }
    };

    Some((converted * 10.0).round() / 10.0)
}
