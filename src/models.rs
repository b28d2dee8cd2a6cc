//! Canonical data models for the air-quality pipeline.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::severity::Category;

// ---

/// Derive the stable station identifier from a display name.
///
/// Lowercases the name and collapses every whitespace run into a single `-`,
/// so `"Anand  Vihar"` and `"anand vihar"` both map to `"anand-vihar"`.
pub fn station_id(name: &str) -> String {
    // ---
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    // ---
    pub latitude: f64,
    pub longitude: f64,
}

/// Pollutant concentrations in µg/m³.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    // ---
    pub pm25: f64,
    #[serde(default)]
    pub pm10: f64,
    #[serde(default)]
    pub no2: f64,
}

/// One canonical reading for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationReading {
    // ---
    pub station_id: String,
    pub name: String,
    pub address: String,
    pub zone: String,
    pub coordinates: Coordinates,
    pub pollutants: Pollutants,
    /// Severity index, or [`crate::severity::UNAVAILABLE`].
    pub aqi: i32,
    pub category: Category,
    pub observed_at: DateTime<Utc>,
}

/// Why a live-read response carries the data it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Fetched and normalized from the upstream network.
    Live,
    /// Generated because no live source is configured.
    Simulated,
    /// Generated because the live source failed.
    Fallback,
}

/// Response body of the on-demand "current conditions" read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveResponse {
    pub source: DataSource,
    pub data: Vec<StationReading>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

impl StationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationStatus::Active => "active",
            StationStatus::Inactive => "inactive",
            StationStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(StationStatus::Active),
            "inactive" => Ok(StationStatus::Inactive),
            "maintenance" => Ok(StationStatus::Maintenance),
            other => Err(format!("unknown station status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    // ---
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub zone: String,
}

/// Compact per-cycle sample kept in a station's rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySample {
    // ---
    pub aqi: i32,
    pub pm25: f64,
    pub observed_at: DateTime<Utc>,
}

impl From<&StationReading> for HistorySample {
    fn from(reading: &StationReading) -> Self {
        HistorySample {
            aqi: reading.aqi,
            pm25: reading.pollutants.pm25,
            observed_at: reading.observed_at,
        }
    }
}

impl From<&StationReading> for Location {
    fn from(reading: &StationReading) -> Self {
        Location {
            latitude: reading.coordinates.latitude,
            longitude: reading.coordinates.longitude,
            address: reading.address.clone(),
            zone: reading.zone.clone(),
        }
    }
}

/// Persisted state of one monitoring station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    // ---
    pub station_id: String,
    pub name: String,
    pub status: StationStatus,
    pub location: Location,
    pub last_reading: StationReading,
    pub history: Vec<HistorySample>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregates over the persisted station set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStats {
    // ---
    pub total_sensors: i64,
    pub active_sensors: i64,
    /// Mean index over active stations with an available index; 0 when none.
    pub avg_aqi: i64,
    pub avg_pm25: i64,
    /// Active stations whose index is strictly above `threshold`.
    pub above_threshold: i64,
    pub threshold: i32,
}
