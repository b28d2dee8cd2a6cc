//! Shared fixtures for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use crate::models::{station_id, Coordinates, Pollutants, StationReading};
use crate::severity::{severity_index, Category};
use crate::upstream::{RawMeasurement, RawStation, UpstreamError, UpstreamSource};

pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap()
}

/// A canonical reading for `name` with its index computed from `pm25`,
/// observed `minutes` after [`base_time`].
pub(crate) fn create_test_reading(name: &str, pm25: f64, minutes: i64) -> StationReading {
    // ---
    let aqi = severity_index(pm25).unwrap();
    StationReading {
        station_id: station_id(name),
        name: name.to_string(),
        address: format!("{}, Delhi NCR", name),
        zone: "Delhi NCR".to_string(),
        coordinates: Coordinates {
            latitude: 28.6139,
            longitude: 77.2090,
        },
        pollutants: Pollutants {
            pm25,
            pm10: 0.0,
            no2: 0.0,
        },
        aqi,
        category: Category::from_index(aqi),
        observed_at: base_time() + Duration::minutes(minutes),
    }
}

/// A raw upstream record reporting only PM2.5 in µg/m³.
pub(crate) fn raw_station(name: &str, latitude: Value, longitude: Value, pm25: f64) -> RawStation {
    // ---
    RawStation {
        name: Some(name.to_string()),
        latitude: Some(latitude),
        longitude: Some(longitude),
        pm25: Some(RawMeasurement::new(json!(pm25), Some("µg/m³".to_string()))),
        ..RawStation::default()
    }
}

/// Upstream source with a canned outcome.
pub(crate) enum StubSource {
    Stations(Vec<RawStation>),
    Failing,
}

#[async_trait]
impl UpstreamSource for StubSource {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch(&self) -> Result<Vec<RawStation>, UpstreamError> {
        match self {
            StubSource::Stations(stations) => Ok(stations.clone()),
            StubSource::Failing => Err(UpstreamError::Rejected("stub failure".into())),
        }
    }
}
