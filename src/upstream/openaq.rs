//! OpenAQ `/latest` adapter.
//!
//! OpenAQ reports raw concentrations per location but no index, so every
//! station from this source has its index computed from PM2.5.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{display_name, get_json, RawMeasurement, RawStation, UpstreamError, UpstreamSource};

#[derive(Debug, Deserialize)]
struct OpenAqResponse {
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAqLocation {
    location: String,
    coordinates: Option<OpenAqCoordinates>,
    #[serde(default)]
    measurements: Vec<OpenAqMeasurement>,
}

#[derive(Debug, Deserialize)]
struct OpenAqCoordinates {
    latitude: Option<Value>,
    longitude: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAqMeasurement {
    parameter: String,
    value: Value,
    unit: Option<String>,
    #[serde(rename = "lastUpdated")]
    last_updated: Option<String>,
}

// ---

/// Primary source for the scheduled air-quality sync.
pub struct OpenAqSource {
    // ---
    client: Client,
    base_url: String,
    city: String,
    country: String,
    limit: u32,
}

impl OpenAqSource {
    // ---
    pub fn new(client: Client, base_url: &str, city: String, country: String, limit: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            city,
            country,
            limit,
        }
    }
}

#[async_trait]
impl UpstreamSource for OpenAqSource {
    fn name(&self) -> &'static str {
        "openaq"
    }

    async fn fetch(&self) -> Result<Vec<RawStation>, UpstreamError> {
        // ---
        let url = format!("{}/latest", self.base_url);
        debug!("Fetching OpenAQ latest for {}, {}", self.city, self.country);

        let body = get_json(
            &self.client,
            &url,
            &[
                ("city", self.city.clone()),
                ("country", self.country.clone()),
                ("limit", self.limit.to_string()),
            ],
        )
        .await?;

        parse_response(body)
    }
}

fn parse_response(body: Value) -> Result<Vec<RawStation>, UpstreamError> {
    // ---
    let response: OpenAqResponse =
        serde_json::from_value(body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

    debug!("OpenAQ returned {} locations", response.results.len());

    let stations = response
        .results
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<OpenAqLocation>(item) {
            Ok(location) => Some(into_raw(location)),
            Err(e) => {
                debug!("Skipping OpenAQ location {}: {}", i, e);
                None
            }
        })
        .collect();

    Ok(stations)
}

fn into_raw(location: OpenAqLocation) -> RawStation {
    // ---
    let mut raw = RawStation {
        name: Some(display_name(&location.location)),
        address: Some(location.location),
        ..RawStation::default()
    };

    if let Some(coordinates) = location.coordinates {
        raw.latitude = coordinates.latitude;
        raw.longitude = coordinates.longitude;
    }

    let mut latest: Option<DateTime<Utc>> = None;
    for m in location.measurements {
        let updated = m
            .last_updated
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));
        latest = latest.max(updated);

        let measurement = RawMeasurement::new(m.value, m.unit);
        match m.parameter.as_str() {
            "pm25" => raw.pm25 = Some(measurement),
            "pm10" => raw.pm10 = Some(measurement),
            "no2" => raw.no2 = Some(measurement),
            _ => {}
        }
    }
    raw.observed_at = latest;

    raw
}
