//! World Air Quality Index (aqicn.org) map/bounds adapter.
//!
//! `GET /map/bounds/?latlng=S,W,N,E&token=T` returns every station inside the
//! box with a ready-made index:
//!
//! ```json
//! { "status": "ok",
//!   "data": [ { "lat": 28.6508, "lon": 77.3152, "uid": 2553, "aqi": "187",
//!               "station": { "name": "Anand Vihar, Delhi, India",
//!                            "time": "2025-01-01T10:00:00+09:00" } } ] }
//! ```
//!
//! On failure `status` is `"error"` and `data` is a message string.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{display_name, get_json, RawStation, UpstreamError, UpstreamSource};
use crate::config::BoundingBox;

#[derive(Debug, Deserialize)]
struct WaqiEnvelope {
    status: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct WaqiStation {
    lat: Option<Value>,
    lon: Option<Value>,
    aqi: Option<Value>,
    station: WaqiStationInfo,
}

#[derive(Debug, Deserialize)]
struct WaqiStationInfo {
    name: String,
    time: Option<String>,
}

// ---

/// Live source used by the on-demand read path.
pub struct WaqiSource {
    // ---
    client: Client,
    base_url: String,
    token: String,
    bounds: BoundingBox,
}

impl WaqiSource {
    // ---
    pub fn new(client: Client, base_url: &str, token: String, bounds: BoundingBox) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            bounds,
        }
    }
}

#[async_trait]
impl UpstreamSource for WaqiSource {
    fn name(&self) -> &'static str {
        "waqi"
    }

    async fn fetch(&self) -> Result<Vec<RawStation>, UpstreamError> {
        // ---
        if self.token.is_empty() {
            return Err(UpstreamError::Disabled("waqi"));
        }

        let url = format!("{}/map/bounds/", self.base_url);
        debug!("Fetching WAQI stations within {}", self.bounds.as_latlng());

        let body = get_json(
            &self.client,
            &url,
            &[
                ("latlng", self.bounds.as_latlng()),
                ("token", self.token.clone()),
            ],
        )
        .await?;

        parse_response(body)
    }
}

/// Decode a map/bounds response body. Entries that do not decode are skipped.
fn parse_response(body: Value) -> Result<Vec<RawStation>, UpstreamError> {
    // ---
    let envelope: WaqiEnvelope =
        serde_json::from_value(body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

    if envelope.status != "ok" {
        let message = match envelope.data {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Err(UpstreamError::Rejected(message));
    }

    let entries = match envelope.data {
        Value::Array(entries) => entries,
        other => {
            return Err(UpstreamError::Malformed(format!(
                "expected station array, got {}",
                other
            )))
        }
    };

    debug!("WAQI returned {} station entries", entries.len());

    let stations = entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<WaqiStation>(item) {
            Ok(station) => Some(into_raw(station)),
            Err(e) => {
                debug!("Skipping WAQI entry {}: {}", i, e);
                None
            }
        })
        .collect();

    Ok(stations)
}

fn into_raw(station: WaqiStation) -> RawStation {
    // ---
    let observed_at = station
        .station
        .time
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));

    RawStation {
        name: Some(display_name(&station.station.name)),
        address: Some(station.station.name),
        zone: None,
        latitude: station.lat,
        longitude: station.lon,
        index: station.aqi,
        pm25: None,
        pm10: None,
        no2: None,
        observed_at,
    }
}
