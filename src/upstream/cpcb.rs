//! Central Pollution Control Board feed, published through data.gov.in.
//!
//! The resource returns one record per (station, pollutant) pair with values
//! as strings (`"NA"` when missing) and a local IST timestamp, so records are
//! grouped back into one [`RawStation`] per station here.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{display_name, get_json, RawMeasurement, RawStation, UpstreamError, UpstreamSource};

const CPCB_UNIT: &str = "µg/m³";
const CPCB_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

#[derive(Debug, Deserialize)]
struct CpcbEnvelope {
    status: Option<String>,
    message: Option<String>,
    records: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct CpcbRecord {
    station: String,
    latitude: Option<Value>,
    longitude: Option<Value>,
    pollutant_id: String,
    #[serde(alias = "pollutant_avg")]
    avg_value: Option<Value>,
    last_update: Option<String>,
}

// ---

/// Secondary source, synced on its own slower schedule.
pub struct CpcbSource {
    // ---
    client: Client,
    url: String,
    api_key: String,
    city: String,
    limit: u32,
}

impl CpcbSource {
    // ---
    pub fn new(client: Client, url: &str, api_key: String, city: String, limit: u32) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key,
            city,
            limit,
        }
    }
}

#[async_trait]
impl UpstreamSource for CpcbSource {
    fn name(&self) -> &'static str {
        "cpcb"
    }

    async fn fetch(&self) -> Result<Vec<RawStation>, UpstreamError> {
        // ---
        if self.api_key.is_empty() {
            return Err(UpstreamError::Disabled("cpcb"));
        }

        debug!("Fetching CPCB records for {}", self.city);

        let body = get_json(
            &self.client,
            &self.url,
            &[
                ("api-key", self.api_key.clone()),
                ("format", "json".to_string()),
                ("limit", self.limit.to_string()),
                ("filters[city]", self.city.clone()),
            ],
        )
        .await?;

        parse_response(body)
    }
}

fn parse_response(body: Value) -> Result<Vec<RawStation>, UpstreamError> {
    // ---
    let envelope: CpcbEnvelope =
        serde_json::from_value(body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

    if let Some(status) = envelope.status.as_deref() {
        if status != "ok" {
            let message = envelope.message.unwrap_or_else(|| status.to_string());
            return Err(UpstreamError::Rejected(message));
        }
    }

    let records = envelope
        .records
        .ok_or_else(|| UpstreamError::Malformed("response has no 'records' field".into()))?;

    debug!("CPCB returned {} pollutant records", records.len());

    // Keyed by the full station label so one station's pollutants end up together
    let mut stations: BTreeMap<String, RawStation> = BTreeMap::new();

    for (i, item) in records.into_iter().enumerate() {
        let record = match serde_json::from_value::<CpcbRecord>(item) {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping CPCB record {}: {}", i, e);
                continue;
            }
        };

        let raw = stations
            .entry(record.station.clone())
            .or_insert_with(|| RawStation {
                name: Some(display_name(&record.station)),
                address: Some(record.station.clone()),
                latitude: record.latitude.clone(),
                longitude: record.longitude.clone(),
                ..RawStation::default()
            });

        let observed_at = record.last_update.as_deref().and_then(parse_ist);
        raw.observed_at = raw.observed_at.max(observed_at);

        let measurement = record
            .avg_value
            .map(|value| RawMeasurement::new(value, Some(CPCB_UNIT.to_string())));

        match record.pollutant_id.as_str() {
            "PM2.5" => raw.pm25 = measurement,
            "PM10" => raw.pm10 = measurement,
            "NO2" => raw.no2 = measurement,
            _ => {}
        }
    }

    Ok(stations.into_values().collect())
}

fn parse_ist(value: &str) -> Option<DateTime<Utc>> {
    // ---
    let naive = NaiveDateTime::parse_from_str(value.trim(), CPCB_TIME_FORMAT).ok()?;
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS)?;
    ist.from_local_datetime(&naive)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_groups_pollutants_by_station() {
        // ---
        let body = json!({
            "status": "ok",
            "records": [
                { "station": "Anand Vihar, Delhi - DPCC", "latitude": "28.647622",
                  "longitude": "77.315809", "pollutant_id": "PM2.5",
                  "avg_value": "245", "last_update": "16-10-2026 10:00:00" },
                { "station": "Anand Vihar, Delhi - DPCC", "latitude": "28.647622",
                  "longitude": "77.315809", "pollutant_id": "PM10",
                  "avg_value": "NA", "last_update": "16-10-2026 10:00:00" },
                { "station": "Alipur, Delhi - DPCC", "latitude": "28.815329",
                  "longitude": "77.15301", "pollutant_id": "NO2",
                  "pollutant_avg": "31", "last_update": "16-10-2026 09:00:00" },
                { "station": "Alipur, Delhi - DPCC", "latitude": "28.815329",
                  "longitude": "77.15301", "pollutant_id": "OZONE",
                  "avg_value": "12" }
            ]
        });

        let stations = parse_response(body).unwrap();
        assert_eq!(stations.len(), 2);

        // BTreeMap ordering: "Alipur..." before "Anand..."
        let alipur = &stations[0];
        assert_eq!(alipur.name.as_deref(), Some("Alipur"));
        assert!(alipur.pm25.is_none());
        assert_eq!(alipur.no2.as_ref().unwrap().value, json!("31"));

        let anand = &stations[1];
        assert_eq!(anand.name.as_deref(), Some("Anand Vihar"));
        assert_eq!(anand.pm25.as_ref().unwrap().value, json!("245"));
        assert_eq!(anand.pm10.as_ref().unwrap().value, json!("NA"));
        assert_eq!(
            anand.observed_at.unwrap().to_rfc3339(),
            "2026-10-16T04:30:00+00:00"
        );
    }

    #[test]
    fn test_error_status_is_rejected() {
        // ---
        let body = json!({ "status": "error", "message": "Invalid API key" });
        match parse_response(body) {
            Err(UpstreamError::Rejected(message)) => assert_eq!(message, "Invalid API key"),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_records_is_malformed() {
        // ---
        let body = json!({ "status": "ok" });
        assert!(matches!(
            parse_response(body),
            Err(UpstreamError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_ist() {
        // ---
        assert!(parse_ist("not a date").is_none());
        assert_eq!(
            parse_ist("01-01-2025 05:30:00").unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
    }
}
