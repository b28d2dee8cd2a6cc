//! Station record persistence.
//!
//! [`StationStore`] is the pipeline's only contract with storage: an atomic
//! upsert keyed by station id, plus the read calls the HTTP layer passes
//! through. Both backends build the new history with [`append_sample`], so the
//! retention cap lives in one place.

use async_trait::async_trait;
use thiserror::Error;

use crate::history::{BoundedHistory, HISTORY_CAP};
use crate::models::{HistorySample, StationReading, StationRecord, StationStats, StationStatus};

mod memory;
mod postgres;

pub use memory::MemoryStationStore;
pub use postgres::PgStationStore;

// ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored record '{station_id}' is invalid: {reason}")]
    Corrupt { station_id: String, reason: String },
}

#[async_trait]
pub trait StationStore: Send + Sync {
    /// Insert the station if unseen, otherwise update it in place: mark it
    /// active, overwrite location and last reading, and append a history
    /// sample within the retention cap. Atomic per station.
    async fn upsert_reading(&self, reading: &StationReading) -> Result<StationRecord, StoreError>;

    async fn get(&self, station_id: &str) -> Result<Option<StationRecord>, StoreError>;

    /// All records, highest index first.
    async fn list(&self) -> Result<Vec<StationRecord>, StoreError>;

    /// Records in one zone, highest index first.
    async fn list_by_zone(&self, zone: &str) -> Result<Vec<StationRecord>, StoreError>;

    async fn stats(&self, threshold: i32) -> Result<StationStats, StoreError>;
}

/// Append the reading's sample to a stored history, keeping the newest
/// [`HISTORY_CAP`] entries.
pub(crate) fn append_sample(
    history: Vec<HistorySample>,
    reading: &StationReading,
) -> Vec<HistorySample> {
    // ---
    let mut bounded = BoundedHistory::from_vec(HISTORY_CAP, history);
    bounded.push(HistorySample::from(reading));
    bounded.into_vec()
}

/// Aggregate a set of records the same way the SQL backend does.
pub(crate) fn summarize<'a>(
    records: impl IntoIterator<Item = &'a StationRecord>,
    threshold: i32,
) -> StationStats {
    // ---
    let mut total = 0i64;
    let mut active = 0i64;
    let mut above = 0i64;
    let mut aqi_sum = 0f64;
    let mut pm25_sum = 0f64;
    let mut rated = 0i64;

    for record in records {
        total += 1;
        if record.status != StationStatus::Active {
            continue;
        }
        active += 1;

        let reading = &record.last_reading;
        if reading.aqi > threshold {
            above += 1;
        }
        if reading.aqi >= 0 {
            rated += 1;
            aqi_sum += reading.aqi as f64;
            pm25_sum += reading.pollutants.pm25;
        }
    }

    let mean = |sum: f64| {
        if rated == 0 {
            0
        } else {
            (sum / rated as f64).round() as i64
        }
    };

    StationStats {
        total_sensors: total,
        active_sensors: active,
        avg_aqi: mean(aqi_sum),
        avg_pm25: mean(pm25_sum),
        above_threshold: above,
        threshold,
    }
}

/// Order records by index descending, ties broken by id.
pub(crate) fn sort_by_severity(records: &mut [StationRecord]) {
    records.sort_by(|a, b| {
        b.last_reading
            .aqi
            .cmp(&a.last_reading.aqi)
            .then_with(|| a.station_id.cmp(&b.station_id))
    });
}
