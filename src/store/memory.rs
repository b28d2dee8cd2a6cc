//! In-process station store.
//!
//! Used when no database is configured, and by tests. Each upsert performs its
//! whole read-modify-write under the write lock.

use std::collections::{hash_map::Entry, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{append_sample, sort_by_severity, summarize, StationStore, StoreError};
use crate::models::{Location, StationReading, StationRecord, StationStats, StationStatus};

#[derive(Debug, Default)]
pub struct MemoryStationStore {
    // ---
    records: RwLock<HashMap<String, StationRecord>>,
}

impl MemoryStationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StationStore for MemoryStationStore {
    async fn upsert_reading(&self, reading: &StationReading) -> Result<StationRecord, StoreError> {
        // ---
        let now = Utc::now();
        let mut records = self.records.write().await;

        let record = match records.entry(reading.station_id.clone()) {
            Entry::Occupied(entry) => {
                let record = entry.into_mut();
                record.name = reading.name.clone();
                record.status = StationStatus::Active;
                record.location = Location::from(reading);
                record.last_reading = reading.clone();
                record.history = append_sample(std::mem::take(&mut record.history), reading);
                record.updated_at = now;
                record
            }
            Entry::Vacant(entry) => entry.insert(StationRecord {
                station_id: reading.station_id.clone(),
                name: reading.name.clone(),
                status: StationStatus::Active,
                location: Location::from(reading),
                last_reading: reading.clone(),
                history: append_sample(Vec::new(), reading),
                created_at: now,
                updated_at: now,
            }),
        };

        Ok(record.clone())
    }

    async fn get(&self, station_id: &str) -> Result<Option<StationRecord>, StoreError> {
        Ok(self.records.read().await.get(station_id).cloned())
    }

    async fn list(&self) -> Result<Vec<StationRecord>, StoreError> {
        // ---
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        sort_by_severity(&mut records);
        Ok(records)
    }

    async fn list_by_zone(&self, zone: &str) -> Result<Vec<StationRecord>, StoreError> {
        // ---
        let mut records: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.location.zone == zone)
            .cloned()
            .collect();
        sort_by_severity(&mut records);
        Ok(records)
    }

    async fn stats(&self, threshold: i32) -> Result<StationStats, StoreError> {
        Ok(summarize(self.records.read().await.values(), threshold))
    }
}
