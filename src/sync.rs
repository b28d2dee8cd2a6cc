//! One ingestion cycle: fetch → normalize → persist.
//!
//! Phases run in order. Upserts within the persist phase are issued
//! concurrently, since each targets its own station key and is atomic on its own.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::normalize::Normalizer;
use crate::scheduler::Cycle;
use crate::store::{StationStore, StoreError};
use crate::upstream::{UpstreamError, UpstreamSource};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Every upsert in the cycle failed; the store is most likely unavailable.
    #[error("all {failed} upserts failed: {error}")]
    Store {
        failed: usize,
        #[source]
        error: StoreError,
    },
}

/// Outcome counts of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    // ---
    pub source: &'static str,
    pub fetched: usize,
    pub normalized: usize,
    pub persisted: usize,
    pub failed: usize,
}

// ---

/// Background synchronization of one upstream source into the station store.
pub struct SyncCycle {
    // ---
    source: Arc<dyn UpstreamSource>,
    normalizer: Normalizer,
    store: Arc<dyn StationStore>,
}

impl SyncCycle {
    // ---
    pub fn new(
        source: Arc<dyn UpstreamSource>,
        normalizer: Normalizer,
        store: Arc<dyn StationStore>,
    ) -> Self {
        Self {
            source,
            normalizer,
            store,
        }
    }

    /// Run one full cycle and report what happened.
    ///
    /// Malformed records and individual upsert failures are counted, not
    /// escalated. The cycle fails only if the fetch fails or nothing could be
    /// persisted at all.
    pub async fn sync_once(&self) -> Result<CycleReport, SyncError> {
        // ---
        let raws = self.source.fetch().await?;
        let readings = self.normalizer.normalize_batch(&raws);

        let mut report = CycleReport {
            source: self.source.name(),
            fetched: raws.len(),
            normalized: readings.len(),
            persisted: 0,
            failed: 0,
        };

        let mut upserts = JoinSet::new();
        for reading in readings {
            let store = self.store.clone();
            upserts.spawn(async move {
                let result = store.upsert_reading(&reading).await;
                (reading.station_id, result)
            });
        }

        let mut first_error = None;
        while let Some(joined) = upserts.join_next().await {
            match joined {
                Ok((_, Ok(_))) => report.persisted += 1,
                Ok((station_id, Err(e))) => {
                    warn!("Failed to upsert station '{}': {}", station_id, e);
                    report.failed += 1;
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!("Upsert task did not complete: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report.persisted == 0 {
            if let Some(error) = first_error {
                return Err(SyncError::Store {
                    failed: report.failed,
                    error,
                });
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl Cycle for SyncCycle {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn run(&self) {
        // ---
        let span = info_span!("sync_cycle", source = self.source.name(), cycle_id = %Uuid::new_v4());

        async {
            info!("Starting sync cycle");
            match self.sync_once().await {
                Ok(report) => info!(
                    fetched = report.fetched,
                    normalized = report.normalized,
                    persisted = report.persisted,
                    failed = report.failed,
                    "Sync cycle complete"
                ),
                Err(e) => error!("Sync cycle abandoned: {}", e),
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{StationReading, StationRecord, StationStats};
    use crate::store::MemoryStationStore;
    use crate::test_support::{raw_station, StubSource};
    use serde_json::json;

    /// Store that is never reachable.
    struct UnavailableStore;

    #[async_trait]
    impl StationStore for UnavailableStore {
        async fn upsert_reading(&self, r: &StationReading) -> Result<StationRecord, StoreError> {
            Err(StoreError::Corrupt {
                station_id: r.station_id.clone(),
                reason: "store offline".into(),
            })
        }
        async fn get(&self, _: &str) -> Result<Option<StationRecord>, StoreError> {
            Ok(None)
        }
        async fn list(&self) -> Result<Vec<StationRecord>, StoreError> {
            Ok(Vec::new())
        }
        async fn list_by_zone(&self, _: &str) -> Result<Vec<StationRecord>, StoreError> {
            Ok(Vec::new())
        }
        async fn stats(&self, _: i32) -> Result<StationStats, StoreError> {
            unreachable!()
        }
    }

    fn cycle(source: StubSource, store: Arc<dyn StationStore>) -> SyncCycle {
        SyncCycle::new(Arc::new(source), Normalizer::new("Delhi NCR"), store)
    }

    #[tokio::test]
    async fn test_cycle_persists_valid_records() {
        // ---
        let mut stations: Vec<_> = (0..9)
            .map(|i| raw_station(&format!("Station {}", i), json!(28.6), json!(77.2), 40.0))
            .collect();
        stations.push(raw_station("Broken", json!("north"), json!(77.2), 40.0));

        let store = Arc::new(MemoryStationStore::new());
        let report = cycle(StubSource::Stations(stations), store.clone())
            .sync_once()
            .await
            .unwrap();

        assert_eq!(report.source, "stub");
        assert_eq!(report.fetched, 10);
        assert_eq!(report.normalized, 9);
        assert_eq!(report.persisted, 9);
        assert_eq!(report.failed, 0);
        assert_eq!(store.list().await.unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_repeated_cycles_update_in_place() {
        // ---
        let store = Arc::new(MemoryStationStore::new());
        let stations = vec![raw_station("Mundka", json!(28.679), json!(77.026), 95.0)];
        let sync = cycle(StubSource::Stations(stations), store.clone());

        for _ in 0..3 {
            sync.sync_once().await.unwrap();
        }

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].history.len(), 3);
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_store_untouched() {
        // ---
        let store = Arc::new(MemoryStationStore::new());
        let result = cycle(StubSource::Failing, store.clone()).sync_once().await;

        assert!(matches!(result, Err(SyncError::Upstream(_))));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_fails_cycle() {
        // ---
        let stations = vec![
            raw_station("Pusa", json!(28.64), json!(77.16), 20.0),
            raw_station("Rohini", json!(28.73), json!(77.12), 60.0),
        ];
        let result = cycle(StubSource::Stations(stations), Arc::new(UnavailableStore))
            .sync_once()
            .await;

        match result {
            Err(SyncError::Store { failed, .. }) => assert_eq!(failed, 2),
            other => panic!("expected store failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_never_panics_on_failure() {
        // ---
        let store = Arc::new(MemoryStationStore::new());
        cycle(StubSource::Failing, store.clone()).run().await;
        assert!(store.list().await.unwrap().is_empty());
    }
}
