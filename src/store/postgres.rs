//! PostgreSQL station store.
//!
//! One row per station in `air_quality_stations`, with the last reading and the
//! capped history embedded as JSONB. An upsert is a single transaction that
//! locks the station row before rewriting its history, so concurrent cycles
//! touching the same station serialize on that row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};

use super::{append_sample, StationStore, StoreError};
use crate::models::{HistorySample, Location, StationReading, StationRecord, StationStats};

const RECORD_COLUMNS: &str = "station_id, name, status, latitude, longitude, address, zone, \
                              last_reading, history, created_at, updated_at";

/// Row layout of `air_quality_stations`.
#[derive(Debug, FromRow)]
struct StationRow {
    station_id: String,
    name: String,
    status: String,
    latitude: f64,
    longitude: f64,
    address: String,
    zone: String,
    last_reading: Json<StationReading>,
    history: Json<Vec<HistorySample>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StationRow> for StationRecord {
    type Error = StoreError;

    fn try_from(row: StationRow) -> Result<Self, Self::Error> {
        // ---
        let status = row.status.parse().map_err(|reason| StoreError::Corrupt {
            station_id: row.station_id.clone(),
            reason,
        })?;

        Ok(StationRecord {
            station_id: row.station_id,
            name: row.name,
            status,
            location: Location {
                latitude: row.latitude,
                longitude: row.longitude,
                address: row.address,
                zone: row.zone,
            },
            last_reading: row.last_reading.0,
            history: row.history.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---

#[derive(Debug, Clone)]
pub struct PgStationStore {
    // ---
    pool: PgPool,
}

impl PgStationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_records(
        &self,
        filter: &str,
        bind: Option<&str>,
    ) -> Result<Vec<StationRecord>, StoreError> {
        // ---
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM air_quality_stations {filter} \
             ORDER BY (last_reading->>'aqi')::int DESC, station_id"
        );

        let mut query = sqlx::query_as::<_, StationRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }

        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(StationRecord::try_from)
            .collect()
    }
}

#[async_trait]
impl StationStore for PgStationStore {
    async fn upsert_reading(&self, reading: &StationReading) -> Result<StationRecord, StoreError> {
        // ---
        let mut tx = self.pool.begin().await?;

        // Insert-if-absent; a concurrent insert of the same id is a no-op here
        sqlx::query(
            r#"
            INSERT INTO air_quality_stations (
                station_id, name, status, latitude, longitude,
                address, zone, last_reading, history
            ) VALUES ($1, $2, 'active', $3, $4, $5, $6, $7, '[]'::jsonb)
            ON CONFLICT (station_id) DO NOTHING
            "#,
        )
        .bind(&reading.station_id)
        .bind(&reading.name)
        .bind(reading.coordinates.latitude)
        .bind(reading.coordinates.longitude)
        .bind(&reading.address)
        .bind(&reading.zone)
        .bind(Json(reading))
        .execute(&mut *tx)
        .await?;

        let (Json(history),): (Json<Vec<HistorySample>>,) = sqlx::query_as(
            "SELECT history FROM air_quality_stations WHERE station_id = $1 FOR UPDATE",
        )
        .bind(&reading.station_id)
        .fetch_one(&mut *tx)
        .await?;

        let history = append_sample(history, reading);

        let row: StationRow = sqlx::query_as(&format!(
            r#"
            UPDATE air_quality_stations SET
                name         = $2,
                status       = 'active',
                latitude     = $3,
                longitude    = $4,
                address      = $5,
                zone         = $6,
                last_reading = $7,
                history      = $8,
                updated_at   = now()
            WHERE station_id = $1
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(&reading.station_id)
        .bind(&reading.name)
        .bind(reading.coordinates.latitude)
        .bind(reading.coordinates.longitude)
        .bind(&reading.address)
        .bind(&reading.zone)
        .bind(Json(reading))
        .bind(Json(&history))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        StationRecord::try_from(row)
    }

    async fn get(&self, station_id: &str) -> Result<Option<StationRecord>, StoreError> {
        // ---
        let sql = format!("SELECT {RECORD_COLUMNS} FROM air_quality_stations WHERE station_id = $1");

        sqlx::query_as::<_, StationRow>(&sql)
            .bind(station_id)
            .fetch_optional(&self.pool)
            .await?
            .map(StationRecord::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<StationRecord>, StoreError> {
        self.fetch_records("", None).await
    }

    async fn list_by_zone(&self, zone: &str) -> Result<Vec<StationRecord>, StoreError> {
        self.fetch_records("WHERE zone = $1", Some(zone)).await
    }

    async fn stats(&self, threshold: i32) -> Result<StationStats, StoreError> {
        // ---
        // Averages cover active stations with an available index, matching
        // the in-memory summary.
        let (total_sensors, active_sensors, avg_aqi, avg_pm25, above_threshold): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'active'),
                COALESCE(ROUND(AVG((last_reading->>'aqi')::float8)
                    FILTER (WHERE status = 'active' AND (last_reading->>'aqi')::int >= 0)), 0)::BIGINT,
                COALESCE(ROUND(AVG((last_reading->'pollutants'->>'pm25')::float8)
                    FILTER (WHERE status = 'active' AND (last_reading->>'aqi')::int >= 0)), 0)::BIGINT,
                COUNT(*) FILTER (WHERE status = 'active' AND (last_reading->>'aqi')::int > $1)
            FROM air_quality_stations
            "#,
        )
        .bind(threshold)
        .fetch_one(&self.pool)
        .await?;

        Ok(StationStats {
            total_sensors,
            active_sensors,
            avg_aqi,
            avg_pm25,
            above_threshold,
            threshold,
        })
    }
}
