//! Database schema management for `airsync`.
//!
//! Ensures the station table and its indexes exist before serving requests.
//! Applied once on startup from `main.rs`, only when a database is configured.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `air_quality_stations` table: one row per station keyed by
/// `station_id`, with the last reading and the capped history stored as JSONB.
/// Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS air_quality_stations (
            station_id    TEXT             PRIMARY KEY,
            name          TEXT             NOT NULL,
            status        TEXT             NOT NULL DEFAULT 'active'
                          CHECK (status IN ('active', 'inactive', 'maintenance')),
            latitude      DOUBLE PRECISION NOT NULL,
            longitude     DOUBLE PRECISION NOT NULL,
            address       TEXT             NOT NULL,
            zone          TEXT             NOT NULL,
            last_reading  JSONB            NOT NULL,
            history       JSONB            NOT NULL DEFAULT '[]'::jsonb,
            created_at    TIMESTAMPTZ      NOT NULL DEFAULT now(),
            updated_at    TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Zone lookups
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_air_quality_stations_zone
            ON air_quality_stations (zone);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Severity-ordered listing
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_air_quality_stations_aqi
            ON air_quality_stations (((last_reading->>'aqi')::int) DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
