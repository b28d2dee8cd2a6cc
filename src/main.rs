//! Application entry point for the `airsync` service.
//!
//! Startup sequence:
//! - Load configuration from environment variables or `.env`
//! - Initialize structured logging/tracing
//! - Select the station store (PostgreSQL when `DATABASE_URL` is set,
//!   in-memory otherwise) and create the schema if needed
//! - Build the upstream adapters, the live query service and the sync jobs
//! - Start the scheduler, then serve the HTTP API until Ctrl-C
//!
//! See `config.rs` for the full list of environment variables. Logging is
//! controlled by `RUST_LOG`, or `AXUM_LOG_LEVEL` (default: `debug`), plus
//! `AXUM_SPAN_EVENTS` and `FORCE_COLOR`.
use std::{env, io::IsTerminal, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use reqwest::Client;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use airsync::{
    config,
    fallback::FallbackGenerator,
    live::LiveQueryService,
    normalize::Normalizer,
    routes::{self, AppState},
    scheduler::{Job, Scheduler},
    schema,
    store::{MemoryStationStore, PgStationStore, StationStore},
    sync::SyncCycle,
    upstream::{self, CpcbSource, OpenAqSource, UpstreamSource, WaqiSource},
    Config,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let store = connect_store(&cfg).await?;
    let client = upstream::http_client(cfg.http_timeout).context("Failed to build HTTP client")?;

    let normalizer = Normalizer::new(cfg.zone.clone());
    let fallback = FallbackGenerator::new(cfg.zone.clone());

    let live_source = cfg.live_token().map(|token| {
        Arc::new(WaqiSource::new(
            client.clone(),
            &cfg.waqi_url,
            token.to_string(),
            cfg.bounds,
        )) as Arc<dyn UpstreamSource>
    });
    if live_source.is_none() {
        tracing::warn!("WAQI_TOKEN not set or demo; live endpoint will serve simulated data");
    }
    let live = Arc::new(LiveQueryService::new(
        live_source,
        normalizer.clone(),
        fallback,
    ));

    let scheduler = Scheduler::start(build_jobs(&cfg, &client, &normalizer, &store));

    let app = routes::router(AppState::new(store, live));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    Ok(())
}

// ---

async fn connect_store(cfg: &Config) -> Result<Arc<dyn StationStore>> {
    // ---
    let Some(db_url) = cfg.db_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; station records are kept in memory only");
        return Ok(Arc::new(MemoryStationStore::new()));
    };

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(db_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;
    Ok(Arc::new(PgStationStore::new(pool)))
}

/// Sync jobs: the primary air-quality source on its interval plus one run
/// shortly after startup, and the secondary source when it has a key.
fn build_jobs(
    cfg: &Config,
    client: &Client,
    normalizer: &Normalizer,
    store: &Arc<dyn StationStore>,
) -> Vec<Job> {
    // ---
    let openaq = OpenAqSource::new(
        client.clone(),
        &cfg.openaq_url,
        cfg.city.clone(),
        cfg.country.clone(),
        cfg.upstream_limit,
    );
    let primary = SyncCycle::new(Arc::new(openaq), normalizer.clone(), store.clone());

    let mut jobs = vec![
        Job::every(Arc::new(primary), cfg.air_quality_interval).with_initial_run(cfg.startup_delay),
    ];

    match &cfg.cpcb_api_key {
        Some(key) => {
            let cpcb = CpcbSource::new(
                client.clone(),
                &cfg.cpcb_url,
                key.clone(),
                cfg.city.clone(),
                cfg.upstream_limit,
            );
            let secondary = SyncCycle::new(Arc::new(cpcb), normalizer.clone(), store.clone());
            jobs.push(Job::every(Arc::new(secondary), cfg.secondary_interval));
        }
        None => tracing::info!("CPCB_API_KEY not set; secondary sync disabled"),
    }

    jobs
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize the global tracing subscriber for structured logging.
///
/// - Target, file and line number are included in every event
/// - Colors: `FORCE_COLOR=1|true|yes` forces on, `0|false|no` forces off,
///   anything else auto-detects a TTY
/// - Span events from `AXUM_SPAN_EVENTS`: `"full"` for enter/exit/close with
///   timing, `"enter_exit"` for enter and exit only, otherwise close only
/// - Level from `RUST_LOG` when set, else `AXUM_LOG_LEVEL` (default `debug`)
///
/// Must be called once, before any tracing macros are used.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some(level @ ("trace" | "debug" | "info" | "warn" | "error")) => level.to_string(),
            _ => "debug".to_string(),
        };
        // Quiet per-query sqlx and per-request hyper chatter
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
