//! Upstream monitoring-network clients.
//!
//! Each provider gets an adapter implementing [`UpstreamSource`]. Adapters
//! only translate the provider's envelope into source-neutral [`RawStation`]
//! records; validation, unit conversion and index computation all happen in
//! the normalizer. Adapters never retry: the caller's schedule is the retry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

mod cpcb;
mod openaq;
mod waqi;

pub use cpcb::CpcbSource;
pub use openaq::OpenAqSource;
pub use waqi::WaqiSource;

// ---

/// Failure of a single upstream fetch.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// DNS, connect, TLS or timeout failure.
    #[error("upstream unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    /// Reachable, but answered with a non-success HTTP status.
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Payload could not be decoded into the provider's envelope.
    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    /// Envelope decoded, but the provider reports a non-ok status.
    #[error("upstream rejected request: {0}")]
    Rejected(String),

    /// The adapter is missing a credential it needs.
    #[error("upstream source '{0}' is not configured")]
    Disabled(&'static str),
}

impl UpstreamError {
    /// True for network-level failures, as opposed to business failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, UpstreamError::Transport(_))
    }
}

/// A source-specific measurement before unit normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
    // ---
    /// Number or numeric string; anything else is treated as absent.
    pub value: Value,
    pub unit: Option<String>,
}

impl RawMeasurement {
    pub fn new(value: Value, unit: Option<String>) -> Self {
        Self { value, unit }
    }
}

/// One station entry as reported upstream, still loosely typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStation {
    // ---
    pub name: Option<String>,
    pub address: Option<String>,
    pub zone: Option<String>,
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
    /// Upstream-reported severity index, when the provider computes one.
    pub index: Option<Value>,
    pub pm25: Option<RawMeasurement>,
    pub pm10: Option<RawMeasurement>,
    pub no2: Option<RawMeasurement>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// A monitoring network that can be polled for its current station set.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Short identifier used in logs and cycle reports.
    fn name(&self) -> &'static str;

    /// Fetch the current station set for the configured region.
    async fn fetch(&self) -> Result<Vec<RawStation>, UpstreamError>;
}

// ---

/// Build the HTTP client shared by all adapters.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    // ---
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("airsync/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Issue a GET and decode the body as JSON, mapping failures onto
/// [`UpstreamError`] variants.
async fn get_json(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, UpstreamError> {
    // ---
    let response = client
        .get(url)
        .query(query)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(UpstreamError::Transport)?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status { status, body });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| UpstreamError::Malformed(e.to_string()))
}

/// Display name of a station: the first comma-separated segment of the
/// provider's full label (`"Anand Vihar, Delhi, India"` → `"Anand Vihar"`).
fn display_name(full: &str) -> String {
    full.split(',').next().unwrap_or(full).trim().to_string()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_display_name_takes_first_segment() {
        // ---
        assert_eq!(display_name("Anand Vihar, Delhi, India"), "Anand Vihar");
        assert_eq!(display_name("Lodhi Road"), "Lodhi Road");
        assert_eq!(display_name("  Pusa , Delhi - IMD"), "Pusa");
    }

    #[test]
    fn test_transport_is_distinguishable() {
        // ---
        let rejected = UpstreamError::Rejected("Invalid key".into());
        assert!(!rejected.is_transport());
        assert_eq!(rejected.to_string(), "upstream rejected request: Invalid key");
    }
}
