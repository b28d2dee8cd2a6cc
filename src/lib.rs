//! Air-quality ingestion and synchronization.
//!
//! Pulls station readings from upstream monitoring networks, normalizes them
//! into one canonical shape with a derived severity index, keeps a durable
//! per-station record with bounded history, and answers on-demand
//! "current conditions" reads with a simulated fallback.
//!
//! The binary in `main.rs` wires these modules together; everything here is
//! usable on its own, which is how the integration tests drive it.

pub mod config;
pub mod fallback;
pub mod history;
pub mod live;
pub mod models;
pub mod normalize;
pub mod routes;
pub mod schema;
pub mod scheduler;
pub mod severity;
pub mod store;
pub mod sync;
pub mod upstream;

#[cfg(test)]
mod test_support;

pub use config::Config;
