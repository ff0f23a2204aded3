//! paydelay-core: water-utility bill payment tracking and next-cycle
//! payment-delay forecasting.
//!
//! Flow: `ingest` (CSV) → `store` (SQLite) → `pipeline`
//! (`normalizer` → `forecaster`) → `store` (predictions) → queries.

pub mod clock;
pub mod config;
pub mod dates;
pub mod error;
pub mod event;
pub mod forecaster;
pub mod ingest;
pub mod normalizer;
pub mod period;
pub mod pipeline;
pub mod record;
pub mod sample;
pub mod status;
pub mod store;
pub mod types;

pub use pipeline::normalize_and_forecast;
