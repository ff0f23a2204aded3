//! Shared primitive types used across the pipeline.

/// Stable customer identifier (`no_plg`), opaque to the pipeline.
pub type CustomerId = String;

/// Unique bill identifier (`kode_tagihan`). One per customer per cycle.
pub type BillCode = String;

/// Identifier of one ingestion (one CSV upload).
pub type BatchId = String;

/// Identifier of one forecast run, used to key the event log.
pub type RunId = String;
