//! Pipeline event log.
//!
//! Pipeline stages and the import/delete paths return events instead of
//! writing anywhere; the store persists them as JSON payloads keyed by run.

use crate::types::{BatchId, RunId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Every event recorded by a run or an upload operation.
/// Variants are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    // ── Forecast run ───────────────────────────────
    RunStarted {
        processed_on: NaiveDate,
        input_rows:   usize,
    },
    RowsNormalized {
        rows:                    usize,
        outstanding_as_of_today: usize,
        unresolved:              usize,
    },
    UnorderableRowsDropped {
        count: usize,
    },
    ForecastsGenerated {
        customers:      usize,
        forecasts:      usize,
        stale_replaced: usize,
    },
    PredictionsSaved {
        rows: usize,
    },

    // ── Upload history ─────────────────────────────
    BatchImported {
        batch_id:  BatchId,
        file_name: String,
        rows:      usize,
    },
    BatchDeleted {
        batch_id:     BatchId,
        rows_removed: usize,
    },
}

impl PipelineEvent {
    /// Stable name stored in the event_type column.
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::RunStarted { .. }             => "run_started",
            PipelineEvent::RowsNormalized { .. }         => "rows_normalized",
            PipelineEvent::UnorderableRowsDropped { .. } => "unorderable_rows_dropped",
            PipelineEvent::ForecastsGenerated { .. }     => "forecasts_generated",
            PipelineEvent::PredictionsSaved { .. }       => "predictions_saved",
            PipelineEvent::BatchImported { .. }          => "batch_imported",
            PipelineEvent::BatchDeleted { .. }           => "batch_deleted",
        }
    }
}

/// A persisted event log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:          Option<i64>,
    pub run_id:      RunId,
    pub event_type:  String,
    pub payload:     String, // JSON-serialized PipelineEvent
    pub recorded_at: String,
}

impl EventLogEntry {
    pub fn from_event(run_id: &str, event: &PipelineEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id:          None,
            run_id:      run_id.to_string(),
            event_type:  event.event_type().to_string(),
            payload:     serde_json::to_string(event)?,
            recorded_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        })
    }

    pub fn event(&self) -> serde_json::Result<PipelineEvent> {
        serde_json::from_str(&self.payload)
    }
}
