//! The forecast pipeline: Delay Normalizer, then Delay Forecaster.
//!
//! EXECUTION ORDER (fixed):
//!   1. Normalizer  — every row gets a defined delay_days
//!   2. Forecaster  — trailing means, one synthesized row per customer
//!
//! RULES:
//!   - `normalize_and_forecast` is pure: no I/O, no clock reads. The
//!     processing date comes in through `ProcessingClock`.
//!   - Each run recomputes everything from the actual rows it is given.
//!   - Stages report what they did as `PipelineEvent`s; persisting them is
//!     the store's job (`ForecastPipeline::run_and_save`).

use crate::{
    clock::ProcessingClock,
    config::{ForecastConfig, PipelineConfig},
    error::BillingResult,
    event::PipelineEvent,
    forecaster::{self, ForecastReport},
    ingest::{self, CsvImport},
    normalizer::{self, NormalizeReport},
    record::{BillingRecord, ForecastRecord},
    store::{BillingStore, UploadBatch},
    types::RunId,
};
use chrono::NaiveDate;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub processed_on: NaiveDate,
    /// Actual rows plus one forecast row per customer, sorted by
    /// (customer_id, period).
    pub rows:         Vec<ForecastRecord>,
    pub normalize:    NormalizeReport,
    pub forecast:     ForecastReport,
    pub events:       Vec<PipelineEvent>,
}

impl PipelineOutcome {
    pub fn forecast_rows(&self) -> impl Iterator<Item = &ForecastRecord> {
        self.rows.iter().filter(|r| r.is_forecast())
    }

    pub fn rows_for_customer<'a>(
        &'a self,
        customer_id: &'a str,
    ) -> impl Iterator<Item = &'a ForecastRecord> + 'a {
        self.rows.iter().filter(move |r| r.customer_id() == customer_id)
    }
}

/// Run both stages over `records`.
/// An empty input yields an empty output, not an error.
pub fn normalize_and_forecast(
    records: Vec<BillingRecord>,
    clock: &ProcessingClock,
    config: &ForecastConfig,
) -> PipelineOutcome {
    let today = clock.today();
    let mut events = vec![PipelineEvent::RunStarted {
        processed_on: today,
        input_rows:   records.len(),
    }];

    let normalized = normalizer::normalize(records, today);
    events.push(PipelineEvent::RowsNormalized {
        rows:                    normalized.report.rows,
        outstanding_as_of_today: normalized.report.outstanding_as_of_today,
        unresolved:              normalized.report.unresolved,
    });

    let forecasted = forecaster::forecast(normalized.rows, today, config);
    if forecasted.report.dropped_unorderable > 0 {
        events.push(PipelineEvent::UnorderableRowsDropped {
            count: forecasted.report.dropped_unorderable,
        });
    }
    events.push(PipelineEvent::ForecastsGenerated {
        customers:      forecasted.report.customers,
        forecasts:      forecasted.report.forecasts,
        stale_replaced: forecasted.report.stale_forecasts_replaced,
    });

    PipelineOutcome {
        processed_on: today,
        rows:         forecasted.rows,
        normalize:    normalized.report,
        forecast:     forecasted.report,
        events,
    }
}

/// A pipeline run persisted to the store.
#[derive(Debug, Clone)]
pub struct SavedRun {
    pub run_id:  RunId,
    pub outcome: PipelineOutcome,
}

/// Summary of one CSV upload.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub batch:  UploadBatch,
    pub import: CsvImport,
}

/// Config + clock bundle for callers that drive the store end to end.
pub struct ForecastPipeline {
    pub config: PipelineConfig,
    pub clock:  ProcessingClock,
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig, clock: ProcessingClock) -> Self {
        Self { config, clock }
    }

    pub fn run(&self, records: Vec<BillingRecord>) -> PipelineOutcome {
        normalize_and_forecast(records, &self.clock, &self.config.forecast)
    }

    /// Load the full history, run both stages, then replace the predictions
    /// table and log the run's events in one transaction.
    pub fn run_and_save(&self, store: &BillingStore) -> BillingResult<SavedRun> {
        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let history = store.load_history()?;
        let mut outcome = self.run(history);

        let saved = store.replace_predictions(&run_id, &outcome.rows, &outcome.events)?;
        outcome.events.push(PipelineEvent::PredictionsSaved { rows: saved });
        log::info!(
            "pipeline: {run_id} as of {} saved {saved} rows ({} forecasts)",
            outcome.processed_on, outcome.forecast.forecasts
        );
        Ok(SavedRun { run_id, outcome })
    }

    /// Read a CSV upload and store it as a new batch.
    /// A missing required column fails before anything is written.
    pub fn import_csv(&self, store: &BillingStore, path: &Path) -> BillingResult<ImportSummary> {
        let mut import = ingest::read_csv_path(path, &self.config.ingest)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let records = std::mem::take(&mut import.records);
        let batch = store.import_batch(&file_name, records)?;
        Ok(ImportSummary { batch, import })
    }

    /// Remove exactly the rows one upload contributed.
    pub fn delete_upload(&self, store: &BillingStore, batch_id: &str) -> BillingResult<usize> {
        store.delete_batch(batch_id)
    }
}
