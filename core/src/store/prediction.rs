use super::{record_from_row, write_event, BillingStore, RECORD_COLUMNS};
use crate::{
    dates::{self, format_date},
    error::BillingResult,
    event::{EventLogEntry, PipelineEvent},
    record::{DelayBasis, ForecastRecord, NormalizedRecord},
};
use rusqlite::{params, Row};

/// Prediction columns in `prediction_from_row` order.
pub(super) fn prediction_columns() -> String {
    format!("{RECORD_COLUMNS}, is_forecast, delay_days, delay_basis, delay_as_of, forecast_delay")
}

pub(super) fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<ForecastRecord> {
    let is_forecast = row.get::<_, i32>(12)? != 0;
    let record = record_from_row(row, is_forecast)?;
    let delay_days: i64 = row.get(13)?;
    let basis: String = row.get(14)?;
    let as_of = row.get::<_, Option<String>>(15)?.and_then(|s| dates::parse_date(&s));
    let delay_basis = match (basis.as_str(), as_of) {
        ("paid", _) => DelayBasis::Paid,
        ("outstanding", Some(d)) => DelayBasis::OutstandingAsOf(d),
        _ => DelayBasis::Unresolved,
    };
    Ok(ForecastRecord {
        row: NormalizedRecord { record, delay_days, delay_basis },
        forecast_delay: row.get(16)?,
    })
}

impl BillingStore {
    // ── Predictions ───────────────────────────────────────────────

    /// Replace the predictions table with the output of run `run_id` and
    /// log the run's `events`, followed by `PredictionsSaved`, in the same
    /// transaction. Returns the number of prediction rows written.
    pub fn replace_predictions(
        &self,
        run_id: &str,
        rows: &[ForecastRecord],
        events: &[PipelineEvent],
    ) -> BillingResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM payment_prediction", [])?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO payment_prediction (
                    bill_code, customer_id, period, tariff_code, subgroup, zone,
                    bill_start_date, due_date, paid_date, amount_due, status, batch_id,
                    is_forecast, delay_days, delay_basis, delay_as_of, forecast_delay, run_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )?;
            for f in rows {
                let r = &f.row.record;
                // Forecaster output always has a period; anything else is skipped.
                let Some(period) = r.period else { continue };
                stmt.execute(params![
                    &r.bill_code,
                    &r.customer_id,
                    i64::from(period),
                    &r.tariff_code,
                    &r.subgroup,
                    &r.zone,
                    format_date(r.bill_start_date),
                    format_date(r.due_date),
                    format_date(r.paid_date),
                    r.amount_due,
                    r.status.as_str(),
                    &r.batch_id,
                    r.is_forecast as i32,
                    f.row.delay_days,
                    f.row.delay_basis.as_str(),
                    format_date(f.row.delay_basis.as_of()),
                    f.forecast_delay,
                    run_id,
                ])?;
                written += 1;
            }
        }
        let saved = PipelineEvent::PredictionsSaved { rows: written };
        for event in events.iter().chain(std::iter::once(&saved)) {
            write_event(&tx, &EventLogEntry::from_event(run_id, event)?)?;
        }
        tx.commit()?;
        log::info!("store: {written} prediction rows saved for {run_id}");
        Ok(written)
    }

    pub fn prediction_count(&self) -> BillingResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM payment_prediction", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Full predictions table, ordered by (customer_id, period).
    pub fn load_predictions(&self) -> BillingResult<Vec<ForecastRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM payment_prediction ORDER BY customer_id ASC, period ASC",
            prediction_columns()
        ))?;
        let rows = stmt.query_map([], prediction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
