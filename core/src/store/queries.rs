//! Read-only selections over history and predictions.
//! Simple filters for reporting; no forecasting logic lives here.

use super::{
    prediction::{prediction_columns, prediction_from_row},
    record_from_row, BillingStore, RECORD_COLUMNS,
};
use crate::{
    error::BillingResult,
    period::Period,
    record::{BillingRecord, ForecastRecord},
    status::PaymentStatus,
};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period:          Period,
    pub total_revenue:   f64,
    pub total_customers: i64,
    pub total_late:      i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStatusCounts {
    pub period:  Period,
    pub on_time: i64,
    pub late:    i64,
    pub unpaid:  i64,
}

/// Late customers per period for one grouping key (zone or subgroup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateCount {
    pub period:    Period,
    pub key:       String,
    pub customers: i64,
}

fn to_period(code: i64) -> rusqlite::Result<Period> {
    Period::from_code(code).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Integer, Box::new(e))
    })
}

impl BillingStore {
    // ── Predictions ───────────────────────────────────────────────

    pub fn predictions_for_customer(&self, customer_id: &str) -> BillingResult<Vec<ForecastRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM payment_prediction WHERE customer_id = ?1 ORDER BY period ASC",
            prediction_columns()
        ))?;
        let rows = stmt.query_map(params![customer_id], prediction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn predictions_for_period(&self, period: Period) -> BillingResult<Vec<ForecastRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM payment_prediction WHERE period = ?1 ORDER BY customer_id ASC",
            prediction_columns()
        ))?;
        let rows = stmt.query_map(params![i64::from(period)], prediction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Synthesized next-cycle rows only.
    pub fn forecast_rows(&self) -> BillingResult<Vec<ForecastRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM payment_prediction WHERE is_forecast = 1
             ORDER BY customer_id ASC",
            prediction_columns()
        ))?;
        let rows = stmt.query_map([], prediction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Forecast rows for `period` whose projected delay exceeds
    /// `threshold_days`: customers likely to pay late next cycle.
    pub fn late_forecasts(
        &self,
        period: Period,
        threshold_days: f64,
    ) -> BillingResult<Vec<ForecastRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM payment_prediction
             WHERE is_forecast = 1 AND forecast_delay > ?1 AND period = ?2
             ORDER BY customer_id ASC",
            prediction_columns()
        ))?;
        let rows = stmt.query_map(params![threshold_days, i64::from(period)], prediction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct periods that carry forecast rows, ascending.
    pub fn forecast_periods(&self) -> BillingResult<Vec<Period>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT period FROM payment_prediction
             WHERE is_forecast = 1 ORDER BY period ASC",
        )?;
        let rows = stmt.query_map([], |row| to_period(row.get(0)?))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── History ───────────────────────────────────────────────────

    /// Distinct billing periods in the history, newest first.
    pub fn available_periods(&self) -> BillingResult<Vec<Period>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT period FROM billing_history
             WHERE period IS NOT NULL ORDER BY period DESC",
        )?;
        let rows = stmt.query_map([], |row| to_period(row.get(0)?))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn history_for_period(&self, period: Period) -> BillingResult<Vec<BillingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM billing_history
             WHERE period = ?1 ORDER BY customer_id ASC"
        ))?;
        let rows = stmt.query_map(params![i64::from(period)], |row| record_from_row(row, false))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Actual bills still unpaid, oldest period first.
    pub fn unpaid_history(&self) -> BillingResult<Vec<BillingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM billing_history
             WHERE status = ?1 ORDER BY period ASC, customer_id ASC"
        ))?;
        let rows = stmt.query_map(params![PaymentStatus::BelumDibayar.as_str()], |row| {
            record_from_row(row, false)
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Revenue billed, distinct customers and late bills for one period.
    pub fn period_summary(&self, period: Period) -> BillingResult<PeriodSummary> {
        let summary = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_due), 0),
                    COUNT(DISTINCT customer_id),
                    COALESCE(SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END), 0)
             FROM billing_history WHERE period = ?1",
            params![i64::from(period), PaymentStatus::Terlambat.as_str()],
            |row| {
                Ok(PeriodSummary {
                    period,
                    total_revenue: row.get(0)?,
                    total_customers: row.get(1)?,
                    total_late: row.get(2)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Status counts per period, newest first.
    pub fn status_counts(&self) -> BillingResult<Vec<PeriodStatusCounts>> {
        let mut stmt = self.conn.prepare(
            "SELECT period,
                    SUM(CASE WHEN status = ?1 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = ?3 THEN 1 ELSE 0 END)
             FROM billing_history WHERE period IS NOT NULL
             GROUP BY period ORDER BY period DESC",
        )?;
        let rows = stmt.query_map(
            params![
                PaymentStatus::TepatWaktu.as_str(),
                PaymentStatus::Terlambat.as_str(),
                PaymentStatus::BelumDibayar.as_str(),
            ],
            |row| {
                Ok(PeriodStatusCounts {
                    period: to_period(row.get(0)?)?,
                    on_time: row.get(1)?,
                    late: row.get(2)?,
                    unpaid: row.get(3)?,
                })
            },
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn late_by_zone(&self) -> BillingResult<Vec<LateCount>> {
        self.late_grouped_by("zone")
    }

    pub fn late_by_subgroup(&self) -> BillingResult<Vec<LateCount>> {
        self.late_grouped_by("subgroup")
    }

    /// `column` is always one of our own literals, never user input.
    fn late_grouped_by(&self, column: &'static str) -> BillingResult<Vec<LateCount>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT period, {column}, COUNT(DISTINCT customer_id)
             FROM billing_history
             WHERE status = ?1 AND period IS NOT NULL
             GROUP BY period, {column} ORDER BY period ASC, {column} ASC"
        ))?;
        let rows = stmt.query_map(params![PaymentStatus::Terlambat.as_str()], |row| {
            Ok(LateCount {
                period: to_period(row.get(0)?)?,
                key: row.get(1)?,
                customers: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
