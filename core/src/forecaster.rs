//! Delay Forecaster: trailing-mean projection of the next billing cycle.
//!
//! Per customer:
//!   1. Order actual rows by period; forecast_delay = trailing mean of
//!      delay_days over the configured window (partial windows allowed).
//!   2. Take the row with the latest period as the last known cycle.
//!   3. Synthesize the next cycle's row (period + 1, bill start + 1 month,
//!      due = start + due_offset_days, BELUM_DIBAYAR, is_forecast).
//!   4. Drop any stale forecast rows and append the new one.
//!
//! Output is sorted by (customer_id, period). Customers are independent:
//! nothing computed for one customer reads another customer's rows.

use crate::{
    config::ForecastConfig,
    dates,
    normalizer::delay_between,
    period::Period,
    record::{BillingRecord, DelayBasis, ForecastRecord, NormalizedRecord},
    status::PaymentStatus,
    types::CustomerId,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub customers:                usize,
    pub forecasts:                usize,
    /// Rows excluded because their period could not be parsed.
    pub dropped_unorderable:      usize,
    /// Forecast rows from an earlier run that were discarded.
    pub stale_forecasts_replaced: usize,
    /// Customers left without a forecast because the next period does
    /// not exist (last cycle 999912).
    pub next_period_out_of_range: usize,
}

#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub rows:   Vec<ForecastRecord>,
    pub report: ForecastReport,
}

/// Trailing means over `window` values, accepting partial windows at the
/// start of the series. `[10, 20, 40]` with window 2 gives
/// `[10.0, 15.0, 30.0]`.
pub fn trailing_means(values: &[i64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let slice = &values[(i + 1).saturating_sub(window)..=i];
            slice.iter().sum::<i64>() as f64 / slice.len() as f64
        })
        .collect()
}

pub fn forecast(
    rows: Vec<NormalizedRecord>,
    today: NaiveDate,
    config: &ForecastConfig,
) -> ForecastOutcome {
    let mut report = ForecastReport::default();
    let mut by_customer: BTreeMap<CustomerId, Vec<NormalizedRecord>> = BTreeMap::new();

    for row in rows {
        if row.record.is_forecast {
            report.stale_forecasts_replaced += 1;
            continue;
        }
        if row.record.period.is_none() {
            report.dropped_unorderable += 1;
            log::debug!(
                "forecast: dropping bill {} (customer {}): period not parsable",
                row.record.bill_code, row.record.customer_id
            );
            continue;
        }
        by_customer.entry(row.record.customer_id.clone()).or_default().push(row);
    }

    if report.dropped_unorderable > 0 {
        log::warn!(
            "forecast: {} rows without a valid period were excluded",
            report.dropped_unorderable
        );
    }

    let mut output = Vec::new();
    for (customer_id, mut history) in by_customer {
        history.sort_by_key(|r| r.record.period);

        let delays: Vec<i64> = history.iter().map(|r| r.delay_days).collect();
        let means = trailing_means(&delays, config.window);
        let mut projected: Vec<ForecastRecord> = history
            .into_iter()
            .zip(means)
            .map(|(row, forecast_delay)| ForecastRecord { row, forecast_delay })
            .collect();

        let next = match projected.last() {
            Some(last) => match last.period().map(Period::next) {
                Some(Ok(period)) => Some(synthesize_next(last, period, today, config)),
                Some(Err(e)) => {
                    log::warn!("forecast: customer {customer_id} gets no forecast: {e}");
                    report.next_period_out_of_range += 1;
                    None
                }
                None => None,
            },
            None => None,
        };
        if let Some(next) = next {
            log::debug!(
                "forecast: customer {customer_id} next period {} forecast_delay {:.1}",
                next.period().map(|p| p.to_string()).unwrap_or_default(),
                next.forecast_delay
            );
            projected.push(next);
            report.forecasts += 1;
        }
        report.customers += 1;
        output.extend(projected);
    }

    // BTreeMap iteration is customer-ordered and each group is period-sorted,
    // so `output` is already ordered by (customer_id, period).
    log::info!(
        "forecast: {} customers, {} forecast rows, {} stale replaced",
        report.customers, report.forecasts, report.stale_forecasts_replaced
    );

    ForecastOutcome { rows: output, report }
}

/// Build the predicted row for `period`, the cycle after `last`.
fn synthesize_next(
    last: &ForecastRecord,
    period: Period,
    today: NaiveDate,
    config: &ForecastConfig,
) -> ForecastRecord {
    let source = &last.row.record;

    let bill_start_date = source.bill_start_date.and_then(dates::add_one_month);
    let due_date = bill_start_date.map(|d| d + Duration::days(config.due_offset_days));

    let (delay_days, delay_basis) = match delay_between(bill_start_date, Some(today)) {
        Some(days) => (days, DelayBasis::OutstandingAsOf(today)),
        None => (0, DelayBasis::Unresolved),
    };

    let record = BillingRecord {
        bill_code:       format!("{period}{}", source.customer_id),
        customer_id:     source.customer_id.clone(),
        period:          Some(period),
        tariff_code:     source.tariff_code.clone(),
        subgroup:        source.subgroup.clone(),
        zone:            source.zone.clone(),
        bill_start_date,
        due_date,
        paid_date:       None,
        amount_due:      source.amount_due,
        status:          PaymentStatus::BelumDibayar,
        is_forecast:     true,
        batch_id:        None,
    };

    ForecastRecord {
        row: NormalizedRecord { record, delay_days, delay_basis },
        forecast_delay: last.forecast_delay,
    }
}
