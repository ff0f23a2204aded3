//! Delay Normalizer: gives every billing row a defined `delay_days`.
//!
//! Rules, applied per row:
//!   1. Actual + BELUM_DIBAYAR + no paid_date: measure the delay up to
//!      `today`. The row's paid_date stays empty.
//!   2. Otherwise measure up to paid_date.
//!   3. If either end of the interval is missing, delay_days = 0.
//!
//! Nothing here fails: malformed dates were already degraded to `None`
//! at the ingestion boundary.

use crate::record::{BillingRecord, DelayBasis, NormalizedRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub rows:                    usize,
    /// Rows whose delay was measured up to the processing date.
    pub outstanding_as_of_today: usize,
    /// Actual rows zero-filled because a date was missing.
    pub unresolved:              usize,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub rows:   Vec<NormalizedRecord>,
    pub report: NormalizeReport,
}

/// Signed whole days from `start` to `end`, if both are known.
pub fn delay_between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<i64> {
    Some((end? - start?).num_days())
}

pub fn normalize_record(record: BillingRecord, today: NaiveDate) -> NormalizedRecord {
    let outstanding = record.is_outstanding();
    let end = if outstanding { Some(today) } else { record.paid_date };

    let (delay_days, delay_basis) = match delay_between(record.bill_start_date, end) {
        Some(days) if outstanding => (days, DelayBasis::OutstandingAsOf(today)),
        Some(days) => (days, DelayBasis::Paid),
        None => (0, DelayBasis::Unresolved),
    };

    NormalizedRecord { record, delay_days, delay_basis }
}

pub fn normalize(records: Vec<BillingRecord>, today: NaiveDate) -> Normalized {
    let mut report = NormalizeReport { rows: records.len(), ..Default::default() };

    let rows: Vec<NormalizedRecord> = records
        .into_iter()
        .map(|record| normalize_record(record, today))
        .inspect(|row| match row.delay_basis {
            DelayBasis::OutstandingAsOf(_) => report.outstanding_as_of_today += 1,
            // Forecast rows carry no payment date by construction.
            DelayBasis::Unresolved if row.record.is_forecast => {}
            DelayBasis::Unresolved => {
                report.unresolved += 1;
                log::debug!(
                    "normalize: bill {} (customer {}) has no usable dates, delay zero-filled",
                    row.record.bill_code, row.record.customer_id
                );
            }
            DelayBasis::Paid => {}
        })
        .collect();

    if report.unresolved > 0 {
        log::warn!(
            "normalize: {} of {} rows lacked a bill start or payment date; delay set to 0",
            report.unresolved, report.rows
        );
    }
    log::info!(
        "normalize: {} rows as of {today}, {} outstanding",
        report.rows, report.outstanding_as_of_today
    );

    Normalized { rows, report }
}
