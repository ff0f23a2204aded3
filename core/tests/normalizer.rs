//! Delay Normalizer tests.
//!
//! Covers: paid delay, the as-of-today rule for unpaid bills, rows the rule
//! must leave alone, and zero-fill when dates are missing.

use chrono::NaiveDate;
use paydelay_core::{
    normalizer::{normalize, normalize_record},
    period::Period,
    record::{BillingRecord, DelayBasis},
    status::PaymentStatus,
};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn bill(period: u32, start: Option<NaiveDate>, paid: Option<NaiveDate>, status: PaymentStatus) -> BillingRecord {
    BillingRecord {
        bill_code:       format!("{period}2259AA"),
        customer_id:     "2259AA".into(),
        period:          Some(Period::from_code(period as i64).unwrap()),
        tariff_code:     "3.1".into(),
        subgroup:        "Rumah Menengah".into(),
        zone:            "101".into(),
        bill_start_date: start,
        due_date:        start.map(|d| d + chrono::Duration::days(14)),
        paid_date:       paid,
        amount_due:      120_000.0,
        status,
        is_forecast:     false,
        batch_id:        None,
    }
}

/// Paid bill: delay is paid_date - bill_start_date.
#[test]
fn paid_bill_delay_is_days_from_start() {
    let row = normalize_record(
        bill(202501, Some(ymd(2025, 1, 1)), Some(ymd(2025, 1, 10)), PaymentStatus::TepatWaktu),
        ymd(2025, 6, 1),
    );
    assert_eq!(row.delay_days, 9);
    assert_eq!(row.delay_basis, DelayBasis::Paid);
}

/// Unpaid actual bill opened 2025-01-01, processed on 2025-01-20 → 19 days so far.
#[test]
fn unpaid_bill_is_measured_up_to_today() {
    let today = ymd(2025, 1, 20);
    let row = normalize_record(
        bill(202501, Some(ymd(2025, 1, 1)), None, PaymentStatus::BelumDibayar),
        today,
    );
    assert_eq!(row.delay_days, 19);
    assert_eq!(row.delay_basis, DelayBasis::OutstandingAsOf(today));
    assert_eq!(row.effective_paid_date(), Some(today));
}

/// The placeholder never becomes a stored payment date.
#[test]
fn placeholder_does_not_touch_paid_date() {
    let row = normalize_record(
        bill(202501, Some(ymd(2025, 1, 1)), None, PaymentStatus::BelumDibayar),
        ymd(2025, 1, 20),
    );
    assert_eq!(row.record.paid_date, None);
    assert_eq!(row.record.status, PaymentStatus::BelumDibayar);
}

/// Forecast rows are not subject to the as-of-today rule.
#[test]
fn forecast_rows_are_left_alone() {
    let mut forecast = bill(202502, Some(ymd(2025, 2, 1)), None, PaymentStatus::BelumDibayar);
    forecast.is_forecast = true;

    let row = normalize_record(forecast, ymd(2025, 2, 20));
    assert_eq!(row.delay_days, 0);
    assert_eq!(row.delay_basis, DelayBasis::Unresolved);
}

/// A late payment keeps its real date even when the status column says unpaid.
#[test]
fn existing_paid_date_wins_over_placeholder() {
    let row = normalize_record(
        bill(202501, Some(ymd(2025, 1, 1)), Some(ymd(2025, 1, 30)), PaymentStatus::BelumDibayar),
        ymd(2025, 3, 1),
    );
    assert_eq!(row.delay_days, 29);
    assert_eq!(row.delay_basis, DelayBasis::Paid);
}

/// Missing bill start (malformed upstream) zero-fills instead of failing.
#[test]
fn missing_dates_zero_fill() {
    let no_start = normalize_record(
        bill(202501, None, Some(ymd(2025, 1, 10)), PaymentStatus::Terlambat),
        ymd(2025, 3, 1),
    );
    assert_eq!(no_start.delay_days, 0);
    assert_eq!(no_start.delay_basis, DelayBasis::Unresolved);

    let nothing = normalize_record(bill(202501, None, None, PaymentStatus::BelumDibayar), ymd(2025, 3, 1));
    assert_eq!(nothing.delay_days, 0);
}

/// Paid before the bill opened gives a negative delay, not a clamp.
#[test]
fn delay_is_signed() {
    let row = normalize_record(
        bill(202501, Some(ymd(2025, 1, 10)), Some(ymd(2025, 1, 5)), PaymentStatus::TepatWaktu),
        ymd(2025, 3, 1),
    );
    assert_eq!(row.delay_days, -5);
}

/// Report counts and row order are preserved.
#[test]
fn normalize_reports_counts_and_keeps_order() {
    let today = ymd(2025, 3, 1);
    let out = normalize(
        vec![
            bill(202502, Some(ymd(2025, 2, 1)), None, PaymentStatus::BelumDibayar),
            bill(202501, Some(ymd(2025, 1, 1)), Some(ymd(2025, 1, 3)), PaymentStatus::TepatWaktu),
            bill(202503, None, None, PaymentStatus::BelumDibayar),
        ],
        today,
    );

    assert_eq!(out.report.rows, 3);
    assert_eq!(out.report.outstanding_as_of_today, 1);
    assert_eq!(out.report.unresolved, 1);

    let periods: Vec<u32> = out.rows.iter().map(|r| r.record.period.unwrap().code()).collect();
    assert_eq!(periods, vec![202502, 202501, 202503]);
    assert_eq!(out.rows[0].delay_days, 28);
}

/// Forecast rows fed back from an earlier run are not data-quality
/// problems: they stay out of the unresolved count.
#[test]
fn stale_forecast_rows_are_not_counted_unresolved() {
    let mut stale = bill(202503, Some(ymd(2025, 3, 1)), None, PaymentStatus::BelumDibayar);
    stale.is_forecast = true;
    let out = normalize(
        vec![bill(202502, Some(ymd(2025, 2, 1)), Some(ymd(2025, 2, 9)), PaymentStatus::TepatWaktu), stale],
        ymd(2025, 3, 10),
    );

    assert_eq!(out.report.rows, 2);
    assert_eq!(out.report.unresolved, 0);
    assert_eq!(out.rows[1].delay_basis, DelayBasis::Unresolved);
}

#[test]
fn empty_input_is_empty_output() {
    let out = normalize(Vec::new(), ymd(2025, 1, 1));
    assert!(out.rows.is_empty());
    assert_eq!(out.report.rows, 0);
}
