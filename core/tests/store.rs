//! Persistence tests for upload batches, history upsert, prediction
//! replacement, reporting queries and the run event log.

use chrono::NaiveDate;
use paydelay_core::{
    clock::ProcessingClock,
    config::PipelineConfig,
    error::BillingError,
    event::PipelineEvent,
    period::Period,
    pipeline::ForecastPipeline,
    record::{BillingRecord, DelayBasis},
    status::PaymentStatus,
    store::BillingStore,
};
use std::fs;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn store() -> BillingStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let s = BillingStore::in_memory().expect("open store");
    s.migrate().expect("migrate");
    s
}

fn bill(customer: &str, period: u32, zone: &str, delay: Option<i64>) -> BillingRecord {
    let p = Period::from_code(period as i64).unwrap();
    let start = ymd(p.year() as i32, p.month(), 1);
    let due = start + chrono::Duration::days(14);
    let paid = delay.map(|d| start + chrono::Duration::days(d));
    BillingRecord {
        bill_code:       format!("{period}{customer}"),
        customer_id:     customer.into(),
        period:          Some(p),
        tariff_code:     "3.1".into(),
        subgroup:        "Rumah Menengah".into(),
        zone:            zone.into(),
        bill_start_date: Some(start),
        due_date:        Some(due),
        paid_date:       paid,
        amount_due:      100_000.0,
        status:          PaymentStatus::classify(paid, Some(due)),
        is_forecast:     false,
        batch_id:        None,
    }
}

fn pipeline(today: NaiveDate) -> ForecastPipeline {
    ForecastPipeline::new(PipelineConfig::default(), ProcessingClock::fixed(today))
}

// ── Upload batches ───────────────────────────────────────────────────────────

#[test]
fn deleting_a_batch_removes_only_its_rows() {
    let s = store();
    let jan = s
        .import_batch("januari.csv", vec![bill("A", 202501, "101", Some(5)), bill("B", 202501, "102", Some(20))])
        .unwrap();
    let feb = s
        .import_batch("februari.csv", vec![bill("A", 202502, "101", Some(3)), bill("B", 202502, "102", None)])
        .unwrap();

    let batches = s.upload_batches().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].file_name, "januari.csv");
    assert_eq!(batches[1].row_count, 2);
    assert_eq!(s.history_count().unwrap(), 4);

    let removed = s.delete_batch(&jan.batch_id).unwrap();
    assert_eq!(removed, 2);

    let left = s.load_history().unwrap();
    assert_eq!(left.len(), 2);
    assert!(left.iter().all(|r| r.batch_id.as_deref() == Some(feb.batch_id.as_str())));
    assert!(s.upload_batch(&jan.batch_id).unwrap().is_none());
}

/// A bill re-uploaded in a later batch belongs to that batch afterwards.
#[test]
fn reuploaded_bill_moves_to_newer_batch() {
    let s = store();
    let first = s.import_batch("a.csv", vec![bill("A", 202501, "101", None)]).unwrap();
    let second = s.import_batch("b.csv", vec![bill("A", 202501, "101", Some(4))]).unwrap();

    assert_eq!(s.delete_batch(&first.batch_id).unwrap(), 0);
    let rows = s.history_for_customer("A").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].paid_date, Some(ymd(2025, 1, 5)));
    assert_eq!(rows[0].batch_id.as_deref(), Some(second.batch_id.as_str()));
}

/// The logged row count is what the batch holds after writing: forecast
/// rows are skipped and a repeated bill code counts once.
#[test]
fn batch_row_count_is_rows_written() {
    let s = store();
    let mut forecast = bill("A", 202502, "101", None);
    forecast.is_forecast = true;
    let batch = s
        .import_batch(
            "ulang.csv",
            vec![bill("A", 202501, "101", None), bill("A", 202501, "101", Some(4)), forecast],
        )
        .unwrap();

    assert_eq!(batch.row_count, 1);
    assert_eq!(s.upload_batches().unwrap()[0].row_count, 1);
    assert_eq!(s.history_count().unwrap(), 1);

    let logged = s.events_for_run(&batch.batch_id).unwrap();
    assert_eq!(
        logged[0].event().unwrap(),
        PipelineEvent::BatchImported {
            batch_id:  batch.batch_id.clone(),
            file_name: "ulang.csv".into(),
            rows:      1,
        }
    );
}

#[test]
fn unknown_batch_is_an_error() {
    let s = store();
    match s.delete_batch("no-such-batch") {
        Err(BillingError::BatchNotFound { batch_id }) => assert_eq!(batch_id, "no-such-batch"),
        other => panic!("expected BatchNotFound, got {other:?}"),
    }
}

// ── History ──────────────────────────────────────────────────────────────────

#[test]
fn upsert_replaces_by_bill_code_and_skips_forecasts() {
    let s = store();
    let mut forecast = bill("A", 202503, "101", None);
    forecast.is_forecast = true;

    let written = s.upsert_history(&[bill("A", 202501, "101", None), forecast]).unwrap();
    assert_eq!(written, 1);

    s.upsert_history(&[bill("A", 202501, "101", Some(25))]).unwrap();
    let rows = s.load_history().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, PaymentStatus::Terlambat);
    assert_eq!(rows[0].paid_date, Some(ymd(2025, 1, 26)));
}

/// A second bill for the same customer and period replaces the first,
/// so the rolling window never sees two rows for one month.
#[test]
fn one_history_row_per_customer_period() {
    let s = store();
    let mut original = bill("A", 202501, "101", Some(10));
    original.bill_code = "K1".into();
    let mut corrected = bill("A", 202501, "101", Some(30));
    corrected.bill_code = "K2".into();

    let first = s.import_batch("awal.csv", vec![original.clone()]).unwrap();
    let second = s.import_batch("koreksi.csv", vec![corrected]).unwrap();
    assert_eq!(second.row_count, 1);

    let rows = s.history_for_customer("A").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].bill_code, "K2");
    assert_eq!(s.delete_batch(&first.batch_id).unwrap(), 0);

    let run = pipeline(ymd(2025, 2, 10)).run_and_save(&s).unwrap();
    let delays: Vec<f64> = run.outcome.rows.iter().map(|r| r.forecast_delay).collect();
    assert_eq!(delays, vec![30.0, 30.0]);

    // Within one call the later row wins as well.
    let mut later = bill("A", 202501, "101", Some(2));
    later.bill_code = "K3".into();
    assert_eq!(s.upsert_history(&[original, later]).unwrap(), 1);
    assert_eq!(s.history_for_customer("A").unwrap()[0].bill_code, "K3");
}

/// Rows read back match what was written, including absent dates.
#[test]
fn history_reads_back_unchanged() {
    let s = store();
    let mut no_dates = bill("C", 202502, "103", None);
    no_dates.bill_start_date = None;
    no_dates.due_date = None;
    let input = vec![bill("C", 202501, "103", Some(9)), no_dates];

    s.upsert_history(&input).unwrap();
    assert_eq!(s.load_history().unwrap(), input);
}

// ── Predictions ──────────────────────────────────────────────────────────────

#[test]
fn run_and_save_replaces_previous_predictions() {
    let s = store();
    s.upsert_history(&[
        bill("A", 202501, "101", Some(9)),
        bill("A", 202502, "101", Some(24)),
        bill("B", 202502, "102", None),
    ])
    .unwrap();
    let p = pipeline(ymd(2025, 3, 10));

    let first = p.run_and_save(&s).unwrap();
    assert_eq!(s.prediction_count().unwrap(), 5);
    let second = p.run_and_save(&s).unwrap();
    assert_eq!(s.prediction_count().unwrap(), 5);
    assert_ne!(first.run_id, second.run_id);

    let a = s.predictions_for_customer("A").unwrap();
    let periods: Vec<u32> = a.iter().map(|f| f.period().unwrap().code()).collect();
    assert_eq!(periods, vec![202501, 202502, 202503]);
    assert_eq!(a[2].forecast_delay, 16.5);
    assert_eq!(a[2].row.delay_basis, DelayBasis::OutstandingAsOf(ymd(2025, 3, 10)));
    assert_eq!(a[2].row.record.paid_date, None);

    // Unpaid actual bill: stored delay is measured to the run date, the
    // payment date itself stays empty.
    let b = s.predictions_for_customer("B").unwrap();
    assert_eq!(b[0].delay_days(), 37);
    assert_eq!(b[0].row.record.paid_date, None);

    // History is never touched by a forecast run.
    assert_eq!(s.history_count().unwrap(), 3);

    // The stored table is exactly the latest run's output.
    assert_eq!(s.load_predictions().unwrap(), second.outcome.rows);
}

/// Predictions and the run's events commit together: a run that cannot
/// log its events leaves the previous predictions in place.
#[test]
fn failed_run_keeps_previous_predictions() {
    let path = std::env::temp_dir().join(format!("paydelay-{}.db", uuid::Uuid::new_v4()));
    let db = path.to_string_lossy().into_owned();
    let s = BillingStore::open(&db).unwrap();
    s.migrate().unwrap();
    s.upsert_history(&[bill("A", 202501, "101", Some(9))]).unwrap();
    let p = pipeline(ymd(2025, 2, 10));

    p.run_and_save(&s).unwrap();
    assert_eq!(s.prediction_count().unwrap(), 2);

    s.upsert_history(&[bill("B", 202501, "102", Some(3))]).unwrap();
    {
        let raw = rusqlite::Connection::open(&db).unwrap();
        raw.execute_batch("DROP TABLE event_log;").unwrap();
    }
    assert!(p.run_and_save(&s).is_err());

    let kept = s.load_predictions().unwrap();
    assert_eq!(kept.len(), 2);
    assert!(kept.iter().all(|f| f.customer_id() == "A"));

    drop(s);
    for suffix in ["", "-wal", "-shm"] {
        fs::remove_file(format!("{db}{suffix}")).ok();
    }
}

#[test]
fn late_forecasts_respect_threshold() {
    let s = store();
    s.upsert_history(&[
        bill("A", 202501, "101", Some(9)),
        bill("A", 202502, "101", Some(24)),
        bill("B", 202502, "102", Some(3)),
    ])
    .unwrap();
    pipeline(ymd(2025, 3, 10)).run_and_save(&s).unwrap();

    let march = Period::from_code(202503).unwrap();
    assert_eq!(s.forecast_periods().unwrap(), vec![march]);
    assert_eq!(s.forecast_rows().unwrap().len(), 2);

    let late = s.late_forecasts(march, 15.0).unwrap();
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].customer_id(), "A");
    assert!(s.late_forecasts(march, 20.0).unwrap().is_empty());
    assert_eq!(s.predictions_for_period(march).unwrap().len(), 2);
}

// ── Reporting queries ────────────────────────────────────────────────────────

#[test]
fn period_reports() {
    let s = store();
    s.upsert_history(&[
        bill("A", 202501, "101", Some(5)),
        bill("B", 202501, "101", Some(20)),
        bill("C", 202501, "102", Some(30)),
        bill("D", 202501, "102", None),
        bill("A", 202502, "101", None),
    ])
    .unwrap();
    let jan = Period::from_code(202501).unwrap();
    let feb = Period::from_code(202502).unwrap();

    assert_eq!(s.available_periods().unwrap(), vec![feb, jan]);

    let summary = s.period_summary(jan).unwrap();
    assert_eq!(summary.total_revenue, 400_000.0);
    assert_eq!(summary.total_customers, 4);
    assert_eq!(summary.total_late, 2);

    let counts = s.status_counts().unwrap();
    assert_eq!(counts[0].period, feb);
    assert_eq!((counts[1].on_time, counts[1].late, counts[1].unpaid), (1, 2, 1));

    let by_zone: Vec<(String, i64)> = s.late_by_zone().unwrap().into_iter().map(|l| (l.key, l.customers)).collect();
    assert_eq!(by_zone, vec![("101".to_string(), 1), ("102".to_string(), 1)]);
    assert_eq!(s.late_by_subgroup().unwrap()[0].customers, 2);

    let unpaid: Vec<String> = s.unpaid_history().unwrap().into_iter().map(|r| r.bill_code).collect();
    assert_eq!(unpaid, vec!["202501D".to_string(), "202502A".to_string()]);
    assert_eq!(s.history_for_period(feb).unwrap().len(), 1);
}

// ── Event log and CSV import ─────────────────────────────────────────────────

#[test]
fn run_events_are_logged() {
    let s = store();
    s.upsert_history(&[bill("A", 202501, "101", Some(9))]).unwrap();
    let run = pipeline(ymd(2025, 2, 10)).run_and_save(&s).unwrap();

    let entries = s.events_for_run(&run.run_id).unwrap();
    let logged: Vec<&str> = entries.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        logged,
        vec!["run_started", "rows_normalized", "forecasts_generated", "predictions_saved"]
    );
    assert_eq!(
        entries[3].event().unwrap(),
        PipelineEvent::PredictionsSaved { rows: 2 }
    );

    // A reopened in-memory store is a separate, empty database.
    let other = s.reopen().unwrap();
    other.migrate().unwrap();
    assert!(other.events_for_run(&run.run_id).unwrap().is_empty());
}

#[test]
fn csv_upload_round_trip_through_store() {
    let path = std::env::temp_dir().join(format!("paydelay-upload-{}.csv", uuid::Uuid::new_v4()));
    fs::write(
        &path,
        "kode_tagihan,thbl,no_plg,kd_tarif,subkelompok,zona,awal_tagihan,tgl_lunas,tgl_tenggat,rp_tagihan\n\
         2025012259AA,202501,2259AA,3.1,Rumah Menengah,101,1/1/2025,1/20/2025,1/15/2025,120000\n\
         2025022259AA,202502,2259AA,3.1,Rumah Menengah,101,2/1/2025,,2/15/2025,120000\n",
    )
    .unwrap();

    let s = store();
    let p = pipeline(ymd(2025, 3, 1));
    let summary = p.import_csv(&s, &path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(summary.batch.row_count, 2);
    assert!(summary.batch.file_name.starts_with("paydelay-upload-"));
    assert_eq!(s.history_count().unwrap(), 2);
    assert_eq!(s.history_for_customer("2259AA").unwrap()[0].status, PaymentStatus::Terlambat);

    let imported = s.events_for_run(&summary.batch.batch_id).unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].event_type, "batch_imported");

    assert_eq!(p.delete_upload(&s, &summary.batch.batch_id).unwrap(), 2);
    assert_eq!(s.history_count().unwrap(), 0);
    assert!(s.upload_batches().unwrap().is_empty());
}
