//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The pipeline hands records to store methods; it never executes SQL.

use crate::{
    dates,
    error::BillingResult,
    event::EventLogEntry,
    period::Period,
    record::BillingRecord,
    status::PaymentStatus,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

mod history;
mod prediction;
mod queries;
mod upload;

pub use queries::{LateCount, PeriodStatusCounts, PeriodSummary};
pub use upload::UploadBatch;

pub struct BillingStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl BillingStore {
    pub fn open(path: &str) -> BillingResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> BillingResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this returns a new, isolated database.
    pub fn reopen(&self) -> BillingResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> BillingResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_predictions.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn events_for_run(&self, run_id: &str) -> BillingResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, event_type, payload, recorded_at
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    recorded_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Event insert usable inside a caller-owned transaction, so an operation
/// and its log entries commit together.
pub(crate) fn write_event(conn: &Connection, entry: &EventLogEntry) -> BillingResult<()> {
    conn.execute(
        "INSERT INTO event_log (run_id, event_type, payload, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![entry.run_id, entry.event_type, entry.payload, entry.recorded_at],
    )?;
    Ok(())
}

// ── Row mapping shared by history and prediction tables ────────

/// Column list matching `record_from_row`. Both tables share this prefix.
pub(crate) const RECORD_COLUMNS: &str =
    "bill_code, customer_id, period, tariff_code, subgroup, zone,
     bill_start_date, due_date, paid_date, amount_due, status, batch_id";

/// Map the first 12 columns (see `RECORD_COLUMNS`) to a record.
/// Stored text that no longer parses degrades like malformed input does.
pub(crate) fn record_from_row(row: &Row<'_>, is_forecast: bool) -> rusqlite::Result<BillingRecord> {
    let bill_code: String = row.get(0)?;
    let period = row
        .get::<_, Option<i64>>(2)?
        .and_then(|code| match Period::from_code(code) {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("store: bill {bill_code}: {e}");
                None
            }
        });
    let date = |idx: usize| -> rusqlite::Result<Option<NaiveDate>> {
        Ok(row.get::<_, Option<String>>(idx)?.and_then(|s| {
            let parsed = dates::parse_date(&s);
            if parsed.is_none() {
                log::warn!("store: bill {bill_code}: unparsable stored date '{s}'");
            }
            parsed
        }))
    };
    let bill_start_date = date(6)?;
    let due_date = date(7)?;
    let paid_date = date(8)?;

    let raw_status: String = row.get(10)?;
    let status = raw_status.parse::<PaymentStatus>().unwrap_or_else(|_| {
        log::warn!("store: bill {bill_code}: unknown status '{raw_status}', reclassified");
        PaymentStatus::classify(paid_date, due_date)
    });

    Ok(BillingRecord {
        customer_id: row.get(1)?,
        period,
        tariff_code: row.get(3)?,
        subgroup: row.get(4)?,
        zone: row.get(5)?,
        bill_start_date,
        due_date,
        paid_date,
        amount_due: row.get(9)?,
        status,
        is_forecast,
        batch_id: row.get(11)?,
        bill_code,
    })
}
