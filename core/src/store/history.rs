use super::{record_from_row, BillingStore, RECORD_COLUMNS};
use crate::{dates::format_date, error::BillingResult, record::BillingRecord};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

impl BillingStore {
    // ── Billing history ───────────────────────────────────────────

    /// Insert records, replacing any existing row with the same bill code
    /// or the same (customer_id, period). Runs in one transaction.
    pub fn upsert_history(&self, records: &[BillingRecord]) -> BillingResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let written = write_history(&tx, records)?;
        tx.commit()?;
        Ok(written)
    }

    /// Actual billing rows, ordered by (customer_id, period).
    pub fn load_history(&self) -> BillingResult<Vec<BillingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM billing_history
             ORDER BY customer_id ASC, period ASC, bill_code ASC"
        ))?;
        let rows = stmt.query_map([], |row| record_from_row(row, false))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn history_count(&self) -> BillingResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM billing_history", [], |row| row.get(0))?;
        Ok(n)
    }

    pub fn history_for_customer(&self, customer_id: &str) -> BillingResult<Vec<BillingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM billing_history
             WHERE customer_id = ?1 ORDER BY period ASC"
        ))?;
        let rows = stmt.query_map(params![customer_id], |row| record_from_row(row, false))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// Shared by `upsert_history` and batch import so both can run inside a
/// caller-owned transaction.
///
/// A row replaces any stored row with the same bill code, and any row with
/// a different bill code for the same (customer_id, period). Returns the
/// number of distinct bill codes from `records` present once all rows are
/// written: forecast rows and rows displaced by later ones in the same call
/// are not counted.
pub(super) fn write_history(conn: &Connection, records: &[BillingRecord]) -> BillingResult<usize> {
    let mut displace = conn.prepare(
        "DELETE FROM billing_history
         WHERE customer_id = ?1 AND period = ?2 AND bill_code <> ?3",
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO billing_history (
            bill_code, customer_id, period, tariff_code, subgroup, zone,
            bill_start_date, due_date, paid_date, amount_due, status, batch_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(bill_code) DO UPDATE SET
            customer_id     = excluded.customer_id,
            period          = excluded.period,
            tariff_code     = excluded.tariff_code,
            subgroup        = excluded.subgroup,
            zone            = excluded.zone,
            bill_start_date = excluded.bill_start_date,
            due_date        = excluded.due_date,
            paid_date       = excluded.paid_date,
            amount_due      = excluded.amount_due,
            status          = excluded.status,
            batch_id        = excluded.batch_id",
    )?;
    let mut written: BTreeSet<&str> = BTreeSet::new();
    for r in records {
        if r.is_forecast {
            log::debug!("store: skipping forecast row {} on history write", r.bill_code);
            continue;
        }
        let period = r.period.map(i64::from);
        let displaced = displace.execute(params![&r.customer_id, period, &r.bill_code])?;
        if displaced > 0 {
            log::info!(
                "store: bill {} replaces {displaced} row(s) for customer {} period {}",
                r.bill_code,
                r.customer_id,
                period.unwrap_or_default()
            );
        }
        stmt.execute(params![
            &r.bill_code,
            &r.customer_id,
            period,
            &r.tariff_code,
            &r.subgroup,
            &r.zone,
            format_date(r.bill_start_date),
            format_date(r.due_date),
            format_date(r.paid_date),
            r.amount_due,
            r.status.as_str(),
            &r.batch_id,
        ])?;
        written.insert(r.bill_code.as_str());
    }

    let mut present = conn.prepare("SELECT 1 FROM billing_history WHERE bill_code = ?1")?;
    let mut kept = 0;
    for code in written {
        if present.exists(params![code])? {
            kept += 1;
        }
    }
    Ok(kept)
}
