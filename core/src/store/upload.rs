use super::{history::write_history, write_event, BillingStore};
use crate::{
    error::{BillingError, BillingResult},
    event::{EventLogEntry, PipelineEvent},
    record::BillingRecord,
    types::BatchId,
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// One entry in the append-only upload log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub batch_id:    BatchId,
    pub file_name:   String,
    pub uploaded_at: String, // %Y-%m-%d %H:%M:%S local time
    pub row_count:   i64,
}

impl UploadBatch {
    pub fn new(file_name: &str, row_count: usize) -> Self {
        Self {
            batch_id:    uuid::Uuid::new_v4().to_string(),
            file_name:   file_name.to_string(),
            uploaded_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            row_count:   row_count as i64,
        }
    }
}

impl BillingStore {
    // ── Upload batches ────────────────────────────────────────────

    /// Record a new upload and write its rows, tagged with the batch id,
    /// in one transaction. Rows whose bill code, or whose (customer_id,
    /// period), already exists replace the stored row and move to this
    /// batch. `row_count` is the number of history rows the batch holds
    /// once written, and a `BatchImported` event keyed by the batch id
    /// commits with it.
    pub fn import_batch(
        &self,
        file_name: &str,
        records: Vec<BillingRecord>,
    ) -> BillingResult<UploadBatch> {
        let mut batch = UploadBatch::new(file_name, 0);
        let submitted = records.len();
        let tagged: Vec<BillingRecord> = records
            .into_iter()
            .map(|mut r| {
                r.batch_id = Some(batch.batch_id.clone());
                r
            })
            .collect();

        let tx = self.conn.unchecked_transaction()?;
        let written = write_history(&tx, &tagged)?;
        batch.row_count = written as i64;
        tx.execute(
            "INSERT INTO upload_batch (batch_id, file_name, uploaded_at, row_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![batch.batch_id, batch.file_name, batch.uploaded_at, batch.row_count],
        )?;
        let event = PipelineEvent::BatchImported {
            batch_id:  batch.batch_id.clone(),
            file_name: batch.file_name.clone(),
            rows:      written,
        };
        write_event(&tx, &EventLogEntry::from_event(&batch.batch_id, &event)?)?;
        tx.commit()?;

        if written < submitted {
            log::warn!(
                "store: batch {} kept {written} of {submitted} submitted rows \
                 (forecast rows or repeated bills)",
                batch.batch_id
            );
        }
        log::info!(
            "store: batch {} ({}) imported with {} rows",
            batch.batch_id, batch.file_name, batch.row_count
        );
        Ok(batch)
    }

    /// Upload log, oldest first.
    pub fn upload_batches(&self) -> BillingResult<Vec<UploadBatch>> {
        let mut stmt = self.conn.prepare(
            "SELECT batch_id, file_name, uploaded_at, row_count
             FROM upload_batch ORDER BY uploaded_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UploadBatch {
                batch_id: row.get(0)?,
                file_name: row.get(1)?,
                uploaded_at: row.get(2)?,
                row_count: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn upload_batch(&self, batch_id: &str) -> BillingResult<Option<UploadBatch>> {
        let batch = self
            .conn
            .query_row(
                "SELECT batch_id, file_name, uploaded_at, row_count
                 FROM upload_batch WHERE batch_id = ?1",
                params![batch_id],
                |row| {
                    Ok(UploadBatch {
                        batch_id: row.get(0)?,
                        file_name: row.get(1)?,
                        uploaded_at: row.get(2)?,
                        row_count: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(batch)
    }

    /// Delete an upload: the history rows still tagged with `batch_id` and
    /// the log entry itself, recording a `BatchDeleted` event in the same
    /// transaction. Returns the number of history rows removed.
    pub fn delete_batch(&self, batch_id: &str) -> BillingResult<usize> {
        if self.upload_batch(batch_id)?.is_none() {
            return Err(BillingError::BatchNotFound { batch_id: batch_id.to_string() });
        }
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute(
            "DELETE FROM billing_history WHERE batch_id = ?1",
            params![batch_id],
        )?;
        tx.execute("DELETE FROM upload_batch WHERE batch_id = ?1", params![batch_id])?;
        let event = PipelineEvent::BatchDeleted {
            batch_id:     batch_id.to_string(),
            rows_removed: removed,
        };
        write_event(&tx, &EventLogEntry::from_event(batch_id, &event)?)?;
        tx.commit()?;

        log::info!("store: batch {batch_id} deleted, {removed} history rows removed");
        Ok(removed)
    }
}
