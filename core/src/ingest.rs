//! CSV ingestion: the boundary where raw sheet text becomes typed records.
//!
//! Headers may use the upload template's names (`kode_tagihan`, `thbl`,
//! `no_plg`, ...) or the field names of `BillingRecord`. Column presence is
//! checked once, here: a missing bill code, customer or period column
//! fails the whole file. Bad cell values never do; they degrade to `None`
//! (dates, period) or a default (amount) and are logged.

use crate::{
    config::IngestConfig,
    dates::{self, STORAGE_FORMAT},
    error::{BillingError, BillingResult},
    period::Period,
    record::BillingRecord,
    status::PaymentStatus,
};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    BillCode,
    Period,
    CustomerId,
    TariffCode,
    Subgroup,
    Zone,
    BillStartDate,
    PaidDate,
    DueDate,
    AmountDue,
    Status,
    IsForecast,
}

impl Column {
    const REQUIRED: [Column; 3] = [Column::BillCode, Column::CustomerId, Column::Period];

    fn from_header(header: &str) -> Option<Self> {
        let col = match header.trim().to_ascii_lowercase().as_str() {
            "kode_tagihan" | "bill_code"       => Column::BillCode,
            "thbl" | "period"                  => Column::Period,
            "no_plg" | "customer_id"           => Column::CustomerId,
            "kd_tarif" | "tariff_code"         => Column::TariffCode,
            "subkelompok" | "subgroup"         => Column::Subgroup,
            "zona" | "zone"                    => Column::Zone,
            "awal_tagihan" | "bill_start_date" => Column::BillStartDate,
            "tgl_lunas" | "paid_date"          => Column::PaidDate,
            "tgl_tenggat" | "due_date"         => Column::DueDate,
            "rp_tagihan" | "amount_due"        => Column::AmountDue,
            "status"                           => Column::Status,
            "is_prediksi" | "is_forecast"      => Column::IsForecast,
            _ => return None,
        };
        Some(col)
    }

    fn canonical_name(self) -> &'static str {
        match self {
            Column::BillCode      => "bill_code",
            Column::Period        => "period",
            Column::CustomerId    => "customer_id",
            Column::TariffCode    => "tariff_code",
            Column::Subgroup      => "subgroup",
            Column::Zone          => "zone",
            Column::BillStartDate => "bill_start_date",
            Column::PaidDate      => "paid_date",
            Column::DueDate       => "due_date",
            Column::AmountDue     => "amount_due",
            Column::Status        => "status",
            Column::IsForecast    => "is_forecast",
        }
    }
}

/// Result of reading one upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsvImport {
    pub records:            Vec<BillingRecord>,
    /// Data rows skipped because the bill code was empty.
    pub skipped_rows:       usize,
    pub malformed_dates:    usize,
    pub malformed_periods:  usize,
    pub malformed_amounts:  usize,
}

pub fn read_csv_path(path: &Path, config: &IngestConfig) -> BillingResult<CsvImport> {
    let file = File::open(path)?;
    read_csv(file, config)
}

pub fn read_csv<R: Read>(reader: R, config: &IngestConfig) -> BillingResult<CsvImport> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut index: HashMap<Column, usize> = HashMap::new();
    for (i, header) in reader.headers()?.iter().enumerate() {
        match Column::from_header(header) {
            Some(col) => {
                index.entry(col).or_insert(i);
            }
            None => log::debug!("ingest: ignoring unknown column '{header}'"),
        }
    }
    for col in Column::REQUIRED {
        if !index.contains_key(&col) {
            return Err(BillingError::MissingColumn { column: col.canonical_name().to_string() });
        }
    }

    let mut import = CsvImport::default();
    for (row_idx, result) in reader.records().enumerate() {
        let row = result?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        let line = row_idx + 2; // header is line 1
        let cells = Cells { row: &row, index: &index };

        let bill_code = cells.get(Column::BillCode).to_string();
        if bill_code.is_empty() {
            log::warn!("ingest: line {line}: empty bill code, row skipped");
            import.skipped_rows += 1;
            continue;
        }

        let raw_period = cells.get(Column::Period);
        let period = match Period::parse(raw_period) {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("ingest: line {line}: {e}");
                import.malformed_periods += 1;
                None
            }
        };

        let mut date = |col: Column| -> Option<NaiveDate> {
            let raw = cells.get(col);
            let parsed = dates::parse_date_with(raw, &config.date_formats);
            if parsed.is_none() && !dates::is_blank(raw) {
                log::warn!("ingest: line {line}: unparsable {} '{raw}'", col.canonical_name());
                import.malformed_dates += 1;
            }
            parsed
        };
        let bill_start_date = date(Column::BillStartDate);
        let due_date = date(Column::DueDate);
        let paid_date = date(Column::PaidDate);

        let raw_amount = cells.get(Column::AmountDue);
        let amount_due = match parse_amount(raw_amount) {
            Some(a) => a,
            None => {
                if !raw_amount.is_empty() {
                    log::warn!("ingest: line {line}: unparsable amount '{raw_amount}', using 0");
                    import.malformed_amounts += 1;
                }
                0.0
            }
        };

        let classified = PaymentStatus::classify(paid_date, due_date);
        let status = if config.classify_status_on_upload {
            classified
        } else {
            cells.get(Column::Status).parse::<PaymentStatus>().unwrap_or_else(|_| {
                log::debug!("ingest: line {line}: status column unusable, classified from dates");
                classified
            })
        };

        import.records.push(BillingRecord {
            bill_code,
            customer_id: cells.get(Column::CustomerId).to_string(),
            period,
            tariff_code: cells.get(Column::TariffCode).to_string(),
            subgroup: cells.get(Column::Subgroup).to_string(),
            zone: cells.get(Column::Zone).to_string(),
            bill_start_date,
            due_date,
            paid_date,
            amount_due,
            status,
            is_forecast: parse_flag(cells.get(Column::IsForecast)),
            batch_id: None,
        });
    }

    log::info!(
        "ingest: {} records read, {} skipped, {} malformed dates, {} malformed periods",
        import.records.len(), import.skipped_rows, import.malformed_dates, import.malformed_periods
    );
    Ok(import)
}

/// Write records in the upload template layout. Used for sample data and
/// round-tripping an export back through `read_csv`.
pub fn write_csv<W: Write>(writer: W, records: &[BillingRecord]) -> BillingResult<()> {
    let mut out = WriterBuilder::new().from_writer(writer);
    out.write_record([
        "kode_tagihan", "thbl", "no_plg", "kd_tarif", "subkelompok", "zona",
        "awal_tagihan", "tgl_lunas", "tgl_tenggat", "rp_tagihan", "status",
    ])?;
    let fmt = |d: Option<NaiveDate>| d.map(|d| d.format(STORAGE_FORMAT).to_string()).unwrap_or_default();
    for r in records {
        out.write_record([
            r.bill_code.clone(),
            r.period.map(|p| p.to_string()).unwrap_or_default(),
            r.customer_id.clone(),
            r.tariff_code.clone(),
            r.subgroup.clone(),
            r.zone.clone(),
            fmt(r.bill_start_date),
            fmt(r.paid_date),
            fmt(r.due_date),
            format!("{:.0}", r.amount_due),
            r.status.label().to_string(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

struct Cells<'a> {
    row:   &'a StringRecord,
    index: &'a HashMap<Column, usize>,
}

impl<'a> Cells<'a> {
    /// Cell text for `col`, or "" if the column is absent or the row short.
    fn get(&self, col: Column) -> &'a str {
        self.index
            .get(&col)
            .and_then(|&i| self.row.get(i))
            .unwrap_or("")
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '_').collect();
    cleaned.parse::<f64>().ok().filter(|a| a.is_finite())
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "t" | "1" | "yes" | "y")
}
