//! paydelay-runner: headless driver for the payment-delay pipeline.
//!
//! Usage:
//!   paydelay-runner --db pdam.db --import tagihan_januari.csv
//!   paydelay-runner --db pdam.db --forecast --today 2025-03-10
//!   paydelay-runner --db pdam.db --list-batches
//!   paydelay-runner --db pdam.db --delete-batch <batch-id>
//!   paydelay-runner --generate 50 --seed 7 --out sample.csv

use anyhow::{Context, Result};
use chrono::NaiveDate;
use paydelay_core::{
    clock::ProcessingClock,
    config::PipelineConfig,
    ingest,
    period::Period,
    pipeline::{ForecastPipeline, SavedRun},
    sample,
    store::BillingStore,
};
use std::env;
use std::fs::File;
use std::path::Path;

#[derive(serde::Serialize)]
struct RunSummary<'a> {
    run_id:              &'a str,
    processed_on:        NaiveDate,
    rows:                usize,
    customers:           usize,
    forecasts:           usize,
    outstanding:         usize,
    unresolved:          usize,
    dropped_unorderable: usize,
    late_threshold_days: f64,
    likely_late:         Vec<LikelyLate>,
}

#[derive(serde::Serialize)]
struct LikelyLate {
    customer_id:    String,
    period:         Period,
    zone:           String,
    subgroup:       String,
    forecast_delay: f64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let json = has_flag(&args, "--json");

    let config = match flag_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let clock = match flag_value(&args, "--today") {
        Some(raw) => ProcessingClock::fixed(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("--today expects YYYY-MM-DD, got {raw}"))?,
        ),
        None => ProcessingClock::system(),
    };
    let threshold = parse_arg(&args, "--threshold", config.forecast.late_threshold_days);
    log::info!("runner: db {db}, processing date {}", clock.today());

    if let Some(n) = flag_value(&args, "--generate") {
        let customers: usize = n.parse().with_context(|| format!("--generate expects a count, got {n}"))?;
        let seed = parse_arg(&args, "--seed", 42u64);
        let periods = parse_arg(&args, "--periods", 6usize);
        let first = Period::parse(flag_value(&args, "--first-period").unwrap_or("202501"))?;
        let out = flag_value(&args, "--out").unwrap_or("sample.csv");
        let records = sample::generate_history(seed, customers, periods, first);
        ingest::write_csv(File::create(out)?, &records)?;
        println!("wrote {} rows for {customers} customers to {out}", records.len());
        return Ok(());
    }

    let store = BillingStore::open(db)?;
    store.migrate()?;
    let pipeline = ForecastPipeline::new(config, clock);

    if let Some(path) = flag_value(&args, "--import") {
        let summary = pipeline.import_csv(&store, Path::new(path))?;
        println!("=== IMPORT ===");
        println!("  batch_id:          {}", summary.batch.batch_id);
        println!("  file:              {}", summary.batch.file_name);
        println!("  rows:              {}", summary.batch.row_count);
        println!("  skipped rows:      {}", summary.import.skipped_rows);
        println!("  malformed dates:   {}", summary.import.malformed_dates);
        println!("  malformed periods: {}", summary.import.malformed_periods);
        println!();
    }

    if let Some(batch_id) = flag_value(&args, "--delete-batch") {
        let removed = pipeline.delete_upload(&store, batch_id)?;
        println!("deleted batch {batch_id}: {removed} history rows removed");
    }

    if has_flag(&args, "--list-batches") {
        print_batches(&store)?;
    }

    if has_flag(&args, "--forecast") {
        let run = pipeline.run_and_save(&store)?;
        if json {
            let summary = build_summary(&run, &store, threshold)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&run, &store, threshold)?;
        }
    }

    Ok(())
}

fn build_summary<'a>(run: &'a SavedRun, store: &BillingStore, threshold: f64) -> Result<RunSummary<'a>> {
    let outcome = &run.outcome;
    let mut likely_late = Vec::new();
    for period in store.forecast_periods()? {
        for f in store.late_forecasts(period, threshold)? {
            let r = &f.row.record;
            likely_late.push(LikelyLate {
                customer_id:    r.customer_id.clone(),
                period,
                zone:           r.zone.clone(),
                subgroup:       r.subgroup.clone(),
                forecast_delay: f.forecast_delay,
            });
        }
    }
    Ok(RunSummary {
        run_id:              &run.run_id,
        processed_on:        outcome.processed_on,
        rows:                outcome.rows.len(),
        customers:           outcome.forecast.customers,
        forecasts:           outcome.forecast.forecasts,
        outstanding:         outcome.normalize.outstanding_as_of_today,
        unresolved:          outcome.normalize.unresolved,
        dropped_unorderable: outcome.forecast.dropped_unorderable,
        late_threshold_days: threshold,
        likely_late,
    })
}

fn print_summary(run: &SavedRun, store: &BillingStore, threshold: f64) -> Result<()> {
    let summary = build_summary(run, store, threshold)?;

    println!("=== FORECAST RUN ===");
    println!("  run_id:            {}", summary.run_id);
    println!("  processed on:      {}", summary.processed_on);
    println!("  rows:              {}", summary.rows);
    println!("  customers:         {}", summary.customers);
    println!("  forecast rows:     {}", summary.forecasts);
    println!("  outstanding bills: {}", summary.outstanding);
    println!("  unresolved delays: {}", summary.unresolved);
    println!("  dropped (period):  {}", summary.dropped_unorderable);

    println!();
    println!("=== LIKELY LATE (forecast_delay > {threshold:.0} days) ===");
    if summary.likely_late.is_empty() {
        println!("  (none)");
    }
    for l in &summary.likely_late {
        println!(
            "  {} | {} | zone {} | {} | {:.1} days",
            l.customer_id, l.period, l.zone, l.subgroup, l.forecast_delay
        );
    }

    println!();
    println!("=== STATUS BY PERIOD (latest 6) ===");
    let counts = store.status_counts()?;
    if counts.is_empty() {
        println!("  (no history)");
    }
    for c in counts.iter().take(6) {
        println!(
            "  {} | on time {:>5} | late {:>5} | unpaid {:>5}",
            c.period, c.on_time, c.late, c.unpaid
        );
    }
    Ok(())
}

fn print_batches(store: &BillingStore) -> Result<()> {
    let batches = store.upload_batches()?;
    println!("=== UPLOAD HISTORY ===");
    if batches.is_empty() {
        println!("  (no uploads yet)");
    }
    for b in batches {
        println!("  {} | {} | {} | {} rows", b.batch_id, b.uploaded_at, b.file_name, b.row_count);
    }
    println!();
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
