//! Deterministic synthetic billing history for demos and tests.
//!
//! RULE: same seed, same history. All randomness flows through
//! `SampleRng` streams derived from one master seed, one stream per
//! customer, so adding customers never changes existing customers' rows.

use crate::{
    period::Period,
    record::BillingRecord,
    status::PaymentStatus,
};
use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

const ZONES: &[&str] = &["101", "102", "103", "104", "105"];
const SUBGROUPS: &[(&str, &str)] = &[
    ("1.1", "Rumah Sederhana"),
    ("2.2", "Niaga Kecil"),
    ("3.1", "Rumah Menengah"),
    ("3.2", "Rumah Mewah"),
    ("4.1", "Instansi Pemerintah"),
];

/// Days from bill start to due date on sample bills.
const SAMPLE_DUE_DAYS: i64 = 14;

/// A named, deterministic RNG stream.
pub struct SampleRng {
    inner: Pcg64Mcg,
}

impl SampleRng {
    /// Derive a stream from the master seed and a stable stream index.
    pub fn new(master_seed: u64, stream: u64) -> Self {
        let derived_seed = master_seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self { inner: Pcg64Mcg::seed_from_u64(derived_seed) }
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.inner.gen::<f64>() < p
    }

    /// Uniform integer in [lo, hi].
    pub fn between(&mut self, lo: i64, hi: i64) -> i64 {
        self.inner.gen_range(lo..=hi)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.inner.gen_range(0..items.len())]
    }
}

/// Customer ids in the upload template's style: `2259AA`, `2260AB`, ...
pub fn customer_id(index: usize) -> String {
    let a = (b'A' + ((index / 26) % 26) as u8) as char;
    let b = (b'A' + (index % 26) as u8) as char;
    format!("{}{a}{b}", 2259 + index)
}

/// `customers` customers × `periods` consecutive cycles starting at `first`.
///
/// Each customer has a habitual delay; each cycle draws around it. The last
/// cycle is left unpaid more often than earlier ones, as in live data where
/// the current month is still open.
pub fn generate_history(
    seed: u64,
    customers: usize,
    periods: usize,
    first: Period,
) -> Vec<BillingRecord> {
    let mut records = Vec::with_capacity(customers * periods);

    for c in 0..customers {
        let mut rng = SampleRng::new(seed, c as u64);
        let id = customer_id(c);
        let zone = rng.pick(ZONES).to_string();
        let (tariff, subgroup) = *rng.pick(SUBGROUPS);
        let habit = rng.between(3, 25);
        let base_amount = rng.between(60, 250) * 1000;

        let mut period = first;
        for p in 0..periods {
            let bill_start = NaiveDate::from_ymd_opt(period.year() as i32, period.month(), 1);
            let due = bill_start.map(|d| d + Duration::days(SAMPLE_DUE_DAYS));

            let unpaid_p = if p + 1 == periods { 0.30 } else { 0.03 };
            let paid = if rng.chance(unpaid_p) {
                None
            } else {
                let delay = (habit + rng.between(-5, 5)).max(0);
                bill_start.map(|d| d + Duration::days(delay))
            };

            records.push(BillingRecord {
                bill_code:       format!("{period}{id}"),
                customer_id:     id.clone(),
                period:          Some(period),
                tariff_code:     tariff.to_string(),
                subgroup:        subgroup.to_string(),
                zone:            zone.clone(),
                bill_start_date: bill_start,
                due_date:        due,
                paid_date:       paid,
                amount_due:      (base_amount + rng.between(-10, 10) * 1000) as f64,
                status:          PaymentStatus::classify(paid, due),
                is_forecast:     false,
                batch_id:        None,
            });
            period = match period.next() {
                Ok(next) => next,
                Err(_) => break,
            };
        }
    }
    records
}
