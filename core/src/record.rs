//! Billing rows at each stage of the pipeline.
//!
//!   BillingRecord     — as ingested / stored
//!   NormalizedRecord  — + delay_days (Delay Normalizer)
//!   ForecastRecord    — + forecast_delay (Delay Forecaster)

use crate::{
    period::Period,
    status::PaymentStatus,
    types::{BatchId, BillCode, CustomerId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row per customer per billing cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub bill_code:       BillCode,
    pub customer_id:     CustomerId,
    /// `None` when the source period could not be parsed.
    pub period:          Option<Period>,
    pub tariff_code:     String,
    pub subgroup:        String,
    pub zone:            String,
    pub bill_start_date: Option<NaiveDate>,
    pub due_date:        Option<NaiveDate>,
    /// Real payment date only. Never a placeholder.
    pub paid_date:       Option<NaiveDate>,
    pub amount_due:      f64,
    pub status:          PaymentStatus,
    pub is_forecast:     bool,
    pub batch_id:        Option<BatchId>,
}

impl BillingRecord {
    /// Actual, unpaid and without a payment date: its delay is measured
    /// up to the processing date.
    pub fn is_outstanding(&self) -> bool {
        !self.is_forecast
            && self.status == PaymentStatus::BelumDibayar
            && self.paid_date.is_none()
    }
}

/// What the end of a row's delay interval was measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", content = "as_of", rename_all = "snake_case")]
pub enum DelayBasis {
    /// Real payment date.
    Paid,
    /// Still open; measured up to the processing date.
    OutstandingAsOf(NaiveDate),
    /// A date was missing; delay zero-filled.
    Unresolved,
}

impl DelayBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelayBasis::Paid               => "paid",
            DelayBasis::OutstandingAsOf(_) => "outstanding",
            DelayBasis::Unresolved         => "unresolved",
        }
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        match self {
            DelayBasis::OutstandingAsOf(d) => Some(*d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(flatten)]
    pub record:      BillingRecord,
    /// Signed days from bill start to payment (or to the as-of date).
    pub delay_days:  i64,
    pub delay_basis: DelayBasis,
}

impl NormalizedRecord {
    /// End of the delay interval: the payment date, or the as-of date for
    /// outstanding rows.
    pub fn effective_paid_date(&self) -> Option<NaiveDate> {
        self.record.paid_date.or(self.delay_basis.as_of())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    #[serde(flatten)]
    pub row:            NormalizedRecord,
    /// Trailing mean of delay_days for this customer up to this row.
    pub forecast_delay: f64,
}

impl ForecastRecord {
    pub fn customer_id(&self) -> &str {
        &self.row.record.customer_id
    }

    pub fn period(&self) -> Option<Period> {
        self.row.record.period
    }

    pub fn is_forecast(&self) -> bool {
        self.row.record.is_forecast
    }

    pub fn delay_days(&self) -> i64 {
        self.row.delay_days
    }
}
