//! Payment status of one billing cycle.

use crate::error::BillingError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    TepatWaktu,   // paid on or before the due date
    Terlambat,    // paid after the due date
    BelumDibayar, // not paid yet
}

impl PaymentStatus {
    /// Classify a cycle from its payment and due dates.
    /// A payment with no due date to compare against counts as late.
    pub fn classify(paid: Option<NaiveDate>, due: Option<NaiveDate>) -> Self {
        match (paid, due) {
            (None, _) => Self::BelumDibayar,
            (Some(p), Some(d)) if p <= d => Self::TepatWaktu,
            (Some(_), _) => Self::Terlambat,
        }
    }

    /// Numeric class: 0 on time, 1 late, 2 unpaid.
    pub fn code(self) -> u8 {
        match self {
            Self::TepatWaktu => 0,
            Self::Terlambat => 1,
            Self::BelumDibayar => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TepatWaktu => "TEPAT_WAKTU",
            Self::Terlambat => "TERLAMBAT",
            Self::BelumDibayar => "BELUM_DIBAYAR",
        }
    }

    /// Human label as it appears in uploaded sheets.
    pub fn label(self) -> &'static str {
        match self {
            Self::TepatWaktu => "Tepat Waktu",
            Self::Terlambat => "Terlambat",
            Self::BelumDibayar => "Belum Dibayar",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        match key.as_str() {
            "TEPAT_WAKTU" => Ok(Self::TepatWaktu),
            "TERLAMBAT" => Ok(Self::Terlambat),
            "BELUM_DIBAYAR" => Ok(Self::BelumDibayar),
            _ => Err(BillingError::InvalidStatus { value: s.to_string() }),
        }
    }
}
