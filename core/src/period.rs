//! Billing period (THBL): a calendar month packed as `year * 100 + month`.
//!
//! 202503 is March 2025. The packed code orders chronologically, so the
//! derived `Ord` on the inner value is the billing order.

use crate::error::{BillingError, BillingResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Period(u32);

impl Period {
    pub fn new(year: u32, month: u32) -> BillingResult<Self> {
        if !(1..=12).contains(&month) || year == 0 || year > 9999 {
            return Err(BillingError::InvalidPeriod {
                value: format!("{year:04}{month:02}"),
            });
        }
        Ok(Self(year * 100 + month))
    }

    /// Unpack an integer code such as `202503`.
    pub fn from_code(code: i64) -> BillingResult<Self> {
        let invalid = || BillingError::InvalidPeriod { value: code.to_string() };
        let code = u32::try_from(code).map_err(|_| invalid())?;
        Self::new(code / 100, code % 100).map_err(|_| invalid())
    }

    /// Lenient textual parse. Accepts `"202503"` and float renderings such
    /// as `"202503.0"` that spreadsheet exports produce.
    pub fn parse(raw: &str) -> BillingResult<Self> {
        let trimmed = raw.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => Self::from_code(f as i64),
            _ => Err(BillingError::InvalidPeriod { value: trimmed.to_string() }),
        }
    }

    pub fn year(self) -> u32 {
        self.0 / 100
    }

    pub fn month(self) -> u32 {
        self.0 % 100
    }

    pub fn code(self) -> u32 {
        self.0
    }

    /// The following billing cycle. December rolls into January of the
    /// next year. Fails past December 9999.
    pub fn next(self) -> BillingResult<Self> {
        match self.month() {
            12 => Self::new(self.year() + 1, 1),
            m => Self::new(self.year(), m + 1),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Period {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<i64> for Period {
    type Error = BillingError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<Period> for i64 {
    fn from(p: Period) -> Self {
        i64::from(p.0)
    }
}
