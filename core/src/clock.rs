//! Processing clock. Owns the "today" used by the as-of-today delay rule.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// The processing date of one pipeline run, normalized to midnight.
///
/// Production runs use `system()`. Tests and replays pin the date with
/// `fixed()` so outputs are reproducible.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingClock {
    today: NaiveDate,
}

impl ProcessingClock {
    pub fn system() -> Self {
        Self { today: Local::now().date_naive() }
    }

    pub fn fixed(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }
}

impl Default for ProcessingClock {
    fn default() -> Self { Self::system() }
}
