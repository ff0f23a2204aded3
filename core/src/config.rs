use crate::dates::DEFAULT_DATE_FORMATS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Trailing rolling-mean window, in billing cycles. The window always
    /// accepts a partial fill, so a customer's first row averages itself.
    pub window: usize,
    /// Days from bill start to due date on synthesized rows.
    pub due_offset_days: i64,
    /// forecast_delay above this flags a customer as likely late.
    pub late_threshold_days: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window: 2,
            due_offset_days: 20,
            late_threshold_days: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// chrono formats tried in order for every date column.
    pub date_formats: Vec<String>,
    /// Recompute status from paid/due dates on upload instead of trusting
    /// the sheet's status column.
    pub classify_status_on_upload: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            classify_status_on_upload: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub ingest:   IngestConfig,
}

impl PipelineConfig {
    /// Load from a JSON file such as `data/pipeline.json`.
    /// In tests, use `PipelineConfig::default()`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if config.forecast.window == 0 {
            anyhow::bail!("{path}: forecast.window must be at least 1");
        }
        if config.ingest.date_formats.is_empty() {
            anyhow::bail!("{path}: ingest.date_formats must not be empty");
        }
        Ok(config)
    }
}
