use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required column '{column}' is missing from the input")]
    MissingColumn { column: String },

    #[error("Invalid billing period '{value}': expected YYYYMM with month 1-12")]
    InvalidPeriod { value: String },

    #[error("Unknown payment status '{value}'")]
    InvalidStatus { value: String },

    #[error("Upload batch '{batch_id}' not found")]
    BatchNotFound { batch_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BillingResult<T> = Result<T, BillingError>;
