use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No bar data for {symbol} on {date}")]
    NoData {
        symbol: String,
        date: chrono::NaiveDate,
    },

    #[error("No key levels for {symbol} on {date}")]
    NotFound {
        symbol: String,
        date: chrono::NaiveDate,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid levels: {0}")]
    InvalidLevels(String),
}
