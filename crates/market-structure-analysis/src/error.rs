use market_structure_core::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("{date} is not a trading day")]
    NotATradingDay { date: chrono::NaiveDate },

    #[error("no previous-day bars for {symbol} before {date}")]
    NoPreviousDayData {
        symbol: String,
        date: chrono::NaiveDate,
    },

    #[error("opening range needs {needed} bars, found {got}")]
    InsufficientBars { needed: usize, got: usize },

    #[error("weekly window needs {needed} bars, found {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("no bar history for {symbol}")]
    NoData { symbol: String },

    #[error("no key levels available for {symbol} on {date}")]
    NotFound {
        symbol: String,
        date: chrono::NaiveDate,
    },

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
