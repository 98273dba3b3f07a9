use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::bar::Bar;
use crate::error::StoreError;
use crate::schema;
use crate::trading_calendar;

/// Filesystem-backed store for 1-minute bar data in Parquet format.
///
/// Directory layout: `{root}/bars/{SYMBOL}/{YYYY}/{MM}/{YYYY-MM-DD}.parquet`.
/// Files are keyed by exchange-local trading date.
pub struct BarStore {
    data_dir: PathBuf,
}

impl BarStore {
    /// Create a store rooted at the given directory.
    /// The `bars/` subdirectory is used automatically.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            data_dir: root.as_ref().join("bars"),
        }
    }

    /// Path to the Parquet file for a given symbol and date.
    pub fn file_path(&self, symbol: &str, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(symbol)
            .join(date.format("%Y").to_string())
            .join(date.format("%m").to_string())
            .join(format!("{}.parquet", date.format("%Y-%m-%d")))
    }

    /// Check if data exists for a symbol on a given date.
    pub fn has_data(&self, symbol: &str, date: NaiveDate) -> bool {
        self.file_path(symbol, date).exists()
    }

    /// Write bars for a single date to a Parquet file.
    /// Creates parent directories as needed. Overwrites if file already exists.
    pub fn write_day(
        &self,
        symbol: &str,
        date: NaiveDate,
        bars: &[Bar],
    ) -> Result<(), StoreError> {
        let path = self.file_path(symbol, date);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        schema::write_parquet(&path, bars)
    }

    /// Read all bars for a symbol on a specific date.
    pub fn read_day(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Bar>, StoreError> {
        let path = self.file_path(symbol, date);
        if !path.exists() {
            return Err(StoreError::NoData {
                symbol: symbol.to_string(),
                date,
            });
        }
        schema::read_parquet(&path, symbol)
    }

    /// Read bars for a symbol across a date range (inclusive).
    /// Returns bars sorted by timestamp. Skips dates without data.
    pub fn read_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, StoreError> {
        let dates = trading_calendar::weekdays(start, end);
        let mut all_bars = Vec::new();

        for date in dates {
            if self.has_data(symbol, date) {
                let mut bars = schema::read_parquet(&self.file_path(symbol, date), symbol)?;
                all_bars.append(&mut bars);
            }
        }

        all_bars.sort_by_key(|b| b.timestamp);
        Ok(all_bars)
    }

    /// Read the symbol's entire stored history, sorted by timestamp.
    ///
    /// Full-table scan; the all-time-high calculation is the only caller and
    /// accepts the cost (caching candidate, not a correctness concern).
    pub fn read_all(&self, symbol: &str) -> Result<Vec<Bar>, StoreError> {
        let mut all_bars = Vec::new();
        for date in self.list_dates(symbol)? {
            let mut bars = schema::read_parquet(&self.file_path(symbol, date), symbol)?;
            all_bars.append(&mut bars);
        }
        all_bars.sort_by_key(|b| b.timestamp);
        Ok(all_bars)
    }

    /// List all symbols that have data in the store.
    pub fn list_symbols(&self) -> Result<Vec<String>, StoreError> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }

        let mut symbols = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                symbols.push(name.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    /// List all dates with data for a given symbol, sorted ascending.
    pub fn list_dates(&self, symbol: &str) -> Result<Vec<NaiveDate>, StoreError> {
        let symbol_dir = self.data_dir.join(symbol);
        if !symbol_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();

        // Walk year directories
        for year_entry in std::fs::read_dir(&symbol_dir)? {
            let year_entry = year_entry?;
            if !year_entry.file_type()?.is_dir() {
                continue;
            }

            // Walk month directories
            for month_entry in std::fs::read_dir(year_entry.path())? {
                let month_entry = month_entry?;
                if !month_entry.file_type()?.is_dir() {
                    continue;
                }

                // Walk parquet files
                for file_entry in std::fs::read_dir(month_entry.path())? {
                    let file_entry = file_entry?;
                    let file_name = file_entry.file_name();
                    let name = file_name.to_string_lossy();
                    if let Some(date_str) = name.strip_suffix(".parquet")
                        && let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                    {
                        dates.push(date);
                    }
                }
            }
        }

        dates.sort();
        Ok(dates)
    }

    /// Get the date range (earliest, latest) for a symbol, or None if no data.
    pub fn date_range(&self, symbol: &str) -> Result<Option<(NaiveDate, NaiveDate)>, StoreError> {
        let dates = self.list_dates(symbol)?;
        Ok(dates.first().copied().zip(dates.last().copied()))
    }
}
