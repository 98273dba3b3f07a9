use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::key_levels::{KeyLevels, OpeningRange};

/// Filesystem-backed store for key levels, one JSON document per
/// (symbol, date).
///
/// Directory layout: `{root}/levels/{SYMBOL}/{YYYY}/{MM}/{YYYY-MM-DD}.json`.
/// `upsert` replaces the whole row; `patch_opening_range` rewrites only the
/// requested high/low pair and preserves everything else. Callers needing
/// stronger guarantees than single-writer-per-(symbol, date) must serialize
/// externally.
pub struct LevelStore {
    data_dir: PathBuf,
}

impl LevelStore {
    /// Create a store rooted at the given directory.
    /// The `levels/` subdirectory is used automatically.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            data_dir: root.as_ref().join("levels"),
        }
    }

    /// Path to the JSON file for a given symbol and date.
    pub fn file_path(&self, symbol: &str, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(symbol)
            .join(date.format("%Y").to_string())
            .join(date.format("%m").to_string())
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Check if a row exists for a symbol on a given date.
    pub fn has_levels(&self, symbol: &str, date: NaiveDate) -> bool {
        self.file_path(symbol, date).exists()
    }

    /// Insert or fully replace the row for (symbol, date).
    /// Validates the high >= low invariant before writing.
    pub fn upsert(&self, levels: &KeyLevels) -> Result<(), StoreError> {
        levels.validate()?;
        let path = self.file_path(&levels.symbol, levels.date);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(levels)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read the row for (symbol, date).
    pub fn get(&self, symbol: &str, date: NaiveDate) -> Result<KeyLevels, StoreError> {
        let path = self.file_path(symbol, date);
        if !path.exists() {
            return Err(StoreError::NotFound {
                symbol: symbol.to_string(),
                date,
            });
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Set one opening-range high/low pair on an existing row, leaving all
    /// other fields untouched. Fails `NotFound` if no row exists yet.
    pub fn patch_opening_range(
        &self,
        symbol: &str,
        date: NaiveDate,
        range: OpeningRange,
        high: Decimal,
        low: Decimal,
    ) -> Result<KeyLevels, StoreError> {
        let mut levels = self.get(symbol, date)?;
        match range {
            OpeningRange::FiveMinute => {
                levels.opening_range_5m_high = Some(high);
                levels.opening_range_5m_low = Some(low);
            }
            OpeningRange::FifteenMinute => {
                levels.opening_range_15m_high = Some(high);
                levels.opening_range_15m_low = Some(low);
            }
        }
        self.upsert(&levels)?;
        Ok(levels)
    }

    /// List all dates with a stored row for a given symbol, sorted ascending.
    pub fn list_dates(&self, symbol: &str) -> Result<Vec<NaiveDate>, StoreError> {
        let symbol_dir = self.data_dir.join(symbol);
        if !symbol_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();
        for year_entry in std::fs::read_dir(&symbol_dir)? {
            let year_entry = year_entry?;
            if !year_entry.file_type()?.is_dir() {
                continue;
            }
            for month_entry in std::fs::read_dir(year_entry.path())? {
                let month_entry = month_entry?;
                if !month_entry.file_type()?.is_dir() {
                    continue;
                }
                for file_entry in std::fs::read_dir(month_entry.path())? {
                    let file_entry = file_entry?;
                    let file_name = file_entry.file_name();
                    let name = file_name.to_string_lossy();
                    if let Some(date_str) = name.strip_suffix(".json")
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
}
