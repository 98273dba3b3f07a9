use chrono::NaiveDate;
use market_structure_core::key_levels::KeyLevels;
use serde::{Deserialize, Serialize};

/// Structural-update event, broadcast per (symbol, date) whenever the
/// stored key levels change. Carries the full updated row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelsUpdate {
    pub symbol: String,
    pub date: NaiveDate,
    pub levels: KeyLevels,
}
