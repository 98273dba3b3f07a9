use async_trait::async_trait;
use chrono::NaiveDate;
use market_structure_core::bar::Bar;
use market_structure_core::error::StoreError;
use market_structure_core::store::BarStore;
use tracing::debug;

use crate::error::LevelError;
use crate::tracker::TrackerHandle;

/// A source of live or historical bars for the opening range tracker.
///
/// The production implementation is the upstream streaming client, outside
/// this crate; [`ReplayFeed`] serves stored history for replays and tests.
#[async_trait]
pub trait BarFeed: Send + Sync {
    /// Feed name (for logging/display).
    fn name(&self) -> &str;

    /// Deliver bars to the tracker in per-symbol timestamp order until the
    /// source is exhausted.
    async fn run(&self, handle: &TrackerHandle) -> Result<(), LevelError>;
}

/// Replays one stored trading day for a set of symbols, interleaved by
/// timestamp across symbols the way a live feed would deliver them.
pub struct ReplayFeed {
    store: BarStore,
    symbols: Vec<String>,
    date: NaiveDate,
}

impl ReplayFeed {
    pub fn new(store: BarStore, symbols: Vec<String>, date: NaiveDate) -> Self {
        Self {
            store,
            symbols,
            date,
        }
    }
}

#[async_trait]
impl BarFeed for ReplayFeed {
    fn name(&self) -> &str {
        "replay"
    }

    async fn run(&self, handle: &TrackerHandle) -> Result<(), LevelError> {
        let mut bars: Vec<Bar> = Vec::new();
        for symbol in &self.symbols {
            match self.store.read_day(symbol, self.date) {
                Ok(mut day) => bars.append(&mut day),
                Err(StoreError::NoData { .. }) => {
                    debug!(symbol, date = %self.date, "no stored bars to replay");
                }
                Err(e) => return Err(e.into()),
            }
        }
        // Stable sort keeps per-symbol order for equal timestamps
        bars.sort_by_key(|b| b.timestamp);

        for bar in bars {
            if handle.send_bar(bar).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
