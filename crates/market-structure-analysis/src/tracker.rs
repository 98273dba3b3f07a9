use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use market_structure_core::bar::Bar;
use market_structure_core::key_levels::OpeningRange;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::LevelError;
use crate::levels::LevelCalculator;

/// The counting window is the full 15-minute opening range.
const WINDOW_MINUTES: i64 = 15;

/// Date rollover is detected by a periodic check, not a midnight schedule;
/// up to an hour of lag before the state reset is acceptable.
const ROLLOVER_CHECK: Duration = Duration::from_secs(3600);

const MAILBOX_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker is not running")]
    Stopped,

    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Per-symbol counters for the current trading date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolState {
    /// Bars observed inside the opening-range window today.
    pub bar_count: usize,
    pub or5_done: bool,
    pub or15_done: bool,
}

/// Point-in-time view of the tracker's state, for tests and the CLI.
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub date: NaiveDate,
    pub symbols: HashMap<String, SymbolState>,
}

enum TrackerMessage {
    Bar(Bar),
    Resync {
        symbol: String,
        date: NaiveDate,
        reply: oneshot::Sender<Result<(), LevelError>>,
    },
    Snapshot {
        reply: oneshot::Sender<TrackerSnapshot>,
    },
    Drain {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running tracker actor. Cloneable; all clones feed the same
/// mailbox, so per-symbol delivery order is preserved end to end.
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<TrackerMessage>,
}

impl TrackerHandle {
    /// Deliver one live bar. Bars for untracked symbols, outside the
    /// opening-range window, or on a stale date are accepted and ignored.
    pub async fn send_bar(&self, bar: Bar) -> Result<(), TrackerError> {
        self.tx
            .send(TrackerMessage::Bar(bar))
            .await
            .map_err(|_| TrackerError::Stopped)
    }

    /// Manually recompute both opening ranges for (symbol, date) from
    /// persisted bar history, ignoring the live counters, and force-set
    /// both flags. Safe to invoke repeatedly.
    pub async fn resync(&self, symbol: &str, date: NaiveDate) -> Result<(), TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TrackerMessage::Resync {
                symbol: symbol.to_string(),
                date,
                reply,
            })
            .await
            .map_err(|_| TrackerError::Stopped)?;
        rx.await.map_err(|_| TrackerError::Stopped)??;
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<TrackerSnapshot, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TrackerMessage::Snapshot { reply })
            .await
            .map_err(|_| TrackerError::Stopped)?;
        rx.await.map_err(|_| TrackerError::Stopped)
    }

    /// Wait until every dispatched calculation has finished.
    ///
    /// The actor blocks on the in-flight calculations while answering, so
    /// bars queued behind this message stall until they complete. Shutdown
    /// and test barrier only; never call it on the live bar path.
    pub async fn drain(&self) -> Result<(), TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TrackerMessage::Drain { reply })
            .await
            .map_err(|_| TrackerError::Stopped)?;
        rx.await.map_err(|_| TrackerError::Stopped)
    }
}

/// Single sequential actor owning all tracked symbols' opening-range
/// counters for the current trading date.
///
/// One mailbox processes every bar in delivery order; there is no
/// per-symbol sharding. At one bar per symbol per minute the mailbox is
/// nowhere near a bottleneck. Calculation triggers are dispatched to
/// background tasks so a slow or failing calculation never delays the next
/// bar's counter update.
pub struct OpeningRangeTracker {
    calculator: Arc<LevelCalculator>,
    date: NaiveDate,
    states: HashMap<String, SymbolState>,
}

impl OpeningRangeTracker {
    /// Track the given symbols starting from today's exchange-local date.
    pub fn new(
        calculator: Arc<LevelCalculator>,
        symbols: impl IntoIterator<Item = String>,
    ) -> Self {
        let date = calculator.hours().today();
        Self::with_date(calculator, symbols, date)
    }

    /// Track the given symbols for an explicit trading date (late-starting
    /// processes, replays, tests).
    pub fn with_date(
        calculator: Arc<LevelCalculator>,
        symbols: impl IntoIterator<Item = String>,
        date: NaiveDate,
    ) -> Self {
        let states = symbols
            .into_iter()
            .map(|s| (s, SymbolState::default()))
            .collect();
        Self {
            calculator,
            date,
            states,
        }
    }

    /// Spawn the actor; the returned handle is the only way to reach it.
    pub fn spawn(self) -> (TrackerHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let task = tokio::spawn(self.run(rx));
        (TrackerHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<TrackerMessage>) {
        // First tick lands one full period out, not immediately
        let mut rollover = tokio::time::interval_at(
            tokio::time::Instant::now() + ROLLOVER_CHECK,
            ROLLOVER_CHECK,
        );
        let mut calculations: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(TrackerMessage::Bar(bar)) => self.handle_bar(bar, &mut calculations),
                    Some(TrackerMessage::Resync { symbol, date, reply }) => {
                        let result = self.resync(&symbol, date);
                        let _ = reply.send(result);
                    }
                    Some(TrackerMessage::Snapshot { reply }) => {
                        let _ = reply.send(TrackerSnapshot {
                            date: self.date,
                            symbols: self.states.clone(),
                        });
                    }
                    Some(TrackerMessage::Drain { reply }) => {
                        while calculations.join_next().await.is_some() {}
                        let _ = reply.send(());
                    }
                    None => {
                        while calculations.join_next().await.is_some() {}
                        break;
                    }
                },
                _ = rollover.tick() => self.check_rollover(),
                Some(result) = calculations.join_next(), if !calculations.is_empty() => {
                    if let Err(e) = result {
                        warn!("opening range calculation task failed: {e}");
                    }
                }
            }
        }
    }

    fn handle_bar(&mut self, bar: Bar, calculations: &mut JoinSet<()>) {
        let hours = *self.calculator.hours();
        let Some(state) = self.states.get_mut(&bar.symbol) else {
            return;
        };
        if !hours.in_opening_range(&bar.timestamp, WINDOW_MINUTES)
            || hours.local_date(&bar.timestamp) != self.date
        {
            return;
        }

        state.bar_count += 1;
        debug!(
            symbol = %bar.symbol,
            bar_count = state.bar_count,
            "opening range bar counted"
        );

        // Both checks run on every qualifying bar; in normal operation they
        // fire on bars 5 and 15 respectively.
        if state.bar_count >= 5 && !state.or5_done {
            state.or5_done = true;
            Self::dispatch(
                calculations,
                Arc::clone(&self.calculator),
                bar.symbol.clone(),
                self.date,
                OpeningRange::FiveMinute,
            );
        }
        if state.bar_count >= 15 && !state.or15_done {
            state.or15_done = true;
            Self::dispatch(
                calculations,
                Arc::clone(&self.calculator),
                bar.symbol.clone(),
                self.date,
                OpeningRange::FifteenMinute,
            );
        }
    }

    /// Fire-and-log: a failed calculation must never interrupt bar
    /// processing or other symbols' state.
    fn dispatch(
        calculations: &mut JoinSet<()>,
        calculator: Arc<LevelCalculator>,
        symbol: String,
        date: NaiveDate,
        range: OpeningRange,
    ) {
        calculations.spawn(async move {
            let log_symbol = symbol.clone();
            let result = tokio::task::spawn_blocking(move || {
                calculator.update_opening_range(&symbol, date, range)
            })
            .await;
            match result {
                Ok(Ok(_)) => info!(symbol = %log_symbol, %date, %range, "opening range updated"),
                Ok(Err(e)) => {
                    warn!(symbol = %log_symbol, %date, %range, "opening range calculation failed: {e}");
                }
                Err(e) => warn!(symbol = %log_symbol, "opening range task panicked: {e}"),
            }
        });
    }

    fn check_rollover(&mut self) {
        let today = self.calculator.hours().today();
        if today != self.date {
            info!(from = %self.date, to = %today, "trading date rolled over, resetting tracker state");
            self.date = today;
            for state in self.states.values_mut() {
                *state = SymbolState::default();
            }
        }
    }

    /// Recompute both opening ranges straight from persisted bars. Runs the
    /// daily calculation first when no row exists yet, so a restarted
    /// process can catch up from nothing. Idempotent: repeated calls leave
    /// identical stored levels.
    fn resync(&mut self, symbol: &str, date: NaiveDate) -> Result<(), LevelError> {
        if !self.calculator.level_store().has_levels(symbol, date) {
            self.calculator.calculate_daily(symbol, date)?;
        }

        for range in [OpeningRange::FiveMinute, OpeningRange::FifteenMinute] {
            match self.calculator.update_opening_range(symbol, date, range) {
                Ok(_) => info!(symbol, %date, %range, "opening range resynced"),
                // Not enough persisted bars yet; the flag is still forced so
                // the live path will not re-trigger a doomed calculation
                Err(LevelError::InsufficientBars { needed, got }) => {
                    warn!(symbol, %date, %range, needed, got, "opening range resync skipped");
                }
                Err(e) => return Err(e),
            }
        }

        if date == self.date
            && let Some(state) = self.states.get_mut(symbol)
        {
            state.or5_done = true;
            state.or15_done = true;
        }
        Ok(())
    }
}
