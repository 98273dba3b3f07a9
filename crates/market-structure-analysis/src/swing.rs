use chrono::{DateTime, Utc};
use market_structure_core::bar::Bar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default symmetric look-back window for swing classification.
pub const DEFAULT_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// A local extremum bar relative to a symmetric window of neighbors.
/// Derived fresh on every call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub kind: SwingKind,
    /// Position within the evaluated bar slice.
    pub index: usize,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// True iff `bars[i].high` is strictly greater than every high in the
/// `lookback` bars immediately before and after it.
///
/// The first and last `lookback` indices are undecidable and always false.
/// A zero lookback has no comparison window and classifies nothing.
pub fn is_swing_high(bars: &[Bar], i: usize, lookback: usize) -> bool {
    if lookback == 0 || i < lookback || i >= bars.len().saturating_sub(lookback) {
        return false;
    }
    let h = bars[i].high;
    bars[i - lookback..i].iter().all(|b| b.high < h)
        && bars[i + 1..=i + lookback].iter().all(|b| b.high < h)
}

/// Mirror of [`is_swing_high`] on lows with strict `<`.
pub fn is_swing_low(bars: &[Bar], i: usize, lookback: usize) -> bool {
    if lookback == 0 || i < lookback || i >= bars.len().saturating_sub(lookback) {
        return false;
    }
    let l = bars[i].low;
    bars[i - lookback..i].iter().all(|b| b.low > l)
        && bars[i + 1..=i + lookback].iter().all(|b| b.low > l)
}

/// Scan the decidable index range once and classify swings.
///
/// Each index is tested as a swing high first; the low test only runs when
/// the high test fails, so a bar satisfying both predicates is reported as
/// a high only. Requires at least `min_bars` bars and a nonzero lookback,
/// else returns nothing.
pub fn identify_swings_with_min(bars: &[Bar], lookback: usize, min_bars: usize) -> Vec<SwingPoint> {
    if lookback == 0 || bars.len() < min_bars {
        return Vec::new();
    }

    let mut swings = Vec::new();
    for i in lookback..bars.len().saturating_sub(lookback) {
        if is_swing_high(bars, i, lookback) {
            swings.push(SwingPoint {
                kind: SwingKind::High,
                index: i,
                price: bars[i].high,
                timestamp: bars[i].timestamp,
            });
        } else if is_swing_low(bars, i, lookback) {
            swings.push(SwingPoint {
                kind: SwingKind::Low,
                index: i,
                price: bars[i].low,
                timestamp: bars[i].timestamp,
            });
        }
    }
    swings
}

/// [`identify_swings_with_min`] with the default minimum of
/// `2 * lookback + 1` bars.
pub fn identify_swings(bars: &[Bar], lookback: usize) -> Vec<SwingPoint> {
    identify_swings_with_min(bars, lookback, 2 * lookback + 1)
}

/// The most recent swing of the requested kind, or None.
pub fn latest_swing(bars: &[Bar], lookback: usize, kind: SwingKind) -> Option<SwingPoint> {
    identify_swings(bars, lookback)
        .into_iter()
        .rev()
        .find(|s| s.kind == kind)
}
