use chrono::{DateTime, Utc};
use market_structure_core::bar::Bar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::swing::{SwingKind, SwingPoint, identify_swings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

/// A close beyond a swing point: break of structure when with the trend,
/// change of character when against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureEvent {
    pub direction: Direction,
    /// The breaking bar's close.
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub broken_swing: SwingPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStrength {
    StrongBullish,
    WeakBullish,
    StrongBearish,
    WeakBearish,
    Ranging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSnapshot {
    pub trend: Trend,
    pub latest_break_of_structure: Option<StructureEvent>,
    pub latest_change_of_character: Option<StructureEvent>,
    pub swing_highs: Vec<SwingPoint>,
    pub swing_lows: Vec<SwingPoint>,
}

fn strictly_increasing(swings: &[SwingPoint]) -> bool {
    swings.windows(2).all(|w| w[1].price > w[0].price)
}

fn strictly_decreasing(swings: &[SwingPoint]) -> bool {
    swings.windows(2).all(|w| w[1].price < w[0].price)
}

/// Classify the trend from the full observed swing history.
///
/// Bullish requires every consecutive pair of swing highs AND of swing lows
/// to be strictly increasing; Bearish is the strict mirror. Fewer than two
/// swings in either list, or any non-conforming pair anywhere, is Ranging.
pub fn determine_trend(highs: &[SwingPoint], lows: &[SwingPoint]) -> Trend {
    if highs.len() < 2 || lows.len() < 2 {
        return Trend::Ranging;
    }
    if strictly_increasing(highs) && strictly_increasing(lows) {
        Trend::Bullish
    } else if strictly_decreasing(highs) && strictly_decreasing(lows) {
        Trend::Bearish
    } else {
        Trend::Ranging
    }
}

fn latest_of_kind(swings: &[SwingPoint], kind: SwingKind) -> Option<&SwingPoint> {
    swings.iter().rev().find(|s| s.kind == kind)
}

/// Continuation signal: the latest close strictly beyond the most recent
/// swing point in the trend's direction. None for Ranging or when the
/// needed swing kind is absent.
pub fn detect_break_of_structure(
    bars: &[Bar],
    swings: &[SwingPoint],
    trend: Trend,
) -> Option<StructureEvent> {
    let last = bars.last()?;
    match trend {
        Trend::Bullish => {
            let swing = latest_of_kind(swings, SwingKind::High)?;
            (last.close > swing.price).then(|| StructureEvent {
                direction: Direction::Bullish,
                price: last.close,
                timestamp: last.timestamp,
                broken_swing: swing.clone(),
            })
        }
        Trend::Bearish => {
            let swing = latest_of_kind(swings, SwingKind::Low)?;
            (last.close < swing.price).then(|| StructureEvent {
                direction: Direction::Bearish,
                price: last.close,
                timestamp: last.timestamp,
                broken_swing: swing.clone(),
            })
        }
        Trend::Ranging => None,
    }
}

/// Reversal signal: the latest close strictly beyond the most recent swing
/// point against the trend. None for Ranging or when the needed swing kind
/// is absent.
pub fn detect_change_of_character(
    bars: &[Bar],
    swings: &[SwingPoint],
    trend: Trend,
) -> Option<StructureEvent> {
    let last = bars.last()?;
    match trend {
        Trend::Bullish => {
            let swing = latest_of_kind(swings, SwingKind::Low)?;
            (last.close < swing.price).then(|| StructureEvent {
                direction: Direction::Bearish,
                price: last.close,
                timestamp: last.timestamp,
                broken_swing: swing.clone(),
            })
        }
        Trend::Bearish => {
            let swing = latest_of_kind(swings, SwingKind::High)?;
            (last.close > swing.price).then(|| StructureEvent {
                direction: Direction::Bullish,
                price: last.close,
                timestamp: last.timestamp,
                broken_swing: swing.clone(),
            })
        }
        Trend::Ranging => None,
    }
}

/// A trend with a break of structure and no change of character is strong;
/// a trend with anything less is weak.
pub fn classify_strength(snapshot: &StructureSnapshot) -> TrendStrength {
    let confirmed = snapshot.latest_break_of_structure.is_some()
        && snapshot.latest_change_of_character.is_none();
    match snapshot.trend {
        Trend::Ranging => TrendStrength::Ranging,
        Trend::Bullish if confirmed => TrendStrength::StrongBullish,
        Trend::Bullish => TrendStrength::WeakBullish,
        Trend::Bearish if confirmed => TrendStrength::StrongBearish,
        Trend::Bearish => TrendStrength::WeakBearish,
    }
}

/// Run the full pipeline over a bar slice: swings, trend, break events.
pub fn analyze(bars: &[Bar], lookback: usize) -> StructureSnapshot {
    let swings = identify_swings(bars, lookback);
    let swing_highs: Vec<SwingPoint> = swings
        .iter()
        .filter(|s| s.kind == SwingKind::High)
        .cloned()
        .collect();
    let swing_lows: Vec<SwingPoint> = swings
        .iter()
        .filter(|s| s.kind == SwingKind::Low)
        .cloned()
        .collect();

    let trend = determine_trend(&swing_highs, &swing_lows);

    StructureSnapshot {
        trend,
        latest_break_of_structure: detect_break_of_structure(bars, &swings, trend),
        latest_change_of_character: detect_change_of_character(bars, &swings, trend),
        swing_highs,
        swing_lows,
    }
}
