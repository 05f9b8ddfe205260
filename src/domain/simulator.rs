//! Forward replay of a single entry.
//!
//! The simulator walks bars after the entry until the stop or the target is
//! touched. Percentage exits are always long. Absolute exits are short when
//! the stop sits above the target. Within one bar the stop is checked first: intraday ordering is
//! unknown, so the worse outcome wins.

use crate::domain::bar::Bar;
use serde::Serialize;
use std::fmt;
use tracing::{debug, error};

pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.02;
pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TradeResult {
    #[serde(rename = "TP")]
    TakeProfit,
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "Open")]
    Open,
}

impl TradeResult {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeResult::TakeProfit => "TP",
            TradeResult::StopLoss => "SL",
            TradeResult::Open => "Open",
        }
    }
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one simulated entry. `pnl_percent` is a fraction
/// (0.04 = 4%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeOutcome {
    pub result: TradeResult,
    pub pnl_percent: f64,
    pub duration_bars: usize,
}

impl TradeOutcome {
    pub fn open(duration_bars: usize) -> Self {
        Self {
            result: TradeResult::Open,
            pnl_percent: 0.0,
            duration_bars,
        }
    }
}

/// Where a simulated trade exits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitLevels {
    /// Absolute stop and target prices. A stop above the target is a short.
    Prices { stop: f64, target: f64 },
    /// Fractions of the entry close. A hit books exactly `-stop_loss_pct`
    /// or `+take_profit_pct`.
    Percent {
        stop_loss_pct: f64,
        take_profit_pct: f64,
    },
}

impl Default for ExitLevels {
    fn default() -> Self {
        ExitLevels::Percent {
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
        }
    }
}

impl ExitLevels {
    /// Absolute prices win when both are given; otherwise percentages, with
    /// 2% / 4% filling whichever is missing.
    pub fn resolve(
        stop_price: Option<f64>,
        target_price: Option<f64>,
        stop_loss_pct: Option<f64>,
        take_profit_pct: Option<f64>,
    ) -> Self {
        match (stop_price, target_price) {
            (Some(stop), Some(target)) => ExitLevels::Prices { stop, target },
            _ => ExitLevels::Percent {
                stop_loss_pct: stop_loss_pct.unwrap_or(DEFAULT_STOP_LOSS_PCT),
                take_profit_pct: take_profit_pct.unwrap_or(DEFAULT_TAKE_PROFIT_PCT),
            },
        }
    }

    fn prices(&self, entry_price: f64) -> (f64, f64) {
        match *self {
            ExitLevels::Prices { stop, target } => (stop, target),
            ExitLevels::Percent {
                stop_loss_pct,
                take_profit_pct,
            } => (
                entry_price * (1.0 - stop_loss_pct),
                entry_price * (1.0 + take_profit_pct),
            ),
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(*self, ExitLevels::Prices { stop, target } if stop > target)
    }

    fn signed_move(&self, entry_price: f64, exit: f64) -> f64 {
        let pnl = (exit - entry_price) / entry_price;
        if self.is_short() { -pnl } else { pnl }
    }

    fn stop_pnl(&self, entry_price: f64, stop: f64) -> f64 {
        match *self {
            ExitLevels::Prices { .. } => self.signed_move(entry_price, stop),
            ExitLevels::Percent { stop_loss_pct, .. } => -stop_loss_pct,
        }
    }

    fn target_pnl(&self, entry_price: f64, target: f64) -> f64 {
        match *self {
            ExitLevels::Prices { .. } => self.signed_move(entry_price, target),
            ExitLevels::Percent {
                take_profit_pct, ..
            } => take_profit_pct,
        }
    }
}

/// Replay from the close of `bars[entry_index]`.
///
/// An out-of-range entry yields `Open` with zero duration. A trade that
/// never touches either level is `Open` for `last_index - entry_index` bars.
pub fn simulate_trade(bars: &[Bar], entry_index: usize, levels: &ExitLevels) -> TradeOutcome {
    let Some(entry_bar) = bars.get(entry_index) else {
        error!(entry_index, len = bars.len(), "invalid entry index");
        return TradeOutcome::open(0);
    };
    let entry_price = entry_bar.close;
    let (stop, target) = levels.prices(entry_price);
    let short = levels.is_short();
    debug!(entry_price, stop, target, short, "simulating trade");

    for (i, bar) in bars.iter().enumerate().skip(entry_index + 1) {
        let duration_bars = i - entry_index;
        let (stop_hit, target_hit) = if short {
            (bar.high >= stop, bar.low <= target)
        } else {
            (bar.low <= stop, bar.high >= target)
        };
        if stop_hit {
            debug!(bar_index = i, duration_bars, "stop loss hit");
            return TradeOutcome {
                result: TradeResult::StopLoss,
                pnl_percent: levels.stop_pnl(entry_price, stop),
                duration_bars,
            };
        }
        if target_hit {
            debug!(bar_index = i, duration_bars, "take profit hit");
            return TradeOutcome {
                result: TradeResult::TakeProfit,
                pnl_percent: levels.target_pnl(entry_price, target),
                duration_bars,
            };
        }
    }

    let duration_bars = bars.len() - 1 - entry_index;
    debug!(entry_index, duration_bars, "trade still open at end of data");
    TradeOutcome::open(duration_bars)
}
