//! Proof engine: replays the last few occurrences of a condition.
//!
//! [`backtest_strategy`] locates up to [`PROOF_DEPTH`] historical matches,
//! derives exit levels for each (flat percentages in legacy mode, ATR-scaled
//! levels in dynamic mode) and simulates the trade. It never fails; empty
//! results carry a [`Degradation`] explaining why.
//!
//! [`PROOF_DEPTH`]: crate::domain::signal_locator::PROOF_DEPTH

use crate::domain::bar::{Bar, Column};
use crate::domain::condition::Expr;
use crate::domain::condition_parser::parse;
use crate::domain::risk::{compute_risk_levels, Direction, RiskConfig, RiskLevels, RiskStatus};
use crate::domain::signal_locator::locate;
use crate::domain::simulator::{
    simulate_trade, ExitLevels, TradeResult, DEFAULT_STOP_LOSS_PCT, DEFAULT_TAKE_PROFIT_PCT,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Legacy,
    Dynamic,
}

impl FromStr for ModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(ModeKind::Legacy),
            "dynamic" => Ok(ModeKind::Dynamic),
            other => Err(format!("unknown backtest mode '{}'", other)),
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeKind::Legacy => write!(f, "legacy"),
            ModeKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// How exit levels are derived for each replayed occurrence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BacktestMode {
    Legacy {
        stop_loss_pct: f64,
        take_profit_pct: f64,
    },
    /// ATR-scaled levels. The percentages apply when the series has no ATR
    /// column and the run falls back to legacy.
    Dynamic {
        risk: RiskConfig,
        direction: Direction,
        stop_loss_pct: f64,
        take_profit_pct: f64,
    },
}

impl Default for BacktestMode {
    fn default() -> Self {
        BacktestMode::Dynamic {
            risk: RiskConfig::default(),
            direction: Direction::Long,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
        }
    }
}

impl BacktestMode {
    pub fn legacy(stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        BacktestMode::Legacy {
            stop_loss_pct,
            take_profit_pct,
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            BacktestMode::Legacy { .. } => ModeKind::Legacy,
            BacktestMode::Dynamic { .. } => ModeKind::Dynamic,
        }
    }

    fn percentages(&self) -> (f64, f64) {
        match *self {
            BacktestMode::Legacy {
                stop_loss_pct,
                take_profit_pct,
            }
            | BacktestMode::Dynamic {
                stop_loss_pct,
                take_profit_pct,
                ..
            } => (stop_loss_pct, take_profit_pct),
        }
    }
}

/// Risk parameters used for one dynamic-mode replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProofRisk {
    pub entry_price: f64,
    pub atr_value: f64,
    pub atr_multiplier: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub stop_pct: f64,
    pub rr_ratio: f64,
    pub risk_status: RiskStatus,
}

impl ProofRisk {
    fn new(levels: &RiskLevels, atr_value: f64, atr_multiplier: f64) -> Self {
        Self {
            entry_price: levels.entry_price,
            atr_value,
            atr_multiplier,
            stop_loss_price: levels.stop_loss,
            take_profit_price: levels.take_profit,
            stop_pct: levels.stop_pct,
            rr_ratio: levels.rr_ratio,
            risk_status: levels.status,
        }
    }
}

/// One replayed occurrence. `pnl_percent` is in percent, rounded to two
/// decimals (-3.0 = -3%).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProofRecord {
    pub signal_date: String,
    pub result: TradeResult,
    pub pnl_percent: f64,
    pub duration_bars: usize,
    #[serde(flatten)]
    pub risk: Option<ProofRisk>,
}

/// Why a backtest produced no records.
#[derive(Debug, Clone, PartialEq)]
pub enum Degradation {
    EmptySeries,
    InvalidCondition(String),
    NoSignals,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::EmptySeries => write!(f, "empty bar series"),
            Degradation::InvalidCondition(reason) => write!(f, "invalid condition: {}", reason),
            Degradation::NoSignals => write!(f, "no historical signals"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub records: Vec<ProofRecord>,
    pub requested: ModeKind,
    /// Mode actually applied; legacy when dynamic was requested on a
    /// series without ATR.
    pub applied: ModeKind,
    pub degradation: Option<Degradation>,
}

impl BacktestReport {
    fn degraded(requested: ModeKind, applied: ModeKind, reason: Degradation) -> Self {
        Self {
            records: Vec::new(),
            requested,
            applied,
            degradation: Some(reason),
        }
    }

    pub fn fell_back(&self) -> bool {
        self.requested != self.applied
    }

    pub fn summary(&self) -> ProofSummary {
        ProofSummary::from_records(&self.records)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProofSummary {
    pub wins: usize,
    pub losses: usize,
    pub open: usize,
    pub win_rate: f64,
}

impl ProofSummary {
    /// `win_rate` is take-profit count over all records, in percent.
    pub fn from_records(records: &[ProofRecord]) -> Self {
        let count = |r: TradeResult| records.iter().filter(|p| p.result == r).count();
        let wins = count(TradeResult::TakeProfit);
        let win_rate = if records.is_empty() {
            0.0
        } else {
            wins as f64 / records.len() as f64 * 100.0
        };
        Self {
            wins,
            losses: count(TradeResult::StopLoss),
            open: count(TradeResult::Open),
            win_rate,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse `condition` and run [`backtest_expr`]. A condition that does not
/// parse produces an empty report.
pub fn backtest_strategy(bars: &[Bar], condition: &str, mode: &BacktestMode) -> BacktestReport {
    match parse(condition) {
        Ok(expr) => backtest_expr(bars, &expr, mode),
        Err(e) => {
            error!(
                condition,
                "error in backtest:\n{}",
                e.display_with_context(condition)
            );
            BacktestReport::degraded(
                mode.kind(),
                mode.kind(),
                Degradation::InvalidCondition(e.to_string()),
            )
        }
    }
}

pub fn backtest_expr(bars: &[Bar], expr: &Expr, mode: &BacktestMode) -> BacktestReport {
    let requested = mode.kind();
    if bars.is_empty() {
        error!("cannot backtest on an empty bar series");
        return BacktestReport::degraded(requested, requested, Degradation::EmptySeries);
    }

    let effective = match mode {
        BacktestMode::Dynamic { .. } if !Column::Atr.present_in(bars) => {
            warn!("ATR column unavailable, falling back to legacy percentage levels");
            let (stop_loss_pct, take_profit_pct) = mode.percentages();
            BacktestMode::legacy(stop_loss_pct, take_profit_pct)
        }
        other => *other,
    };
    let applied = effective.kind();

    let indices = match locate(bars, expr) {
        Ok(indices) => indices,
        Err(e) => {
            error!(condition = %expr, "error finding signal occurrences: {}", e);
            return BacktestReport::degraded(
                requested,
                applied,
                Degradation::InvalidCondition(e.to_string()),
            );
        }
    };
    if indices.is_empty() {
        info!("no signals found to backtest");
        return BacktestReport::degraded(requested, applied, Degradation::NoSignals);
    }

    info!(count = indices.len(), mode = %applied, "simulating historical signals");
    let records: Vec<ProofRecord> = indices
        .into_iter()
        .map(|idx| replay(bars, idx, &effective))
        .collect();

    BacktestReport {
        records,
        requested,
        applied,
        degradation: None,
    }
}

fn replay(bars: &[Bar], idx: usize, mode: &BacktestMode) -> ProofRecord {
    let bar = &bars[idx];
    let (levels, risk) = match *mode {
        BacktestMode::Legacy {
            stop_loss_pct,
            take_profit_pct,
        } => (
            ExitLevels::Percent {
                stop_loss_pct,
                take_profit_pct,
            },
            None,
        ),
        BacktestMode::Dynamic {
            risk, direction, ..
        } => {
            let atr = bar.indicators.atr.filter(|v| !v.is_nan()).unwrap_or(0.0);
            let levels = compute_risk_levels(bar.close, atr, direction, &risk);
            debug!(
                bar_index = idx,
                entry = bar.close,
                atr,
                stop = levels.stop_loss,
                target = levels.take_profit,
                status = %levels.status,
                "dynamic risk levels"
            );
            (
                ExitLevels::Prices {
                    stop: levels.stop_loss,
                    target: levels.take_profit,
                },
                Some(ProofRisk::new(&levels, atr, risk.volatility_multiplier)),
            )
        }
    };

    let outcome = simulate_trade(bars, idx, &levels);
    let record = ProofRecord {
        signal_date: bar.timestamp_string(),
        result: outcome.result,
        pnl_percent: round2(outcome.pnl_percent * 100.0),
        duration_bars: outcome.duration_bars,
        risk,
    };
    info!(
        "  {}: {} ({:+.2}%)",
        record.signal_date, record.result, record.pnl_percent
    );
    record
}
