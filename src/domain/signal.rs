//! A strategy match on the latest bar, with its risk verdict and proof.

use crate::domain::backtest::{ProofRecord, ProofSummary};
use crate::domain::bar::Bar;
use crate::domain::condition_eval::evaluate_latest;
use crate::domain::error::EvalError;
use crate::domain::risk::{RiskLevels, RiskStatus};
use crate::domain::strategy::{Strategy, StrategyParams};
use serde::Serialize;

/// Risk levels computed at signal time from the latest ATR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalRisk {
    pub atr_value: f64,
    pub atr_multiplier: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub stop_pct: f64,
    pub rr_ratio: f64,
    pub risk_status: RiskStatus,
}

impl SignalRisk {
    pub fn new(levels: &RiskLevels, atr_value: f64, atr_multiplier: f64) -> Self {
        Self {
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

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub asset: String,
    pub strategy: String,
    pub strategy_type: String,
    pub timestamp: String,
    pub entry_price: f64,
    pub condition: String,
    pub params: StrategyParams,
    #[serde(flatten)]
    pub risk: Option<SignalRisk>,
    #[serde(rename = "proof")]
    pub backtest_results: Vec<ProofRecord>,
    pub win_rate: f64,
}

impl Signal {
    pub fn new(asset: &str, strategy: &Strategy, latest: &Bar) -> Self {
        Self {
            asset: asset.to_string(),
            strategy: strategy.name.clone(),
            strategy_type: strategy.strategy_type.clone(),
            timestamp: latest.timestamp_string(),
            entry_price: latest.close,
            condition: strategy.condition.clone(),
            params: strategy.params,
            risk: None,
            backtest_results: Vec::new(),
            win_rate: 0.0,
        }
    }

    pub fn attach_proof(&mut self, records: Vec<ProofRecord>) {
        self.win_rate = ProofSummary::from_records(&records).win_rate;
        self.backtest_results = records;
    }

    /// Reward:risk used for display: the dynamic ratio when levels were
    /// computed, otherwise take-profit over stop-loss percentage.
    pub fn reward_risk(&self) -> f64 {
        match &self.risk {
            Some(risk) => risk.rr_ratio,
            None if self.params.stop_loss_pct != 0.0 => {
                self.params.take_profit_pct / self.params.stop_loss_pct
            }
            None => 0.0,
        }
    }
}

/// Evaluate the strategy against the last bar; `Some` on a match.
pub fn match_latest(
    asset: &str,
    strategy: &Strategy,
    bars: &[Bar],
) -> Result<Option<Signal>, EvalError> {
    let Some(latest) = bars.last() else {
        return Ok(None);
    };
    if evaluate_latest(&strategy.expr, bars)? {
        Ok(Some(Signal::new(asset, strategy, latest)))
    } else {
        Ok(None)
    }
}

/// False only when both volume and its average are known and volume falls
/// below `volume_sma * threshold`.
pub fn volume_confirmed(bar: &Bar, threshold: f64) -> bool {
    match bar.indicators.volume_sma {
        Some(sma) if !sma.is_nan() && !bar.volume.is_nan() => bar.volume >= sma * threshold,
        _ => true,
    }
}
