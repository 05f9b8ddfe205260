//! Strategy definitions and loading from `[strategy.<id>]` config sections.

use crate::domain::bar::{Bar, Column};
use crate::domain::condition::Expr;
use crate::domain::condition_eval::evaluate_latest;
use crate::domain::condition_parser::parse;
use crate::domain::error::ScannerError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

pub const STRATEGY_SECTION_PREFIX: &str = "strategy.";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyParams {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub position_size_pct: f64,
    pub atr_multiplier: f64,
    pub volume_threshold: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            position_size_pct: 0.02,
            atr_multiplier: 1.5,
            volume_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub strategy_type: String,
    pub condition: String,
    pub expr: Expr,
    pub params: StrategyParams,
}

/// Check that `condition` parses, names only known columns and evaluates
/// on a populated sample bar.
pub fn validate_condition(condition: &str) -> Result<Expr, ScannerError> {
    let expr = parse(condition)?;
    if let Some(unknown) = expr.columns().into_iter().find(|c| !c.is_known()) {
        return Err(ScannerError::ConditionInvalid {
            reason: format!("unknown column '{}'", unknown),
        });
    }
    evaluate_latest(&expr, &[validation_sample()])?;
    Ok(expr)
}

fn validation_sample() -> Bar {
    let mut bar = Bar::new(NaiveDateTime::default(), 99.0, 101.0, 98.0, 100.0, 1000.0);
    let sample = [
        (Column::Rsi, 50.0),
        (Column::Ema200, 95.0),
        (Column::Atr, 2.0),
        (Column::BbLower, 90.0),
        (Column::BbMid, 95.0),
        (Column::BbUpper, 100.0),
        (Column::Adx, 25.0),
        (Column::Macd, 0.5),
        (Column::MacdSignal, 0.4),
        (Column::MacdHistogram, 0.1),
        (Column::StochRsiK, 50.0),
        (Column::StochRsiD, 45.0),
        (Column::VolumeSma, 1000.0),
    ];
    for (column, value) in sample {
        bar.set(&column, value);
    }
    bar
}

/// Load every `[strategy.<id>]` section. Strategies with a zero position
/// size or an invalid condition are skipped with a warning.
pub fn load_strategies(config: &dyn ConfigPort) -> Vec<Strategy> {
    let defaults = StrategyParams::default();
    let mut strategies = Vec::new();

    for section in config.sections() {
        let Some(id) = section.strip_prefix(STRATEGY_SECTION_PREFIX) else {
            continue;
        };
        let name = config
            .get_string(&section, "name")
            .unwrap_or_else(|| id.to_string());

        let Some(condition) = config.get_string(&section, "condition") else {
            warn!(strategy = %name, "skipping strategy: no condition");
            continue;
        };

        let params = StrategyParams {
            stop_loss_pct: config.get_double(&section, "stop_loss", defaults.stop_loss_pct),
            take_profit_pct: config.get_double(&section, "take_profit", defaults.take_profit_pct),
            position_size_pct: config.get_double(
                &section,
                "position_size",
                defaults.position_size_pct,
            ),
            atr_multiplier: config.get_double(&section, "atr_multiplier", defaults.atr_multiplier),
            volume_threshold: config.get_double(
                &section,
                "volume_threshold",
                defaults.volume_threshold,
            ),
        };

        if params.position_size_pct == 0.0 {
            warn!(strategy = %name, "skipping strategy: position size is zero");
            continue;
        }

        let expr = match validate_condition(&condition) {
            Ok(expr) => expr,
            Err(e) => {
                warn!(strategy = %name, condition = %condition, "invalid condition: {}", e);
                if let ScannerError::ConditionParse(pe) = &e {
                    debug!("\n{}", pe.display_with_context(&condition));
                }
                continue;
            }
        };

        info!(
            strategy = %name,
            atr_multiplier = params.atr_multiplier,
            volume_threshold = params.volume_threshold,
            "loaded strategy"
        );
        strategies.push(Strategy {
            id: id.to_string(),
            name,
            strategy_type: config
                .get_string(&section, "type")
                .unwrap_or_else(|| "Unknown".to_string()),
            condition,
            expr,
            params,
        });
    }

    if strategies.is_empty() {
        warn!("no strategies loaded");
    } else {
        info!(count = strategies.len(), "strategies loaded");
    }
    strategies
}
