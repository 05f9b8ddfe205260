//! Scan pipeline: symbols × strategies on the latest bar, with proof.
//!
//! For each symbol the bar series is fetched, enriched and merged with the
//! configured macro closes. Every strategy is then evaluated on the latest
//! bar; matches pass volume confirmation and (optionally) the risk gate,
//! get ATR-based levels and a replay of their last occurrences attached.

use crate::domain::backtest::{backtest_expr, BacktestMode, ModeKind};
use crate::domain::bar::{Bar, TIMESTAMP_FORMAT};
use crate::domain::error::ScannerError;
use crate::domain::indicator::{enrich, IndicatorSettings};
use crate::domain::macro_context::merge_macro_closes;
use crate::domain::risk::{compute_risk_levels, Direction, RiskConfig, RiskStatus};
use crate::domain::signal::{match_latest, volume_confirmed, Signal, SignalRisk};
use crate::domain::strategy::Strategy;
use crate::ports::data_port::DataPort;
use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, warn};

pub const DEFAULT_LOOKBACK_BARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Symbols to scan; empty means every symbol the data port lists.
    pub symbols: Vec<String>,
    pub lookback_bars: usize,
    pub mode: ModeKind,
    pub min_reward_risk: f64,
    /// Drop signals whose risk status at signal time is not OK.
    pub require_ok_risk: bool,
    pub macro_assets: Vec<String>,
    pub sentiment_score: f64,
    pub indicators: IndicatorSettings,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            lookback_bars: DEFAULT_LOOKBACK_BARS,
            mode: ModeKind::Dynamic,
            min_reward_risk: RiskConfig::default().min_reward_risk,
            require_ok_risk: false,
            macro_assets: Vec::new(),
            sentiment_score: 0.0,
            indicators: IndicatorSettings::default(),
        }
    }
}

impl ScanConfig {
    /// Risk settings for one strategy: its ATR multiplier with the scan's
    /// minimum reward:risk.
    pub fn risk_for(&self, strategy: &Strategy) -> RiskConfig {
        RiskConfig {
            volatility_multiplier: strategy.params.atr_multiplier,
            min_reward_risk: self.min_reward_risk,
        }
    }

    pub fn mode_for(&self, strategy: &Strategy) -> BacktestMode {
        let params = &strategy.params;
        match self.mode {
            ModeKind::Legacy => BacktestMode::legacy(params.stop_loss_pct, params.take_profit_pct),
            ModeKind::Dynamic => BacktestMode::Dynamic {
                risk: self.risk_for(strategy),
                direction: Direction::Long,
                stop_loss_pct: params.stop_loss_pct,
                take_profit_pct: params.take_profit_pct,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub generated_at: String,
    pub sentiment_score: f64,
    pub symbols: Vec<String>,
    pub signals: Vec<Signal>,
}

/// Fetch, enrich and macro-merge the bars for one symbol.
pub fn prepare_bars(
    data: &dyn DataPort,
    symbol: &str,
    macros: &[(String, Vec<Bar>)],
    config: &ScanConfig,
) -> Result<Vec<Bar>, ScannerError> {
    let mut bars = data.fetch_ohlcv(symbol, config.lookback_bars)?;
    if bars.is_empty() {
        return Err(ScannerError::NoData {
            symbol: symbol.to_string(),
        });
    }
    enrich(&mut bars, &config.indicators);
    for (name, macro_bars) in macros {
        merge_macro_closes(&mut bars, name, macro_bars);
    }
    Ok(bars)
}

pub fn load_macros(data: &dyn DataPort, assets: &[String]) -> Vec<(String, Vec<Bar>)> {
    assets
        .iter()
        .filter_map(|asset| match data.fetch_macro(asset) {
            Ok(bars) => Some((asset.clone(), bars)),
            Err(e) => {
                warn!(asset = %asset, "macro data unavailable: {}", e);
                None
            }
        })
        .collect()
}

/// Evaluate every strategy against one prepared series.
pub fn scan_symbol(
    symbol: &str,
    bars: &[Bar],
    strategies: &[Strategy],
    config: &ScanConfig,
) -> Vec<Signal> {
    let mut signals = Vec::new();
    let Some(latest) = bars.last() else {
        return signals;
    };

    for strategy in strategies {
        let mut signal = match match_latest(symbol, strategy, bars) {
            Ok(Some(signal)) => signal,
            Ok(None) => continue,
            Err(e) => {
                warn!(symbol, strategy = %strategy.name, "condition evaluation failed: {}", e);
                continue;
            }
        };

        if !volume_confirmed(latest, strategy.params.volume_threshold) {
            info!(
                symbol,
                strategy = %strategy.name,
                volume = latest.volume,
                threshold = strategy.params.volume_threshold,
                "signal rejected: low volume"
            );
            continue;
        }

        if let Some(atr) = latest.indicators.atr.filter(|v| !v.is_nan()) {
            let risk = config.risk_for(strategy);
            let levels = compute_risk_levels(latest.close, atr, Direction::Long, &risk);
            if config.require_ok_risk && levels.status != RiskStatus::Ok {
                info!(
                    symbol,
                    strategy = %strategy.name,
                    status = %levels.status,
                    "signal rejected: risk status"
                );
                continue;
            }
            signal.risk = Some(SignalRisk::new(&levels, atr, risk.volatility_multiplier));
        }

        let report = backtest_expr(bars, &strategy.expr, &config.mode_for(strategy));
        if let Some(reason) = &report.degradation {
            debug!(symbol, strategy = %strategy.name, "no proof: {}", reason);
        }
        signal.attach_proof(report.records);

        info!(
            symbol,
            strategy = %strategy.name,
            entry = signal.entry_price,
            win_rate = signal.win_rate,
            "signal"
        );
        signals.push(signal);
    }
    signals
}

/// Run the full scan. Symbols that cannot be loaded are skipped.
pub fn run_scan(
    data: &dyn DataPort,
    strategies: &[Strategy],
    config: &ScanConfig,
) -> Result<ScanResult, ScannerError> {
    if strategies.is_empty() {
        return Err(ScannerError::NoStrategies);
    }
    let symbols = if config.symbols.is_empty() {
        data.list_symbols()?
    } else {
        config.symbols.clone()
    };
    let macros = load_macros(data, &config.macro_assets);

    info!(
        symbols = symbols.len(),
        strategies = strategies.len(),
        mode = %config.mode,
        "starting scan"
    );

    let mut signals = Vec::new();
    for symbol in &symbols {
        let bars = match prepare_bars(data, symbol, &macros, config) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %symbol, "skipping symbol: {}", e);
                continue;
            }
        };
        signals.extend(scan_symbol(symbol, &bars, strategies, config));
    }

    info!(signals = signals.len(), "scan complete");
    Ok(ScanResult {
        generated_at: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        sentiment_score: config.sentiment_score,
        symbols,
        signals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::simulator::TradeResult;
    use crate::domain::strategy::{validate_condition, StrategyParams};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct MockData {
        series: HashMap<String, Vec<Bar>>,
    }

    impl DataPort for MockData {
        fn fetch_ohlcv(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>, ScannerError> {
            let bars = self.series.get(symbol).ok_or_else(|| ScannerError::NoData {
                symbol: symbol.to_string(),
            })?;
            Ok(bars[bars.len().saturating_sub(limit)..].to_vec())
        }

        fn fetch_macro(&self, asset: &str) -> Result<Vec<Bar>, ScannerError> {
            self.fetch_ohlcv(asset, usize::MAX)
        }

        fn list_symbols(&self) -> Result<Vec<String>, ScannerError> {
            let mut symbols: Vec<String> = self.series.keys().cloned().collect();
            symbols.sort();
            Ok(symbols)
        }
    }

    fn strategy(name: &str, condition: &str) -> Strategy {
        Strategy {
            id: name.to_lowercase(),
            name: name.into(),
            strategy_type: "Reversal".into(),
            condition: condition.into(),
            expr: validate_condition(condition).unwrap(),
            params: StrategyParams::default(),
        }
    }

    /// Flat bars at 100 with ATR 2; RSI dips below 30 on bars 0, 2, 4 and 9.
    fn dip_series() -> Vec<Bar> {
        let rsi = [25.0, 50.0, 25.0, 50.0, 25.0, 50.0, 50.0, 50.0, 50.0, 25.0];
        rsi.iter()
            .enumerate()
            .map(|(i, &r)| {
                let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
                    .unwrap()
                    .and_hms_opt(i as u32, 0, 0)
                    .unwrap();
                let mut bar = Bar::new(ts, 100.0, 101.0, 99.0, 100.0, 1000.0);
                bar.indicators.rsi = Some(r);
                bar.indicators.atr = Some(2.0);
                bar
            })
            .collect()
    }

    fn mock(series: Vec<(&str, Vec<Bar>)>) -> MockData {
        MockData {
            series: series
                .into_iter()
                .map(|(s, b)| (s.to_string(), b))
                .collect(),
        }
    }

    #[test]
    fn dynamic_scan_attaches_levels_and_proof() {
        let data = mock(vec![("BTC/USDT", dip_series())]);
        let strategies = vec![strategy("RSI Dip", "rsi < 30"), strategy("Never", "rsi > 90")];
        let result = run_scan(&data, &strategies, &ScanConfig::default()).unwrap();

        assert_eq!(result.symbols, vec!["BTC/USDT"]);
        assert_eq!(result.signals.len(), 1);
        let signal = &result.signals[0];
        assert_eq!(signal.strategy, "RSI Dip");
        assert_eq!(signal.entry_price, 100.0);
        assert_eq!(signal.timestamp, "2024-05-01 09:00:00");

        let risk = signal.risk.unwrap();
        assert_eq!(risk.stop_loss_price, 97.0);
        assert_eq!(risk.take_profit_price, 106.0);
        assert_eq!(risk.risk_status, RiskStatus::Ok);

        let dates: Vec<&str> = signal
            .backtest_results
            .iter()
            .map(|r| r.signal_date.as_str())
            .collect();
        assert_eq!(
            dates,
            vec!["2024-05-01 02:00:00", "2024-05-01 04:00:00", "2024-05-01 09:00:00"]
        );
        assert!(signal
            .backtest_results
            .iter()
            .all(|r| r.result == TradeResult::Open && r.risk.is_some()));
        assert_eq!(signal.win_rate, 0.0);
    }

    #[test]
    fn legacy_scan_has_no_proof_risk() {
        let data = mock(vec![("BTC/USDT", dip_series())]);
        let config = ScanConfig {
            mode: ModeKind::Legacy,
            ..ScanConfig::default()
        };
        let result = run_scan(&data, &[strategy("RSI Dip", "rsi < 30")], &config).unwrap();
        let signal = &result.signals[0];
        assert!(signal.risk.is_some());
        assert_eq!(signal.backtest_results.len(), 3);
        assert!(signal.backtest_results.iter().all(|r| r.risk.is_none()));
    }

    #[test]
    fn low_volume_rejects_signal() {
        let mut bars = dip_series();
        bars[9].indicators.volume_sma = Some(5000.0);
        let data = mock(vec![("BTC/USDT", bars)]);
        let result =
            run_scan(&data, &[strategy("RSI Dip", "rsi < 30")], &ScanConfig::default()).unwrap();
        assert!(result.signals.is_empty());
    }

    #[test]
    fn risk_gate_drops_wide_stops() {
        let mut bars = dip_series();
        bars[9].indicators.atr = Some(10.0);
        let data = mock(vec![("BTC/USDT", bars)]);
        let strategies = [strategy("RSI Dip", "rsi < 30")];

        let open = run_scan(&data, &strategies, &ScanConfig::default()).unwrap();
        assert_eq!(
            open.signals[0].risk.unwrap().risk_status,
            RiskStatus::VolatilityTooHigh
        );

        let gated = ScanConfig {
            require_ok_risk: true,
            ..ScanConfig::default()
        };
        assert!(run_scan(&data, &strategies, &gated).unwrap().signals.is_empty());
    }

    #[test]
    fn missing_symbols_are_skipped() {
        let data = mock(vec![("ETH/USDT", dip_series())]);
        let config = ScanConfig {
            symbols: vec!["DOGE/USDT".into(), "ETH/USDT".into()],
            ..ScanConfig::default()
        };
        let result = run_scan(&data, &[strategy("RSI Dip", "rsi < 30")], &config).unwrap();
        assert_eq!(result.signals.len(), 1);
        assert_eq!(result.signals[0].asset, "ETH/USDT");
    }

    #[test]
    fn macro_columns_reach_conditions() {
        let gold: Vec<Bar> = dip_series()
            .into_iter()
            .map(|mut b| {
                b.close = 2100.0;
                b
            })
            .collect();
        let data = mock(vec![("BTC/USDT", dip_series()), ("gold", gold)]);
        let config = ScanConfig {
            symbols: vec!["BTC/USDT".into()],
            macro_assets: vec!["gold".into()],
            ..ScanConfig::default()
        };
        let mut macro_strategy = strategy("Gold Hedge", "rsi < 30");
        macro_strategy.expr = crate::domain::condition_parser::parse("gold_close > 2000").unwrap();
        let result = run_scan(&data, &[macro_strategy], &config).unwrap();
        assert_eq!(result.signals.len(), 1);
    }

    #[test]
    fn no_strategies_is_an_error() {
        let data = mock(vec![]);
        assert!(matches!(
            run_scan(&data, &[], &ScanConfig::default()),
            Err(ScannerError::NoStrategies)
        ));
    }
}
