//! End-to-end tests across risk sizing, simulation, proof replay and the
//! scan pipeline.
//!
//! Tests cover:
//! - Risk level scenarios (in-band, zero volatility, ceiling)
//! - Trade simulation with ATR-derived levels
//! - Proof replay in dynamic and legacy mode, including ATR fallback
//! - Full scan over CSV files on disk with indicator enrichment and macros

mod common;

use approx::assert_relative_eq;
use common::*;
use marketscan::adapters::csv_adapter::CsvAdapter;
use marketscan::adapters::markdown_report::MarkdownReport;
use marketscan::domain::backtest::{backtest_strategy, BacktestMode, Degradation, ModeKind};
use marketscan::domain::bar::Column;
use marketscan::domain::error::ScannerError;
use marketscan::domain::risk::{compute_risk_levels, Direction, RiskConfig, RiskStatus};
use marketscan::domain::scan::{load_macros, prepare_bars, run_scan, ScanConfig};
use marketscan::domain::signal_locator::find_signal_occurrences;
use marketscan::domain::simulator::{simulate_trade, ExitLevels, TradeResult};
use marketscan::domain::strategy::{validate_condition, Strategy, StrategyParams};
use marketscan::ports::report_port::ReportPort;
use std::fs;
use tempfile::TempDir;

fn strategy(name: &str, condition: &str) -> Strategy {
    Strategy {
        id: name.to_lowercase().replace(' ', "_"),
        name: name.to_string(),
        strategy_type: "Test".to_string(),
        condition: condition.to_string(),
        expr: validate_condition(condition).unwrap(),
        params: StrategyParams::default(),
    }
}

mod risk_scenarios {
    use super::*;

    #[test]
    fn atr_two_on_entry_hundred() {
        let levels = compute_risk_levels(100.0, 2.0, Direction::Long, &RiskConfig::default());
        assert_relative_eq!(levels.stop_distance, 3.0);
        assert_relative_eq!(levels.stop_pct, 0.03);
        assert_relative_eq!(levels.stop_loss, 97.0);
        assert_relative_eq!(levels.take_profit, 106.0);
        assert_relative_eq!(levels.rr_ratio, 2.0);
        assert_eq!(levels.status, RiskStatus::Ok);
    }

    #[test]
    fn zero_volatility_uses_floor() {
        let levels = compute_risk_levels(100.0, 0.0, Direction::Long, &RiskConfig::default());
        assert_relative_eq!(levels.stop_distance, 1.0);
        assert_relative_eq!(levels.stop_loss, 99.0);
        assert_relative_eq!(levels.take_profit, 102.0);
        assert_eq!(levels.status, RiskStatus::VolatilityUndefined);
    }

    #[test]
    fn short_side_mirrors_levels() {
        let levels = compute_risk_levels(100.0, 2.0, Direction::Short, &RiskConfig::default());
        assert_relative_eq!(levels.stop_loss, 103.0);
        assert_relative_eq!(levels.take_profit, 94.0);
        assert_eq!(levels.status, RiskStatus::Ok);
    }
}

mod simulation {
    use super::*;

    #[test]
    fn atr_levels_stopped_out_next_bar() {
        let levels = compute_risk_levels(100.0, 2.0, Direction::Long, &RiskConfig::default());
        let bars = vec![
            make_bar(0, 100.0, 100.5, 99.5, 100.0, 1000.0),
            make_bar(1, 99.0, 101.0, 94.0, 95.0, 1000.0),
        ];
        let exits = ExitLevels::Prices {
            stop: levels.stop_loss,
            target: levels.take_profit,
        };
        let outcome = simulate_trade(&bars, 0, &exits);
        assert_eq!(outcome.result, TradeResult::StopLoss);
        assert_eq!(outcome.duration_bars, 1);
        assert_relative_eq!(outcome.pnl_percent, -0.03);
    }

    #[test]
    fn entry_on_last_bar_stays_open() {
        let bars = series(&[100.0, 101.0, 102.0]);
        let outcome = simulate_trade(&bars, 2, &ExitLevels::default());
        assert_eq!(outcome.result, TradeResult::Open);
        assert_eq!(outcome.duration_bars, 0);
    }
}

mod proof_replay {
    use super::*;

    #[test]
    fn dynamic_replay_records_risk() {
        let mut bars = vec![
            make_bar(0, 100.0, 100.5, 99.5, 100.0, 1000.0),
            make_bar(1, 99.0, 101.0, 94.0, 95.0, 1000.0),
            make_bar(2, 95.0, 96.0, 94.0, 95.5, 1000.0),
        ];
        for (bar, rsi) in bars.iter_mut().zip([20.0, 50.0, 50.0]) {
            bar.indicators.rsi = Some(rsi);
            bar.indicators.atr = Some(2.0);
        }

        let report = backtest_strategy(&bars, "rsi < 30", &BacktestMode::default());
        assert_eq!(report.applied, ModeKind::Dynamic);
        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.signal_date, "2024-01-01 00:00:00");
        assert_eq!(record.result, TradeResult::StopLoss);
        assert_eq!(record.pnl_percent, -3.0);
        assert_eq!(record.duration_bars, 1);
        let risk = record.risk.unwrap();
        assert_relative_eq!(risk.stop_loss_price, 97.0);
        assert_relative_eq!(risk.take_profit_price, 106.0);
        assert_eq!(risk.risk_status, RiskStatus::Ok);
    }

    #[test]
    fn five_matches_replay_last_three() {
        let closes = [90.0, 110.0, 91.0, 112.0, 92.0, 113.0, 93.0, 114.0, 94.0, 115.0];
        let bars = series(&closes);
        assert_eq!(find_signal_occurrences(&bars, "close < 100"), vec![4, 6, 8]);

        let report = backtest_strategy(&bars, "close < 100", &BacktestMode::legacy(0.02, 0.04));
        let dates: Vec<&str> = report.records.iter().map(|r| r.signal_date.as_str()).collect();
        assert_eq!(
            dates,
            vec!["2024-01-01 04:00:00", "2024-01-01 06:00:00", "2024-01-01 08:00:00"]
        );
        // each dip is followed by a jump well above the 4% target
        assert!(report
            .records
            .iter()
            .all(|r| r.result == TradeResult::TakeProfit && r.pnl_percent == 4.0));
        assert_eq!(report.summary().win_rate, 100.0);
    }

    #[test]
    fn missing_atr_falls_back_to_legacy() {
        let bars = series(&[100.0, 90.0, 100.0]);
        let report = backtest_strategy(&bars, "close < 95", &BacktestMode::default());
        assert!(report.fell_back());
        assert_eq!(report.requested, ModeKind::Dynamic);
        assert_eq!(report.applied, ModeKind::Legacy);
        assert_eq!(report.records.len(), 1);
        assert!(report.records[0].risk.is_none());
        assert_eq!(report.records[0].result, TradeResult::TakeProfit);
        assert_eq!(report.records[0].pnl_percent, 4.0);
    }

    #[test]
    fn degradations_are_reported() {
        let bars = series(&[100.0, 101.0]);
        let none = backtest_strategy(&bars, "close > 500", &BacktestMode::default());
        assert_eq!(none.degradation, Some(Degradation::NoSignals));

        let empty = backtest_strategy(&[], "close > 0", &BacktestMode::default());
        assert_eq!(empty.degradation, Some(Degradation::EmptySeries));

        let missing = backtest_strategy(&bars, "rsi < 30", &BacktestMode::legacy(0.02, 0.04));
        assert!(matches!(missing.degradation, Some(Degradation::InvalidCondition(_))));
    }
}

mod scan_pipeline {
    use super::*;

    #[test]
    fn mock_port_scan_skips_failing_symbols() {
        let port = MockDataPort::new()
            .with_bars("BTC/USDT", wave_series(260))
            .with_bars("EMPTY/USDT", Vec::new())
            .with_error("BAD/USDT", "connection reset");
        let result = run_scan(
            &port,
            &[strategy("Always", "close > 0")],
            &ScanConfig::default(),
        )
        .unwrap();

        assert_eq!(result.symbols, vec!["BAD/USDT", "BTC/USDT", "EMPTY/USDT"]);
        assert_eq!(result.signals.len(), 1);
        let signal = &result.signals[0];
        assert_eq!(signal.asset, "BTC/USDT");
        assert!(signal.risk.is_some());
        assert_eq!(signal.backtest_results.len(), 3);
        assert!(signal.backtest_results.iter().all(|r| r.risk.is_some()));
    }

    #[test]
    fn lookback_limits_bars_before_enrichment() {
        let port = MockDataPort::new().with_bars("BTC/USDT", wave_series(260));
        let config = ScanConfig {
            lookback_bars: 150,
            ..ScanConfig::default()
        };
        let bars = prepare_bars(&port, "BTC/USDT", &[], &config).unwrap();
        assert_eq!(bars.len(), 150);
        assert!(!Column::Atr.present_in(&bars));

        let result = run_scan(&port, &[strategy("Always", "close > 0")], &config).unwrap();
        let signal = &result.signals[0];
        assert!(signal.risk.is_none());
        assert!(signal.backtest_results.iter().all(|r| r.risk.is_none()));
    }

    #[test]
    fn csv_scan_end_to_end() {
        let dir = TempDir::new().unwrap();
        write_bars_csv(&dir.path().join("BTC_USDT.csv"), &wave_series(260));
        write_bars_csv(&dir.path().join("ETH_USDT.csv"), &series(&[100.0, 101.0]));
        fs::create_dir(dir.path().join("macro")).unwrap();
        fs::write(
            dir.path().join("macro").join("gold.csv"),
            "date,open,high,low,close,volume\n2023-12-31,2000,2010,1990,2005,0\n2024-01-05,2010,2030,2000,2020,0\n",
        )
        .unwrap();

        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let config = ScanConfig {
            macro_assets: vec!["gold".into(), "silver".into()],
            sentiment_score: 0.4,
            ..ScanConfig::default()
        };

        let macros = load_macros(&adapter, &config.macro_assets);
        assert_eq!(macros.len(), 1);
        let bars = prepare_bars(&adapter, "BTC/USDT", &macros, &config).unwrap();
        let gold = Column::Extra("gold_close".into());
        assert_eq!(bars[0].value(&gold), Some(2005.0));
        assert_eq!(bars[259].value(&gold), Some(2020.0));
        assert!(bars[259].indicators.ema_200.is_some());

        let result = run_scan(
            &adapter,
            &[strategy("Above EMA", "close > 0 and ema_200 > 0")],
            &config,
        )
        .unwrap();
        assert_eq!(result.symbols, vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(result.signals.len(), 1);

        let report_path = dir.path().join("out").join("scan.md");
        MarkdownReport
            .write(&result, report_path.to_str().unwrap())
            .unwrap();
        let report = fs::read_to_string(&report_path).unwrap();
        assert!(report.contains("📈 Bullish"));
        assert!(report.contains("### Signal 1: BTC/USDT - Above EMA"));
        assert!(report.contains("| Signal Date | Result | P&L | Duration |"));
    }

    #[test]
    fn scan_without_strategies_fails() {
        let port = MockDataPort::new().with_bars("BTC/USDT", series(&[1.0]));
        let err = run_scan(&port, &[], &ScanConfig::default()).unwrap_err();
        assert!(matches!(err, ScannerError::NoStrategies));
    }
}
