//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::markdown_report::MarkdownReport;
use crate::domain::backtest::{backtest_expr, BacktestMode, BacktestReport, Degradation, ModeKind};
use crate::domain::condition_parser::parse;
use crate::domain::config_validation::{data_dir, load_scan_config, output_path, split_list};
use crate::domain::error::ScannerError;
use crate::domain::risk::{compute_risk_levels_for, Direction, RiskConfig, RiskLevels};
use crate::domain::scan::{load_macros, prepare_bars, run_scan, ScanConfig, ScanResult};
use crate::domain::simulator::{DEFAULT_STOP_LOSS_PCT, DEFAULT_TAKE_PROFIT_PCT};
use crate::domain::strategy::{load_strategies, Strategy};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "marketscan",
    about = "Crypto market scanner with ATR risk levels and backtest proof"
)]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan symbols for strategy signals and write a Markdown report
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy file; defaults to the [strategy.*] sections of --config
        #[arg(short, long)]
        strategies: Option<PathBuf>,
        /// Comma-separated symbols, overriding [scan] symbols
        #[arg(long)]
        symbols: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        mode: Option<ModeKind>,
    },
    /// Replay the last occurrences of a condition on one symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        condition: String,
        #[arg(long, default_value = "dynamic")]
        mode: ModeKind,
        #[arg(long, default_value_t = DEFAULT_STOP_LOSS_PCT)]
        stop_loss: f64,
        #[arg(long, default_value_t = DEFAULT_TAKE_PROFIT_PCT)]
        take_profit: f64,
        #[arg(long, default_value_t = RiskConfig::default().volatility_multiplier)]
        atr_multiplier: f64,
        #[arg(long)]
        json: bool,
    },
    /// Load and check every strategy in a file
    Validate {
        #[arg(short, long)]
        strategies: PathBuf,
    },
    /// Compute ATR-based stop and target levels for one entry
    Risk {
        #[arg(long, allow_hyphen_values = true)]
        entry: f64,
        #[arg(long, allow_hyphen_values = true)]
        atr: f64,
        #[arg(long, default_value = "long")]
        direction: String,
        #[arg(long, default_value_t = RiskConfig::default().volatility_multiplier)]
        multiplier: f64,
        #[arg(long, default_value_t = RiskConfig::default().min_reward_risk)]
        min_rr: f64,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Scan {
            config,
            strategies,
            symbols,
            output,
            mode,
        } => run_scan_command(
            &config,
            strategies.as_deref(),
            symbols.as_deref(),
            output.as_deref(),
            mode,
        ),
        Command::Backtest {
            config,
            symbol,
            condition,
            mode,
            stop_loss,
            take_profit,
            atr_multiplier,
            json,
        } => {
            let options = BacktestOptions {
                mode,
                stop_loss,
                take_profit,
                atr_multiplier,
                json,
            };
            run_backtest(&config, &symbol, &condition, &options)
        }
        Command::Validate { strategies } => run_validate(&strategies),
        Command::Risk {
            entry,
            atr,
            direction,
            multiplier,
            min_rr,
            json,
        } => {
            let config = RiskConfig {
                volatility_multiplier: multiplier,
                min_reward_risk: min_rr,
            };
            run_risk(entry, atr, &direction, &config, json)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ScannerError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Strategies from `path`, or from the main config when no file is given.
/// An empty set is an error.
pub fn load_strategy_set(
    config: &FileConfigAdapter,
    path: Option<&Path>,
) -> Result<Vec<Strategy>, ScannerError> {
    let strategies = match path {
        Some(p) => load_strategies(&load_config(p)?),
        None => load_strategies(config),
    };
    if strategies.is_empty() {
        return Err(ScannerError::NoStrategies);
    }
    Ok(strategies)
}

/// Apply command-line overrides to the configured scan settings.
pub fn apply_overrides(
    mut scan: ScanConfig,
    symbols: Option<&str>,
    mode: Option<ModeKind>,
) -> ScanConfig {
    if let Some(list) = symbols {
        scan.symbols = split_list(Some(list.to_string()));
    }
    if let Some(mode) = mode {
        scan.mode = mode;
    }
    scan
}

fn run_scan_command(
    config_path: &Path,
    strategies_path: Option<&Path>,
    symbols: Option<&str>,
    output: Option<&Path>,
    mode: Option<ModeKind>,
) -> Result<(), ScannerError> {
    let config = load_config(config_path)?;
    let scan = apply_overrides(load_scan_config(&config)?, symbols, mode);
    let strategies = load_strategy_set(&config, strategies_path)?;
    let data = CsvAdapter::new(data_dir(&config)?);

    let result = run_scan(&data, &strategies, &scan)?;

    let report_path = match output {
        Some(p) => p.display().to_string(),
        None => output_path(&config),
    };
    MarkdownReport.write(&result, &report_path)?;
    print_scan_summary(&result, &report_path);
    Ok(())
}

fn print_scan_summary(result: &ScanResult, report_path: &str) {
    println!(
        "Scanned {} symbols, {} signals",
        result.symbols.len(),
        result.signals.len()
    );
    for signal in &result.signals {
        let status = signal
            .risk
            .map(|r| r.risk_status.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} @ {:.2} [{}] win rate {:.0}%",
            signal.asset, signal.strategy, signal.entry_price, status, signal.win_rate
        );
    }
    println!("Report: {}", report_path);
}

#[derive(Debug, Clone, Copy)]
pub struct BacktestOptions {
    pub mode: ModeKind,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub atr_multiplier: f64,
    pub json: bool,
}

impl BacktestOptions {
    pub fn backtest_mode(&self, min_reward_risk: f64) -> BacktestMode {
        match self.mode {
            ModeKind::Legacy => BacktestMode::legacy(self.stop_loss, self.take_profit),
            ModeKind::Dynamic => BacktestMode::Dynamic {
                risk: RiskConfig {
                    volatility_multiplier: self.atr_multiplier,
                    min_reward_risk,
                },
                direction: Direction::Long,
                stop_loss_pct: self.stop_loss,
                take_profit_pct: self.take_profit,
            },
        }
    }
}

fn run_backtest(
    config_path: &Path,
    symbol: &str,
    condition: &str,
    options: &BacktestOptions,
) -> Result<(), ScannerError> {
    let expr = parse(condition).inspect_err(|e| {
        eprintln!("{}", e.display_with_context(condition));
    })?;

    let config = load_config(config_path)?;
    let scan = load_scan_config(&config)?;
    let data = CsvAdapter::new(data_dir(&config)?);
    let macros = load_macros(&data, &scan.macro_assets);
    let bars = prepare_bars(&data, symbol, &macros, &scan)?;

    let report = backtest_expr(&bars, &expr, &options.backtest_mode(scan.min_reward_risk));
    if let Some(Degradation::InvalidCondition(reason)) = &report.degradation {
        return Err(ScannerError::ConditionInvalid {
            reason: reason.clone(),
        });
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report.records)?);
    } else {
        print_backtest(symbol, &report);
    }
    Ok(())
}

fn print_backtest(symbol: &str, report: &BacktestReport) {
    if report.fell_back() {
        println!(
            "{}: {} mode requested, no ATR available, applied {}",
            symbol, report.requested, report.applied
        );
    }
    if let Some(reason) = &report.degradation {
        println!("{}: {}", symbol, reason);
        return;
    }

    println!("{:<20} {:<6} {:>8} {:>6}", "Signal Date", "Result", "P&L", "Bars");
    for record in &report.records {
        println!(
            "{:<20} {:<6} {:>7.2}% {:>6}",
            record.signal_date,
            record.result.as_str(),
            record.pnl_percent,
            record.duration_bars
        );
    }
    let summary = report.summary();
    println!(
        "W/L/Open: {}/{}/{} ({:.0}% win rate, {} mode)",
        summary.wins, summary.losses, summary.open, summary.win_rate, report.applied
    );
}

fn run_validate(strategies_path: &Path) -> Result<(), ScannerError> {
    let config = load_config(strategies_path)?;
    let strategies = load_strategies(&config);
    if strategies.is_empty() {
        warn!(path = %strategies_path.display(), "no valid strategies");
        return Err(ScannerError::NoStrategies);
    }

    for strategy in &strategies {
        println!("{} ({})", strategy.name, strategy.strategy_type);
        println!("  Raw:    {}", strategy.condition);
        println!("  Parsed: {}", strategy.expr);
        println!(
            "  SL {:.1}% / TP {:.1}% / ATR x{:.1} / volume x{:.1}",
            strategy.params.stop_loss_pct * 100.0,
            strategy.params.take_profit_pct * 100.0,
            strategy.params.atr_multiplier,
            strategy.params.volume_threshold
        );
    }
    println!("\n{} strategies valid.", strategies.len());
    Ok(())
}

fn run_risk(
    entry: f64,
    atr: f64,
    direction: &str,
    config: &RiskConfig,
    json: bool,
) -> Result<(), ScannerError> {
    let levels = compute_risk_levels_for(entry, atr, direction, config);
    if json {
        println!("{}", serde_json::to_string_pretty(&levels)?);
    } else {
        print_risk(&levels);
    }
    Ok(())
}

fn print_risk(levels: &RiskLevels) {
    println!("Entry:       {:.4}", levels.entry_price);
    println!("Stop loss:   {:.4}", levels.stop_loss);
    println!("Take profit: {:.4}", levels.take_profit);
    println!(
        "Stop:        {:.4} ({:.2}%)",
        levels.stop_distance,
        levels.stop_pct * 100.0
    );
    println!("R:R:         {:.2}:1", levels.rr_ratio);
    println!("Status:      {}", levels.status);
}
