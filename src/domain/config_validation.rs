//! Configuration validation.
//!
//! Validates the scanner config sections before a scan runs and builds a
//! [`ScanConfig`] from them.

use crate::domain::backtest::ModeKind;
use crate::domain::error::ScannerError;
use crate::domain::scan::{ScanConfig, DEFAULT_LOOKBACK_BARS};
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_OUTPUT_PATH: &str = "reports/scan.md";

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    data_dir(config)?;
    validate_lookback(config)?;
    validate_mode(config)?;
    validate_sentiment(config)?;
    validate_min_reward_risk(config)?;
    Ok(())
}

/// Validate and build the scan settings.
pub fn load_scan_config(config: &dyn ConfigPort) -> Result<ScanConfig, ScannerError> {
    validate_scan_config(config)?;
    let defaults = ScanConfig::default();

    let lookback_bars = config.get_int("data", "lookback_bars", DEFAULT_LOOKBACK_BARS as i64) as usize;
    if lookback_bars < defaults.indicators.ema_period {
        warn!(
            lookback_bars,
            required = defaults.indicators.ema_period,
            "lookback shorter than the EMA period, indicators will not be computed"
        );
    }

    Ok(ScanConfig {
        symbols: split_list(config.get_string("scan", "symbols")),
        lookback_bars,
        mode: mode(config)?,
        min_reward_risk: config.get_double("risk", "min_reward_risk", defaults.min_reward_risk),
        require_ok_risk: config.get_bool("risk", "require_ok_risk", defaults.require_ok_risk),
        macro_assets: split_list(config.get_string("macro", "assets")),
        sentiment_score: config.get_double("scan", "sentiment_score", defaults.sentiment_score),
        indicators: defaults.indicators,
    })
}

pub fn data_dir(config: &dyn ConfigPort) -> Result<PathBuf, ScannerError> {
    match config.get_string("data", "dir") {
        Some(s) if !s.trim().is_empty() => Ok(PathBuf::from(s.trim())),
        _ => Err(ScannerError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        }),
    }
}

pub fn output_path(config: &dyn ConfigPort) -> String {
    config
        .get_string("scan", "output_path")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string())
}

/// Comma-separated list; blank entries dropped.
pub fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn mode(config: &dyn ConfigPort) -> Result<ModeKind, ScannerError> {
    match config.get_string("scan", "mode") {
        None => Ok(ModeKind::Dynamic),
        Some(s) => s.parse().map_err(|reason| ScannerError::ConfigInvalid {
            section: "scan".to_string(),
            key: "mode".to_string(),
            reason,
        }),
    }
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    let value = config.get_int("data", "lookback_bars", DEFAULT_LOOKBACK_BARS as i64);
    if value < 1 {
        return Err(ScannerError::ConfigInvalid {
            section: "data".to_string(),
            key: "lookback_bars".to_string(),
            reason: "lookback_bars must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_mode(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    mode(config).map(|_| ())
}

fn validate_sentiment(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    let value = config.get_double("scan", "sentiment_score", 0.0);
    if !(-1.0..=1.0).contains(&value) {
        return Err(ScannerError::ConfigInvalid {
            section: "scan".to_string(),
            key: "sentiment_score".to_string(),
            reason: "sentiment_score must be between -1 and 1".to_string(),
        });
    }
    Ok(())
}

fn validate_min_reward_risk(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    let value = config.get_double("risk", "min_reward_risk", 2.0);
    if !(value > 0.0) {
        return Err(ScannerError::ConfigInvalid {
            section: "risk".to_string(),
            key: "min_reward_risk".to_string(),
            reason: "min_reward_risk must be positive".to_string(),
        });
    }
    Ok(())
}
