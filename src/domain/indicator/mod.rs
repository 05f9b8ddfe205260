//! Technical indicators and bar enrichment.
//!
//! Each indicator module computes an [`IndicatorSeries`] aligned with the
//! input bars (one [`IndicatorPoint`] per bar, `valid == false` during
//! warmup). [`enrich`] runs the standard set and writes the valid points
//! into the bar indicator fields.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stoch_rsi;

pub use adx::calculate_adx;
pub use atr::calculate_atr;
pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_volume_sma;
pub use stoch_rsi::calculate_stoch_rsi;

use crate::domain::bar::{Bar, Column};
use chrono::NaiveDateTime;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    /// A single-valued point; `None` marks a warmup bar.
    pub fn simple(timestamp: NaiveDateTime, value: Option<f64>) -> Self {
        Self {
            timestamp,
            valid: value.is_some(),
            value: IndicatorValue::Simple(value.unwrap_or(0.0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    StochRsi {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

impl IndicatorValue {
    /// The part of this value that backs `column`.
    pub fn component(&self, column: &Column) -> Option<f64> {
        match (self, column) {
            (IndicatorValue::Simple(v), _) => Some(*v),
            (IndicatorValue::Macd { line, .. }, Column::Macd) => Some(*line),
            (IndicatorValue::Macd { signal, .. }, Column::MacdSignal) => Some(*signal),
            (IndicatorValue::Macd { histogram, .. }, Column::MacdHistogram) => Some(*histogram),
            (IndicatorValue::StochRsi { k, .. }, Column::StochRsiK) => Some(*k),
            (IndicatorValue::StochRsi { d, .. }, Column::StochRsiD) => Some(*d),
            (IndicatorValue::Bollinger { lower, .. }, Column::BbLower) => Some(*lower),
            (IndicatorValue::Bollinger { middle, .. }, Column::BbMid) => Some(*middle),
            (IndicatorValue::Bollinger { upper, .. }, Column::BbUpper) => Some(*upper),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    VolumeSma(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    StochRsi {
        rsi_period: usize,
        stoch_period: usize,
        k_smooth: usize,
        d_smooth: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::StochRsi {
                rsi_period,
                stoch_period,
                k_smooth,
                d_smooth,
            } => write!(
                f,
                "STOCH_RSI({},{},{},{})",
                rsi_period, stoch_period, k_smooth, d_smooth
            ),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// Periods for the standard indicator set.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub rsi_period: usize,
    pub ema_period: usize,
    pub atr_period: usize,
    pub bb_period: usize,
    pub bb_stddev_mult_x100: u32,
    pub adx_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub stoch_rsi_period: usize,
    pub stoch_period: usize,
    pub stoch_k_smooth: usize,
    pub stoch_d_smooth: usize,
    pub volume_sma_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ema_period: 200,
            atr_period: 14,
            bb_period: 20,
            bb_stddev_mult_x100: 200,
            adx_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            stoch_rsi_period: 14,
            stoch_period: 14,
            stoch_k_smooth: 3,
            stoch_d_smooth: 3,
            volume_sma_period: 20,
        }
    }
}

/// Compute the standard indicator set and store it on the bars.
///
/// Series shorter than the EMA period are left untouched (returns false).
/// A column that already has values anywhere in the input is kept as is.
pub fn enrich(bars: &mut [Bar], settings: &IndicatorSettings) -> bool {
    if bars.len() < settings.ema_period {
        warn!(
            bars = bars.len(),
            required = settings.ema_period,
            "not enough bars for indicators, skipping enrichment"
        );
        return false;
    }

    let series = calculate_rsi(bars, settings.rsi_period);
    fill(bars, &series, &[Column::Rsi]);

    let series = calculate_ema(bars, settings.ema_period);
    fill(bars, &series, &[Column::Ema200]);

    let series = calculate_atr(bars, settings.atr_period);
    fill(bars, &series, &[Column::Atr]);

    let series = calculate_bollinger(bars, settings.bb_period, settings.bb_stddev_mult_x100);
    fill(
        bars,
        &series,
        &[Column::BbLower, Column::BbMid, Column::BbUpper],
    );

    let series = calculate_adx(bars, settings.adx_period);
    fill(bars, &series, &[Column::Adx]);

    let series = calculate_macd(
        bars,
        settings.macd_fast,
        settings.macd_slow,
        settings.macd_signal,
    );
    fill(
        bars,
        &series,
        &[Column::Macd, Column::MacdSignal, Column::MacdHistogram],
    );

    let series = calculate_stoch_rsi(
        bars,
        settings.stoch_rsi_period,
        settings.stoch_period,
        settings.stoch_k_smooth,
        settings.stoch_d_smooth,
    );
    fill(bars, &series, &[Column::StochRsiK, Column::StochRsiD]);

    let series = calculate_volume_sma(bars, settings.volume_sma_period);
    fill(bars, &series, &[Column::VolumeSma]);

    debug!(bars = bars.len(), "indicators computed");
    true
}

fn fill(bars: &mut [Bar], series: &IndicatorSeries, columns: &[Column]) {
    for column in columns {
        if column.present_in(bars) {
            debug!(column = %column, "column supplied by input, not recomputed");
            continue;
        }
        for (bar, point) in bars.iter_mut().zip(&series.values) {
            if !point.valid {
                continue;
            }
            if let Some(v) = point.value.component(column) {
                bar.set(column, v);
            }
        }
    }
}
