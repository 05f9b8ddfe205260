//! Price bar representation and named columns.
//!
//! A [`Bar`] is one OHLCV observation plus the indicator values computed
//! for it. Indicator fields are `None` until enrichment (or when the
//! source data does not carry them). Extra numeric columns, such as merged
//! macro closes, live in [`Bar::extra`].

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Indicators {
    pub rsi: Option<f64>,
    pub ema_200: Option<f64>,
    pub atr: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_upper: Option<f64>,
    pub adx: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub stoch_rsi_k: Option<f64>,
    pub stoch_rsi_d: Option<f64>,
    pub volume_sma: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub indicators: Indicators,
    pub extra: BTreeMap<String, f64>,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            indicators: Indicators::default(),
            extra: BTreeMap::new(),
        }
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Stored value of a column on this bar.
    ///
    /// Derived cross columns have no stored value; they are resolved by the
    /// condition evaluator from this bar and its predecessor.
    pub fn value(&self, column: &Column) -> Option<f64> {
        let ind = &self.indicators;
        match column {
            Column::Open => Some(self.open),
            Column::High => Some(self.high),
            Column::Low => Some(self.low),
            Column::Close => Some(self.close),
            Column::Volume => Some(self.volume),
            Column::Rsi => ind.rsi,
            Column::Ema200 => ind.ema_200,
            Column::Atr => ind.atr,
            Column::BbLower => ind.bb_lower,
            Column::BbMid => ind.bb_mid,
            Column::BbUpper => ind.bb_upper,
            Column::Adx => ind.adx,
            Column::Macd => ind.macd,
            Column::MacdSignal => ind.macd_signal,
            Column::MacdHistogram => ind.macd_histogram,
            Column::StochRsiK => ind.stoch_rsi_k,
            Column::StochRsiD => ind.stoch_rsi_d,
            Column::VolumeSma => ind.volume_sma,
            Column::MacdBullishCross
            | Column::MacdBearishCross
            | Column::StochRsiBullish
            | Column::StochRsiBearish => None,
            Column::Extra(name) => self.extra.get(name).copied(),
        }
    }

    /// Store a value into the field backing `column`. Returns false for
    /// derived columns, which cannot be stored.
    pub fn set(&mut self, column: &Column, value: f64) -> bool {
        let ind = &mut self.indicators;
        match column {
            Column::Open => self.open = value,
            Column::High => self.high = value,
            Column::Low => self.low = value,
            Column::Close => self.close = value,
            Column::Volume => self.volume = value,
            Column::Rsi => ind.rsi = Some(value),
            Column::Ema200 => ind.ema_200 = Some(value),
            Column::Atr => ind.atr = Some(value),
            Column::BbLower => ind.bb_lower = Some(value),
            Column::BbMid => ind.bb_mid = Some(value),
            Column::BbUpper => ind.bb_upper = Some(value),
            Column::Adx => ind.adx = Some(value),
            Column::Macd => ind.macd = Some(value),
            Column::MacdSignal => ind.macd_signal = Some(value),
            Column::MacdHistogram => ind.macd_histogram = Some(value),
            Column::StochRsiK => ind.stoch_rsi_k = Some(value),
            Column::StochRsiD => ind.stoch_rsi_d = Some(value),
            Column::VolumeSma => ind.volume_sma = Some(value),
            Column::MacdBullishCross
            | Column::MacdBearishCross
            | Column::StochRsiBullish
            | Column::StochRsiBearish => return false,
            Column::Extra(name) => {
                self.extra.insert(name.clone(), value);
            }
        }
        true
    }
}

/// A named column of a bar series, as referenced by strategy conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Open,
    High,
    Low,
    Close,
    Volume,
    Rsi,
    Ema200,
    Atr,
    BbLower,
    BbMid,
    BbUpper,
    Adx,
    Macd,
    MacdSignal,
    MacdHistogram,
    StochRsiK,
    StochRsiD,
    VolumeSma,
    MacdBullishCross,
    MacdBearishCross,
    StochRsiBullish,
    StochRsiBearish,
    Extra(String),
}

impl Column {
    /// Every column the scanner knows how to produce.
    pub const KNOWN: [Column; 22] = [
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
        Column::Rsi,
        Column::Ema200,
        Column::Atr,
        Column::BbLower,
        Column::BbMid,
        Column::BbUpper,
        Column::Adx,
        Column::Macd,
        Column::MacdSignal,
        Column::MacdHistogram,
        Column::StochRsiK,
        Column::StochRsiD,
        Column::VolumeSma,
        Column::MacdBullishCross,
        Column::MacdBearishCross,
        Column::StochRsiBullish,
        Column::StochRsiBearish,
    ];

    pub fn from_name(name: &str) -> Column {
        match name {
            "open" => Column::Open,
            "high" => Column::High,
            "low" => Column::Low,
            "close" => Column::Close,
            "volume" => Column::Volume,
            "rsi" => Column::Rsi,
            "ema_200" => Column::Ema200,
            "atr" => Column::Atr,
            "bb_lower" => Column::BbLower,
            "bb_mid" => Column::BbMid,
            "bb_upper" => Column::BbUpper,
            "adx" => Column::Adx,
            "macd" => Column::Macd,
            "macd_signal" => Column::MacdSignal,
            "macd_histogram" => Column::MacdHistogram,
            "stoch_rsi_k" => Column::StochRsiK,
            "stoch_rsi_d" => Column::StochRsiD,
            "volume_sma" => Column::VolumeSma,
            "macd_bullish_cross" => Column::MacdBullishCross,
            "macd_bearish_cross" => Column::MacdBearishCross,
            "stoch_rsi_bullish" => Column::StochRsiBullish,
            "stoch_rsi_bearish" => Column::StochRsiBearish,
            other => Column::Extra(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
            Column::Rsi => "rsi",
            Column::Ema200 => "ema_200",
            Column::Atr => "atr",
            Column::BbLower => "bb_lower",
            Column::BbMid => "bb_mid",
            Column::BbUpper => "bb_upper",
            Column::Adx => "adx",
            Column::Macd => "macd",
            Column::MacdSignal => "macd_signal",
            Column::MacdHistogram => "macd_histogram",
            Column::StochRsiK => "stoch_rsi_k",
            Column::StochRsiD => "stoch_rsi_d",
            Column::VolumeSma => "volume_sma",
            Column::MacdBullishCross => "macd_bullish_cross",
            Column::MacdBearishCross => "macd_bearish_cross",
            Column::StochRsiBullish => "stoch_rsi_bullish",
            Column::StochRsiBearish => "stoch_rsi_bearish",
            Column::Extra(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Column::Extra(_))
    }

    /// The (fast, slow) line pair a derived cross column compares, with the
    /// cross direction (`true` = fast crosses above slow).
    pub fn cross_inputs(&self) -> Option<(Column, Column, bool)> {
        match self {
            Column::MacdBullishCross => Some((Column::Macd, Column::MacdSignal, true)),
            Column::MacdBearishCross => Some((Column::Macd, Column::MacdSignal, false)),
            Column::StochRsiBullish => Some((Column::StochRsiK, Column::StochRsiD, true)),
            Column::StochRsiBearish => Some((Column::StochRsiK, Column::StochRsiD, false)),
            _ => None,
        }
    }

    /// Whether any bar in the series carries this column.
    pub fn present_in(&self, bars: &[Bar]) -> bool {
        match self.cross_inputs() {
            Some((fast, slow, _)) => fast.present_in(bars) && slow.present_in(bars),
            None => bars.iter().any(|b| b.value(self).is_some()),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase snake_case column naming: `"BB Upper"` -> `"bb_upper"`.
pub fn standardize_column_name(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Bar::new(ts, 100.0, 110.0, 90.0, 105.0, 50_000.0)
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn timestamp_string_format() {
        assert_eq!(sample_bar().timestamp_string(), "2024-01-15 12:00:00");
    }

    #[test]
    fn column_names_round_trip() {
        for column in Column::KNOWN.iter() {
            assert_eq!(&Column::from_name(column.name()), column);
        }
        assert_eq!(
            Column::from_name("gold_close"),
            Column::Extra("gold_close".into())
        );
    }

    #[test]
    fn set_and_value() {
        let mut bar = sample_bar();
        assert_eq!(bar.value(&Column::Atr), None);
        assert!(bar.set(&Column::Atr, 2.5));
        assert_eq!(bar.value(&Column::Atr), Some(2.5));
        assert!(bar.set(&Column::Extra("dxy_close".into()), 104.0));
        assert_eq!(bar.value(&Column::Extra("dxy_close".into())), Some(104.0));
        assert!(!bar.set(&Column::MacdBullishCross, 1.0));
    }

    #[test]
    fn present_in_checks_whole_series() {
        let mut bars = vec![sample_bar(), sample_bar()];
        assert!(Column::Close.present_in(&bars));
        assert!(!Column::Atr.present_in(&bars));
        bars[1].indicators.atr = Some(1.0);
        assert!(Column::Atr.present_in(&bars));
        assert!(!Column::MacdBullishCross.present_in(&bars));
        bars[1].indicators.macd = Some(1.0);
        bars[1].indicators.macd_signal = Some(0.5);
        assert!(Column::MacdBullishCross.present_in(&bars));
    }

    #[test]
    fn standardize_names() {
        assert_eq!(standardize_column_name("Close"), "close");
        assert_eq!(standardize_column_name("EMA_200"), "ema_200");
        assert_eq!(standardize_column_name("BB Upper"), "bb_upper");
        assert_eq!(standardize_column_name("stoch-rsi-k"), "stoch_rsi_k");
    }
}
