#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use marketscan::domain::bar::Bar;
use marketscan::domain::error::ScannerError;
use marketscan::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub macros: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            macros: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_macro(mut self, asset: &str, bars: Vec<Bar>) -> Self {
        self.macros.insert(asset.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>, ScannerError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ScannerError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).cloned().unwrap_or_default();
        let skip = bars.len().saturating_sub(limit);
        Ok(bars.into_iter().skip(skip).collect())
    }

    fn fetch_macro(&self, asset: &str) -> Result<Vec<Bar>, ScannerError> {
        self.macros
            .get(asset)
            .cloned()
            .ok_or_else(|| ScannerError::NoData {
                symbol: asset.to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScannerError> {
        let mut symbols: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(hour: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar::new(start() + Duration::hours(hour), open, high, low, close, volume)
}

/// Hourly bars with a one-point range around each close.
pub fn series(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c, c + 1.0, c - 1.0, c, 1000.0))
        .collect()
}

/// A long oscillating hourly series, enough for the full indicator set.
pub fn wave_series(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let c = 100.0 + (i as f64 * 0.25).sin() * 6.0 + i as f64 * 0.02;
            make_bar(i as i64, c - 0.3, c + 1.2, c - 1.2, c, 1000.0 + (i % 5) as f64 * 50.0)
        })
        .collect()
}

pub fn write_bars_csv(path: &Path, bars: &[Bar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        writeln!(
            content,
            "{},{},{},{},{},{}",
            bar.timestamp_string(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        )
        .unwrap();
    }
    fs::write(path, content).unwrap();
}
