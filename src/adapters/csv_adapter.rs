//! CSV file data adapter.
//!
//! Layout: `<base>/<SYMBOL>.csv` with `/` in the symbol written as `_`
//! (`BTC/USDT` → `BTC_USDT.csv`), macro assets under `<base>/macro/<name>.csv`.
//! Columns are matched by header name after normalisation; `open high low
//! close volume` and a timestamp column are required, indicator columns
//! are loaded when present and any other numeric column becomes an extra.

use crate::domain::bar::{standardize_column_name, Bar, Column};
use crate::domain::error::ScannerError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const TIMESTAMP_HEADERS: [&str; 4] = ["timestamp", "datetime", "date", "time"];
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const REQUIRED: [Column; 5] = [
    Column::Open,
    Column::High,
    Column::Low,
    Column::Close,
    Column::Volume,
];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn symbol_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.replace('/', "_")))
    }

    pub fn macro_path(&self, asset: &str) -> PathBuf {
        self.base_path.join("macro").join(format!("{}.csv", asset))
    }
}

/// Parse a timestamp cell: `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`,
/// `%Y-%m-%d`, or integer epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.naive_utc())
}

fn data_error(path: &Path, reason: impl std::fmt::Display) -> ScannerError {
    ScannerError::Data {
        reason: format!("{}: {}", path.display(), reason),
    }
}

/// Read a bar file. Rows come back sorted by timestamp.
pub fn read_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>, ScannerError> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ScannerError::NoData {
            symbol: symbol.to_string(),
        },
        _ => data_error(path, format!("failed to read: {}", e)),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| data_error(path, format!("CSV header error: {}", e)))?
        .iter()
        .map(standardize_column_name)
        .collect();

    let ts_idx = headers
        .iter()
        .position(|h| TIMESTAMP_HEADERS.contains(&h.as_str()))
        .ok_or_else(|| data_error(path, "missing timestamp column"))?;

    let mut required_idx = [0usize; 5];
    for (slot, column) in required_idx.iter_mut().zip(REQUIRED.iter()) {
        *slot = headers
            .iter()
            .position(|h| h == column.name())
            .ok_or_else(|| data_error(path, format!("missing {} column", column)))?;
    }

    let optional: Vec<(usize, Column)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_idx && !required_idx.contains(i))
        .map(|(i, h)| (i, Column::from_name(h)))
        .filter(|(_, c)| c.cross_inputs().is_none())
        .collect();

    let mut bars = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| data_error(path, format!("CSV parse error: {}", e)))?;
        let line = row + 2;

        let raw_ts = record.get(ts_idx).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            data_error(path, format!("line {}: invalid timestamp '{}'", line, raw_ts))
        })?;

        let mut ohlcv = [0.0f64; 5];
        for ((value, &idx), column) in ohlcv.iter_mut().zip(&required_idx).zip(REQUIRED.iter()) {
            let raw = record.get(idx).unwrap_or_default().trim();
            *value = raw.parse().map_err(|_| {
                data_error(path, format!("line {}: invalid {} value '{}'", line, column, raw))
            })?;
        }

        let [open, high, low, close, volume] = ohlcv;
        let mut bar = Bar::new(timestamp, open, high, low, close, volume);
        for (idx, column) in &optional {
            let Some(raw) = record.get(*idx).map(str::trim) else {
                continue;
            };
            if let Ok(v) = raw.parse::<f64>() {
                bar.set(column, v);
            }
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.timestamp);
    debug!(path = %path.display(), bars = bars.len(), "bars loaded");
    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>, ScannerError> {
        let mut bars = read_bars(&self.symbol_path(symbol), symbol)?;
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }
        Ok(bars)
    }

    fn fetch_macro(&self, asset: &str) -> Result<Vec<Bar>, ScannerError> {
        read_bars(&self.macro_path(asset), asset)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScannerError> {
        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| data_error(&self.base_path, format!("failed to read directory: {}", e)))?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(&self.base_path, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.replace('_', "/"));
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
