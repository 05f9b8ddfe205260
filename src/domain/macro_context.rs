//! Macro asset context merged onto a bar series.
//!
//! Each bar receives `<name>_close`: the close of the latest macro bar at
//! or before the bar's timestamp. Both series must be sorted by timestamp.

use crate::domain::bar::{standardize_column_name, Bar, Column};
use tracing::{debug, warn};

pub fn macro_column(name: &str) -> Column {
    Column::Extra(format!("{}_close", standardize_column_name(name)))
}

/// Backward as-of join of macro closes. NaN closes do not replace the last
/// good value. Bars before the first macro observation get nothing.
/// Returns false when there was nothing to merge.
pub fn merge_macro_closes(bars: &mut [Bar], name: &str, macro_bars: &[Bar]) -> bool {
    if macro_bars.is_empty() {
        warn!(asset = name, "no macro data, skipping merge");
        return false;
    }
    let column = macro_column(name);

    let mut cursor = 0;
    let mut last_close: Option<f64> = None;
    let mut merged = 0usize;
    for bar in bars.iter_mut() {
        while cursor < macro_bars.len() && macro_bars[cursor].timestamp <= bar.timestamp {
            let close = macro_bars[cursor].close;
            if !close.is_nan() {
                last_close = Some(close);
            }
            cursor += 1;
        }
        if let Some(close) = last_close {
            bar.set(&column, close);
            merged += 1;
        }
    }

    debug!(asset = name, column = %column, merged, "macro closes merged");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn bar_at(t: NaiveDateTime, close: f64) -> Bar {
        Bar::new(t, close, close, close, close, 1.0)
    }

    #[test]
    fn daily_macro_onto_intraday_bars() {
        let mut bars = vec![
            bar_at(ts(1, 12), 1.0),
            bar_at(ts(2, 0), 1.0),
            bar_at(ts(2, 12), 1.0),
            bar_at(ts(4, 6), 1.0),
        ];
        let gold = vec![
            bar_at(ts(2, 0), 2000.0),
            bar_at(ts(3, 0), 2010.0),
            bar_at(ts(4, 0), f64::NAN),
        ];
        assert!(merge_macro_closes(&mut bars, "Gold", &gold));
        let col = macro_column("Gold");
        assert_eq!(col, Column::Extra("gold_close".into()));
        assert_eq!(bars[0].value(&col), None);
        assert_eq!(bars[1].value(&col), Some(2000.0));
        assert_eq!(bars[2].value(&col), Some(2000.0));
        assert_eq!(bars[3].value(&col), Some(2010.0));
    }

    #[test]
    fn empty_macro_series_is_skipped() {
        let mut bars = vec![bar_at(ts(1, 0), 1.0)];
        assert!(!merge_macro_closes(&mut bars, "dxy", &[]));
        assert!(bars[0].extra.is_empty());
    }

    #[test]
    fn multi_word_names_are_normalized() {
        assert_eq!(
            macro_column("US Dollar"),
            Column::Extra("us_dollar_close".into())
        );
    }
}
