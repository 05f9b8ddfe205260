//! Average True Range with Wilder's smoothing.
//!
//! TR[0] = high - low; afterwards the full true range against the previous
//! close. Seed: mean of the first n TRs; then ATR = (prev*(n-1) + TR) / n.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut atr_values = vec![None; bars.len()];

    if period > 0 && bars.len() >= period {
        let tr = true_ranges(bars);
        let p = period as f64;
        let mut atr = tr[..period].iter().sum::<f64>() / p;
        atr_values[period - 1] = Some(atr);
        for i in period..bars.len() {
            atr = (atr * (p - 1.0) + tr[i]) / p;
            atr_values[i] = Some(atr);
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values: bars
            .iter()
            .zip(atr_values)
            .map(|(bar, v)| IndicatorPoint::simple(bar.timestamp, v))
            .collect(),
    }
}
