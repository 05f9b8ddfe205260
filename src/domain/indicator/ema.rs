//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). The first (n-1) bars are warmup.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = bars
        .iter()
        .zip(ema_values(&closes, period))
        .map(|(bar, v)| IndicatorPoint::simple(bar.timestamp, v))
        .collect();
    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// SMA-seeded EMA over raw values; `None` during warmup.
pub fn ema_values(input: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; input.len()];
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    input
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i + 1 < period {
                sum += v;
                None
            } else if i + 1 == period {
                sum += v;
                ema = sum / period as f64;
                Some(ema)
            } else {
                ema = v * k + ema * (1.0 - k);
                Some(ema)
            }
        })
        .collect()
}
