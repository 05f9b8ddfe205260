//! Stochastic RSI.
//!
//! raw = (RSI - min(RSI, n)) / (max(RSI, n) - min(RSI, n)) * 100, then
//! %K = SMA(raw, k_smooth) and %D = SMA(%K, d_smooth). A flat RSI window
//! gives raw 0. A point is valid once %D is defined.

use crate::domain::bar::Bar;
use crate::domain::indicator::rsi::rsi_values;
use crate::domain::indicator::sma::rolling_mean;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_stoch_rsi(
    bars: &[Bar],
    rsi_period: usize,
    stoch_period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let rsi = rsi_values(&closes, rsi_period);

    let raw: Vec<Option<f64>> = (0..rsi.len())
        .map(|i| {
            if stoch_period == 0 || i + 1 < stoch_period {
                return None;
            }
            let current = rsi[i]?;
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for v in &rsi[i + 1 - stoch_period..=i] {
                let v = (*v)?;
                lo = lo.min(v);
                hi = hi.max(v);
            }
            Some(if hi > lo {
                (current - lo) / (hi - lo) * 100.0
            } else {
                0.0
            })
        })
        .collect();

    let k = rolling_mean(&raw, k_smooth);
    let d = rolling_mean(&k, d_smooth);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let (valid, k, d) = match (k[i], d[i]) {
                (Some(k), Some(d)) => (true, k, d),
                _ => (false, 0.0, 0.0),
            };
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid,
                value: IndicatorValue::StochRsi { k, d },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::StochRsi {
            rsi_period,
            stoch_period,
            k_smooth,
            d_smooth,
        },
        values,
    }
}
