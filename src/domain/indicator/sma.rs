//! Simple moving averages.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

/// Mean over a trailing window; `None` until `period` values are available
/// or when any value in the window is missing.
pub fn rolling_mean(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    (0..input.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &input[i + 1 - period..=i];
            let mut sum = 0.0;
            for v in window {
                sum += (*v)?;
            }
            Some(sum / period as f64)
        })
        .collect()
}

pub fn calculate_volume_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let volumes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.volume)).collect();
    let values = bars
        .iter()
        .zip(rolling_mean(&volumes, period))
        .map(|(bar, v)| IndicatorPoint::simple(bar.timestamp, v))
        .collect();
    IndicatorSeries {
        indicator_type: IndicatorType::VolumeSma(period),
        values,
    }
}
