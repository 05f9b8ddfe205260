//! ADX (Average Directional Index), Wilder.
//!
//! +DM/-DM from consecutive highs and lows, TR/+DM/-DM smoothed with
//! S = S - S/n + x, DX = 100 * |+DI - -DI| / (+DI + -DI). ADX seeds with
//! the mean of the first n DX values and then follows Wilder smoothing.
//! The first (2n - 1) bars are warmup.

use crate::domain::bar::Bar;
use crate::domain::indicator::atr::true_ranges;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn calculate_adx(bars: &[Bar], period: usize) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values: bars
            .iter()
            .zip(adx_values(bars, period))
            .map(|(bar, v)| IndicatorPoint::simple(bar.timestamp, v))
            .collect(),
    }
}

fn adx_values(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let n = bars.len();
    let mut adx = vec![None; n];
    if period == 0 || n < 2 * period {
        return adx;
    }

    let tr = true_ranges(bars);
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let p = period as f64;
    let mut s_tr: f64 = tr[1..=period].iter().sum();
    let mut s_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut s_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx = vec![0.0; n];
    dx[period] = directional_index(s_tr, s_plus, s_minus);
    for i in period + 1..n {
        s_tr = s_tr - s_tr / p + tr[i];
        s_plus = s_plus - s_plus / p + plus_dm[i];
        s_minus = s_minus - s_minus / p + minus_dm[i];
        dx[i] = directional_index(s_tr, s_plus, s_minus);
    }

    let first = 2 * period - 1;
    let mut value = dx[period..=first].iter().sum::<f64>() / p;
    adx[first] = Some(value);
    for i in first + 1..n {
        value = (value * (p - 1.0) + dx[i]) / p;
        adx[i] = Some(value);
    }
    adx
}

fn directional_index(tr: f64, plus_dm: f64, minus_dm: f64) -> f64 {
    if tr == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * plus_dm / tr;
    let minus_di = 100.0 * minus_dm / tr;
    let sum = plus_di + minus_di;
    if sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / sum
    }
}
