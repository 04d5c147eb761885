//! Volatility measures: ATR, standard deviation, Bollinger Bands.
//!
//! Standard deviation is the population form (divides by n, not n-1).

use super::Series;
use crate::domain::ohlcv::OhlcvBar;

/// Wilder ATR. The first bar's true range is high - low; the seed is the
/// mean of the first n true ranges, then ATR = (prev * (n-1) + TR) / n.
pub fn atr(bars: &[OhlcvBar], period: usize) -> Series {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let tr: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut atr = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(atr);
    for i in period..bars.len() {
        atr = (atr * (period - 1) as f64 + tr[i]) / period as f64;
        out[i] = Some(atr);
    }
    out
}

fn window_stats(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

pub fn stddev(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..values.len() {
        out[i] = Some(window_stats(&values[i + 1 - period..=i]).1);
    }
    out
}

pub struct BollingerSeries {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
    pub bandwidth: Series,
}

/// Middle = SMA(n); upper/lower = middle ± mult × stddev(n);
/// bandwidth = (upper - lower) / middle.
pub fn bollinger(values: &[f64], period: usize, mult: f64) -> BollingerSeries {
    let len = values.len();
    let mut bands = BollingerSeries {
        upper: vec![None; len],
        middle: vec![None; len],
        lower: vec![None; len],
        bandwidth: vec![None; len],
    };
    if period == 0 {
        return bands;
    }

    for i in (period - 1)..len {
        let (mean, sd) = window_stats(&values[i + 1 - period..=i]);
        let upper = mean + mult * sd;
        let lower = mean - mult * sd;
        bands.upper[i] = Some(upper);
        bands.middle[i] = Some(mean);
        bands.lower[i] = Some(lower);
        if mean != 0.0 {
            bands.bandwidth[i] = Some((upper - lower) / mean);
        }
    }
    bands
}
