//! Momentum oscillators: RSI, ROC, MACD, Stochastic.

use super::average::{ema, ema_of_series, sma};
use super::Series;
use crate::domain::ohlcv::OhlcvBar;

/// Wilder RSI.
///
/// First average is the simple mean of the first n gains/losses, then
/// avg = (prev_avg * (n-1) + current) / n. RSI is 100 when avg_loss is 0.
/// Warmup: first n values are undefined.
pub fn rsi(closes: &[f64], period: usize) -> Series {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..period].iter().map(|c| gain(*c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| loss(*c)).sum::<f64>() / period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..closes.len() {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

/// Rate of change in percent: (C[i] - C[i-n]) / C[i-n] * 100.
pub fn roc(closes: &[f64], period: usize) -> Series {
    let mut out = vec![None; closes.len()];
    if period == 0 {
        return out;
    }
    for i in period..closes.len() {
        let base = closes[i - period];
        if base != 0.0 {
            out[i] = Some((closes[i] - base) / base * 100.0);
        }
    }
    out
}

pub struct MacdSeries {
    pub line: Series,
    pub signal: Series,
    pub histogram: Series,
}

/// Line = EMA(fast) - EMA(slow); signal = EMA(signal) of the line;
/// histogram = line - signal.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    let line: Series = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema_of_series(&line, signal_period);
    let histogram = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}

pub struct StochasticSeries {
    pub k: Series,
    pub d: Series,
}

/// %K = (C - LL(n)) / (HH(n) - LL(n)) * 100, %D = SMA(d) of %K.
/// %K is undefined when the range is flat.
pub fn stochastic(bars: &[OhlcvBar], k_period: usize, d_period: usize) -> StochasticSeries {
    let mut k = vec![None; bars.len()];
    if k_period > 0 {
        for i in (k_period - 1)..bars.len() {
            let window = &bars[i + 1 - k_period..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = highest - lowest;
            if range > 0.0 {
                k[i] = Some((bars[i].close - lowest) / range * 100.0);
            }
        }
    }

    let mut d = vec![None; bars.len()];
    if d_period > 0 {
        for i in 0..bars.len() {
            if i + 1 < d_period {
                continue;
            }
            let window = &k[i + 1 - d_period..=i];
            let defined: Option<Vec<f64>> = window.iter().copied().collect();
            if let Some(values) = defined {
                d[i] = sma(&values, d_period).last().copied().flatten();
            }
        }
    }

    StochasticSeries { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bar(high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            open_time: 0,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn rsi_warmup() {
        let out = rsi(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(&out[..3], &[None, None, None]);
        assert!(out[3].is_some());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let out = rsi(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_relative_eq!(out[4].unwrap(), 100.0);
    }

    #[test]
    fn rsi_mixed_moves() {
        // changes: +2, -1, +2 -> avg_gain 4/3, avg_loss 1/3 -> RS 4
        let out = rsi(&[10.0, 12.0, 11.0, 13.0], 3);
        assert_relative_eq!(out[3].unwrap(), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn rsi_insufficient_input() {
        assert!(rsi(&[1.0, 2.0], 3).iter().all(|v| v.is_none()));
    }

    #[test]
    fn roc_percent_change() {
        let out = roc(&[100.0, 105.0, 110.0], 2);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 10.0);
    }

    #[test]
    fn roc_zero_base_is_undefined() {
        let out = roc(&[0.0, 1.0], 1);
        assert_eq!(out[1], None);
    }

    #[test]
    fn macd_constant_prices_are_flat() {
        let closes = vec![50.0; 40];
        let out = macd(&closes, 12, 26, 9);
        assert_eq!(out.line[24], None);
        assert_relative_eq!(out.line[25].unwrap(), 0.0);
        assert_eq!(out.signal[32], None);
        assert_relative_eq!(out.signal[33].unwrap(), 0.0);
        assert_relative_eq!(out.histogram[39].unwrap(), 0.0);
    }

    #[test]
    fn macd_rising_prices_positive_line() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let out = macd(&closes, 3, 6, 3);
        assert!(out.line[39].unwrap() > 0.0);
    }

    #[test]
    fn stochastic_close_at_high_is_100() {
        let bars = vec![bar(10.0, 5.0, 6.0), bar(12.0, 6.0, 8.0), bar(14.0, 7.0, 14.0)];
        let out = stochastic(&bars, 3, 1);
        assert_relative_eq!(out.k[2].unwrap(), 100.0);
        assert_relative_eq!(out.d[2].unwrap(), 100.0);
    }

    #[test]
    fn stochastic_flat_range_undefined() {
        let bars = vec![bar(5.0, 5.0, 5.0); 4];
        let out = stochastic(&bars, 2, 2);
        assert!(out.k.iter().all(|v| v.is_none()));
        assert!(out.d.iter().all(|v| v.is_none()));
    }

    #[test]
    fn stochastic_d_averages_k() {
        let bars = vec![
            bar(10.0, 0.0, 5.0),
            bar(10.0, 0.0, 10.0),
            bar(10.0, 0.0, 0.0),
        ];
        let out = stochastic(&bars, 1, 2);
        // single-bar K: (close - low) / (high - low)
        assert_relative_eq!(out.k[0].unwrap(), 50.0);
        assert_relative_eq!(out.d[1].unwrap(), 75.0);
        assert_relative_eq!(out.d[2].unwrap(), 50.0);
    }
}
