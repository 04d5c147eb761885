//! Moving averages over closing prices.
//!
//! - SMA: arithmetic mean of the last n values.
//! - EMA: k = 2/(n+1), seeded with the first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! - WMA: weights 1..=n, newest value weighted n.
//!
//! Warmup: first (n-1) values are undefined.

use super::Series;

pub fn sma(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

pub fn ema(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);

    for i in period..values.len() {
        ema = values[i] * k + ema * (1.0 - k);
        out[i] = Some(ema);
    }
    out
}

/// EMA over a series that is undefined for a leading stretch.
///
/// Values before the first defined point stay `None`; the EMA is seeded over
/// the first `period` defined values. A gap after the start ends the series.
pub fn ema_of_series(series: &[Option<f64>], period: usize) -> Series {
    let start = match series.iter().position(|v| v.is_some()) {
        Some(s) => s,
        None => return vec![None; series.len()],
    };

    let defined: Vec<f64> = series[start..].iter().map_while(|v| *v).collect();
    let mut out = vec![None; start];
    out.extend(ema(&defined, period));
    out.resize(series.len(), None);
    out
}

pub fn wma(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let n = period as f64;
    let denominator = n * (n + 1.0) / 2.0;
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| v * (j + 1) as f64)
            .sum();
        out[i] = Some(weighted / denominator);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sma_basic() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 2.0);
        assert_relative_eq!(out[3].unwrap(), 3.0);
        assert_relative_eq!(out[4].unwrap(), 4.0);
    }

    #[test]
    fn sma_period_longer_than_input() {
        assert!(sma(&[1.0, 2.0], 5).iter().all(|v| v.is_none()));
    }

    #[test]
    fn ema_seeds_with_sma() {
        let out = ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 4.0);
        // k = 0.5: 8*0.5 + 4*0.5
        assert_relative_eq!(out[3].unwrap(), 6.0);
    }

    #[test]
    fn ema_zero_period_is_undefined() {
        assert_eq!(ema(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn ema_of_series_skips_leading_gap() {
        let input = vec![None, None, Some(2.0), Some(4.0), Some(6.0), Some(8.0)];
        let out = ema_of_series(&input, 3);
        assert_eq!(out.len(), 6);
        assert_eq!(&out[..4], &[None, None, None, None]);
        assert_relative_eq!(out[4].unwrap(), 4.0);
        assert_relative_eq!(out[5].unwrap(), 6.0);
    }

    #[test]
    fn ema_of_series_all_undefined() {
        assert_eq!(ema_of_series(&[None, None], 2), vec![None, None]);
    }

    #[test]
    fn wma_weights_recent_values() {
        // (1*1 + 2*2 + 3*3) / 6
        let out = wma(&[1.0, 2.0, 3.0], 3);
        assert_relative_eq!(out[2].unwrap(), 14.0 / 6.0);
    }

    #[test]
    fn oversized_period_is_undefined() {
        let values: Vec<f64> = (1..=30).map(f64::from).collect();
        assert!(sma(&values, usize::MAX).iter().all(|v| v.is_none()));
        assert!(ema(&values, usize::MAX).iter().all(|v| v.is_none()));
        assert!(wma(&values, usize::MAX).iter().all(|v| v.is_none()));
    }
}
