//! On-Balance Volume.
//!
//! OBV[0] = 0; each later bar adds its volume on an up close, subtracts it on
//! a down close, and carries the previous value on an unchanged close.

use super::Series;
use crate::domain::ohlcv::OhlcvBar;

pub fn obv(bars: &[OhlcvBar]) -> Series {
    let mut out = Vec::with_capacity(bars.len());
    let mut running = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev = bars[i - 1].close;
            if bar.close > prev {
                running += bar.volume;
            } else if bar.close < prev {
                running -= bar.volume;
            }
        }
        out.push(Some(running));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64, volume: f64) -> OhlcvBar {
        OhlcvBar {
            open_time: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    #[test]
    fn obv_accumulates_by_direction() {
        let bars = vec![bar(10.0, 100.0), bar(11.0, 200.0), bar(10.5, 50.0), bar(10.5, 75.0)];
        assert_eq!(obv(&bars), vec![Some(0.0), Some(200.0), Some(150.0), Some(150.0)]);
    }

    #[test]
    fn obv_empty() {
        assert!(obv(&[]).is_empty());
    }
}
