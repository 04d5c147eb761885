#![allow(dead_code)]

pub use barscan::domain::ohlcv::OhlcvBar;
use barscan::domain::error::BarscanError;
use barscan::ports::candle_port::CandlePort;
use std::collections::HashMap;
use std::io::Write;

pub const DAY: i64 = 86_400;

pub struct MockCandlePort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockCandlePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl CandlePort for MockCandlePort {
    fn load_recent(
        &self,
        symbol: &str,
        _timeframe: &str,
        limit: usize,
    ) -> Result<Vec<OhlcvBar>, BarscanError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BarscanError::Store {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).cloned().unwrap_or_default();
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }
}

pub fn make_bar(index: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        open_time: index as i64 * DAY,
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| make_bar(i, *c))
        .collect()
}

/// Steadily rising closes starting at `start_price`, one bar per day.
pub fn generate_bars(count: usize, start_price: f64) -> Vec<OhlcvBar> {
    (0..count)
        .map(|i| make_bar(i, start_price + i as f64))
        .collect()
}

/// Flat closes, then one jump on the final bar.
pub fn breakout_bars(count: usize, base: f64, last: f64) -> Vec<OhlcvBar> {
    let mut closes = vec![base; count];
    if let Some(tail) = closes.last_mut() {
        *tail = last;
    }
    bars_from_closes(&closes)
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_csv_bars(dir: &std::path::Path, symbol: &str, timeframe: &str, bars: &[OhlcvBar]) {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.open_time, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    std::fs::write(dir.join(format!("{symbol}_{timeframe}.csv")), out).unwrap();
}
