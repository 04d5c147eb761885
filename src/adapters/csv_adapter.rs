//! CSV directory candle store.
//!
//! One file per key: `<dir>/<SYMBOL>_<timeframe>.csv` with the header
//! `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339 or integer
//! epoch seconds. Files are expected to hold closed bars only.

use crate::domain::error::BarscanError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::candle_port::CandlePort;
use chrono::DateTime;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvCandleStore {
    base_path: PathBuf,
}

impl CsvCandleStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Keys must stay inside `base_path`.
    fn csv_path(&self, symbol: &str, timeframe: &str) -> Result<PathBuf, BarscanError> {
        for (what, key) in [("symbol", symbol), ("timeframe", timeframe)] {
            if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
                return Err(BarscanError::Store {
                    reason: format!("invalid {what} {key:?} for CSV store"),
                });
            }
        }
        Ok(self.base_path.join(format!("{}_{}.csv", symbol, timeframe)))
    }
}

fn parse_timestamp(raw: &str) -> Result<i64, BarscanError> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp())
        .map_err(|e| BarscanError::Store {
            reason: format!("invalid timestamp {raw:?}: {e}"),
        })
}

fn column(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, BarscanError> {
    record
        .get(index)
        .ok_or_else(|| BarscanError::Store {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| BarscanError::Store {
            reason: format!("invalid {name} value: {e}"),
        })
}

impl CandlePort for CsvCandleStore {
    fn load_recent(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<OhlcvBar>, BarscanError> {
        let path = self.csv_path(symbol, timeframe)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(BarscanError::Store {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| BarscanError::Store {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let timestamp = record.get(0).ok_or_else(|| BarscanError::Store {
                reason: "missing timestamp column".into(),
            })?;

            bars.push(OhlcvBar {
                open_time: parse_timestamp(timestamp)?,
                open: column(&record, 1, "open")?,
                high: column(&record, 2, "high")?,
                low: column(&record, 3, "low")?,
                close: column(&record, 4, "close")?,
                volume: column(&record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.open_time);
        let start = bars.len().saturating_sub(limit);
        Ok(bars.split_off(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) {
        let mut file = fs::File::create(dir.path().join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn reads_and_sorts_bars() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "AAPL_1d.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-01-03T00:00:00Z,3,4,2,3.5,300\n\
             2024-01-01T00:00:00Z,1,2,0.5,1.5,100\n\
             2024-01-02T00:00:00Z,2,3,1,2.5,200\n",
        );
        let store = CsvCandleStore::new(dir.path().to_path_buf());
        let bars = store.load_recent("AAPL", "1d", 10).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].close, 1.5);
        assert_eq!(bars[2].close, 3.5);
        assert!(bars[0].open_time < bars[1].open_time);
    }

    #[test]
    fn limit_keeps_most_recent() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "AAPL_1h.csv",
            "timestamp,open,high,low,close,volume\n\
             0,1,1,1,1,1\n\
             3600,2,2,2,2,1\n\
             7200,3,3,3,3,1\n",
        );
        let store = CsvCandleStore::new(dir.path().to_path_buf());
        let bars = store.load_recent("AAPL", "1h", 2).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open_time, 3600);
        assert_eq!(bars[1].open_time, 7200);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CsvCandleStore::new(dir.path().to_path_buf());
        assert!(store.load_recent("NOPE", "1d", 10).unwrap().is_empty());
    }

    #[test]
    fn rejects_keys_outside_directory() {
        let root = TempDir::new().unwrap();
        let inner = root.path().join("bars");
        fs::create_dir(&inner).unwrap();
        fs::write(
            root.path().join("x_1d.csv"),
            "timestamp,open,high,low,close,volume\n0,1,1,1,1,1\n",
        )
        .unwrap();
        let store = CsvCandleStore::new(inner);

        for (symbol, timeframe) in [("../x", "1d"), ("a/b", "1d"), ("a\\b", "1d"), ("", "1d"), ("x", "../1d")] {
            assert!(
                matches!(
                    store.load_recent(symbol, timeframe, 10),
                    Err(BarscanError::Store { .. })
                ),
                "{symbol:?} {timeframe:?}"
            );
        }
    }

    #[test]
    fn malformed_value_is_store_error() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "BAD_1d.csv",
            "timestamp,open,high,low,close,volume\n0,1,1,1,abc,1\n",
        );
        let store = CsvCandleStore::new(dir.path().to_path_buf());
        let err = store.load_recent("BAD", "1d", 10).unwrap_err();
        assert!(err.to_string().contains("invalid close value"));
    }

    #[test]
    fn malformed_timestamp_is_store_error() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "BAD_1d.csv",
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        );
        let store = CsvCandleStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load_recent("BAD", "1d", 10),
            Err(BarscanError::Store { .. })
        ));
    }
}
