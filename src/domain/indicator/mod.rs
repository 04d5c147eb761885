//! Built-in indicator set.
//!
//! Indicators are a closed enum resolved once from `(name, params)`.
//! Every calculation returns a [`Series`] aligned 1:1 with the input bars,
//! `None` where the value is undefined (warm-up, zero division, ...).

pub mod average;
pub mod oscillator;
pub mod volatility;
pub mod volume;

use crate::domain::condition::Params;
use crate::domain::error::BarscanError;
use crate::domain::ohlcv::OhlcvBar;
use serde_json::Value;
use std::fmt;

pub type Series = Vec<Option<f64>>;

/// Largest accepted lookback for any period parameter.
pub const MAX_PERIOD: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorKind {
    Price,
    Volume,
    Sma(usize),
    Ema(usize),
    Wma(usize),
    Rsi(usize),
    Roc(usize),
    Atr(usize),
    Stddev(usize),
    Obv,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        std_dev: f64,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
}

/// Static description of one indicator, for listing and docs.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub params: &'static [(&'static str, f64)],
    pub fields: &'static [&'static str],
}

pub const CATALOG: &[IndicatorInfo] = &[
    IndicatorInfo {
        name: "price",
        aliases: &["close"],
        params: &[],
        fields: PRICE_FIELDS,
    },
    IndicatorInfo {
        name: "volume",
        aliases: &[],
        params: &[],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "sma",
        aliases: &[],
        params: &[("period", 20.0)],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "ema",
        aliases: &[],
        params: &[("period", 20.0)],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "wma",
        aliases: &[],
        params: &[("period", 20.0)],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "rsi",
        aliases: &[],
        params: &[("period", 14.0)],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "roc",
        aliases: &[],
        params: &[("period", 10.0)],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "atr",
        aliases: &[],
        params: &[("period", 14.0)],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "stddev",
        aliases: &[],
        params: &[("period", 20.0)],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "obv",
        aliases: &[],
        params: &[],
        fields: VALUE_FIELD,
    },
    IndicatorInfo {
        name: "macd",
        aliases: &[],
        params: &[("fast", 12.0), ("slow", 26.0), ("signal", 9.0)],
        fields: MACD_FIELDS,
    },
    IndicatorInfo {
        name: "bollinger",
        aliases: &["bbands"],
        params: &[("period", 20.0), ("std_dev", 2.0)],
        fields: BOLLINGER_FIELDS,
    },
    IndicatorInfo {
        name: "stochastic",
        aliases: &["stoch"],
        params: &[("k_period", 14.0), ("d_period", 3.0)],
        fields: STOCHASTIC_FIELDS,
    },
];

const VALUE_FIELD: &[&str] = &["value"];
const PRICE_FIELDS: &[&str] = &["value", "open", "high", "low", "close", "volume"];
const MACD_FIELDS: &[&str] = &["macd", "signal", "histogram", "value"];
const BOLLINGER_FIELDS: &[&str] = &["upper", "middle", "lower", "bandwidth", "value"];
const STOCHASTIC_FIELDS: &[&str] = &["k", "d", "value"];

impl IndicatorKind {
    pub fn resolve(name: &str, params: &Params) -> Result<Self, BarscanError> {
        let lowered = name.trim().to_ascii_lowercase();
        let kind = match lowered.as_str() {
            "price" | "close" => IndicatorKind::Price,
            "volume" => IndicatorKind::Volume,
            "sma" => IndicatorKind::Sma(period(name, params, "period", 20)?),
            "ema" => IndicatorKind::Ema(period(name, params, "period", 20)?),
            "wma" => IndicatorKind::Wma(period(name, params, "period", 20)?),
            "rsi" => IndicatorKind::Rsi(period(name, params, "period", 14)?),
            "roc" => IndicatorKind::Roc(period(name, params, "period", 10)?),
            "atr" => IndicatorKind::Atr(period(name, params, "period", 14)?),
            "stddev" => IndicatorKind::Stddev(period(name, params, "period", 20)?),
            "obv" => IndicatorKind::Obv,
            "macd" => {
                let fast = period(name, params, "fast", 12)?;
                let slow = period(name, params, "slow", 26)?;
                let signal = period(name, params, "signal", 9)?;
                if fast >= slow {
                    return Err(BarscanError::indicator(
                        name,
                        format!("fast period ({fast}) must be less than slow period ({slow})"),
                    ));
                }
                IndicatorKind::Macd { fast, slow, signal }
            }
            "bollinger" | "bbands" => IndicatorKind::Bollinger {
                period: period(name, params, "period", 20)?,
                std_dev: multiplier(name, params, "std_dev", 2.0)?,
            },
            "stochastic" | "stoch" => IndicatorKind::Stochastic {
                k_period: period(name, params, "k_period", 14)?,
                d_period: period(name, params, "d_period", 3)?,
            },
            _ => return Err(BarscanError::indicator(name, "unknown indicator")),
        };
        Ok(kind)
    }

    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Price => PRICE_FIELDS,
            IndicatorKind::Macd { .. } => MACD_FIELDS,
            IndicatorKind::Bollinger { .. } => BOLLINGER_FIELDS,
            IndicatorKind::Stochastic { .. } => STOCHASTIC_FIELDS,
            _ => VALUE_FIELD,
        }
    }

    pub fn supports_field(&self, field: &str) -> bool {
        let field = field.trim().to_ascii_lowercase();
        self.fields().iter().any(|f| *f == field)
    }

    /// Bars needed before the first defined value.
    pub fn warmup(&self) -> usize {
        match self {
            IndicatorKind::Price | IndicatorKind::Volume | IndicatorKind::Obv => 1,
            IndicatorKind::Sma(p)
            | IndicatorKind::Ema(p)
            | IndicatorKind::Wma(p)
            | IndicatorKind::Atr(p)
            | IndicatorKind::Stddev(p) => *p,
            IndicatorKind::Rsi(p) | IndicatorKind::Roc(p) => p.saturating_add(1),
            IndicatorKind::Macd { slow, signal, .. } => slow.saturating_add(*signal) - 1,
            IndicatorKind::Bollinger { period, .. } => *period,
            IndicatorKind::Stochastic { k_period, d_period } => {
                k_period.saturating_add(*d_period) - 1
            }
        }
    }

    /// Compute the named output field over `bars`.
    pub fn compute(&self, bars: &[OhlcvBar], field: &str) -> Result<Series, BarscanError> {
        let field = field.trim().to_ascii_lowercase();
        if !self.supports_field(&field) {
            return Err(BarscanError::indicator(
                &self.to_string(),
                format!(
                    "unknown field \"{field}\" (expected one of: {})",
                    self.fields().join(", ")
                ),
            ));
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let series = match self {
            IndicatorKind::Price => {
                let pick: fn(&OhlcvBar) -> f64 = match field.as_str() {
                    "open" => |b| b.open,
                    "high" => |b| b.high,
                    "low" => |b| b.low,
                    "volume" => |b| b.volume,
                    _ => |b| b.close,
                };
                bars.iter().map(|b| Some(pick(b))).collect()
            }
            IndicatorKind::Volume => bars.iter().map(|b| Some(b.volume)).collect(),
            IndicatorKind::Sma(p) => average::sma(&closes, *p),
            IndicatorKind::Ema(p) => average::ema(&closes, *p),
            IndicatorKind::Wma(p) => average::wma(&closes, *p),
            IndicatorKind::Rsi(p) => oscillator::rsi(&closes, *p),
            IndicatorKind::Roc(p) => oscillator::roc(&closes, *p),
            IndicatorKind::Atr(p) => volatility::atr(bars, *p),
            IndicatorKind::Stddev(p) => volatility::stddev(&closes, *p),
            IndicatorKind::Obv => volume::obv(bars),
            IndicatorKind::Macd { fast, slow, signal } => {
                let macd = oscillator::macd(&closes, *fast, *slow, *signal);
                match field.as_str() {
                    "signal" => macd.signal,
                    "histogram" => macd.histogram,
                    _ => macd.line,
                }
            }
            IndicatorKind::Bollinger { period, std_dev } => {
                let bands = volatility::bollinger(&closes, *period, *std_dev);
                match field.as_str() {
                    "upper" => bands.upper,
                    "lower" => bands.lower,
                    "bandwidth" => bands.bandwidth,
                    _ => bands.middle,
                }
            }
            IndicatorKind::Stochastic { k_period, d_period } => {
                let stoch = oscillator::stochastic(bars, *k_period, *d_period);
                match field.as_str() {
                    "d" => stoch.d,
                    _ => stoch.k,
                }
            }
        };

        Ok(series
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect())
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Price => write!(f, "PRICE"),
            IndicatorKind::Volume => write!(f, "VOLUME"),
            IndicatorKind::Sma(period) => write!(f, "SMA({})", period),
            IndicatorKind::Ema(period) => write!(f, "EMA({})", period),
            IndicatorKind::Wma(period) => write!(f, "WMA({})", period),
            IndicatorKind::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorKind::Roc(period) => write!(f, "ROC({})", period),
            IndicatorKind::Atr(period) => write!(f, "ATR({})", period),
            IndicatorKind::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorKind::Obv => write!(f, "OBV"),
            IndicatorKind::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorKind::Bollinger { period, std_dev } => {
                write!(f, "BOLLINGER({},{})", period, std_dev)
            }
            IndicatorKind::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
        }
    }
}

fn period(indicator: &str, params: &Params, key: &str, default: usize) -> Result<usize, BarscanError> {
    let invalid = |raw: &Value| {
        BarscanError::indicator(
            indicator,
            format!("parameter \"{key}\" must be a positive integer, got {raw}"),
        )
    };

    let raw = match params.get(key) {
        None | Some(Value::Null) => return Ok(default),
        Some(raw) => raw,
    };

    let parsed = match raw {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f > 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match parsed {
        Some(p) if p > MAX_PERIOD as u64 => Err(BarscanError::indicator(
            indicator,
            format!("parameter \"{key}\" must be at most {MAX_PERIOD}, got {raw}"),
        )),
        Some(p) if p > 0 => usize::try_from(p).map_err(|_| invalid(raw)),
        _ => Err(invalid(raw)),
    }
}

fn multiplier(indicator: &str, params: &Params, key: &str, default: f64) -> Result<f64, BarscanError> {
    let raw = match params.get(key) {
        None | Some(Value::Null) => return Ok(default),
        Some(raw) => raw,
    };

    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(m) if m.is_finite() && m > 0.0 => Ok(m),
        _ => Err(BarscanError::indicator(
            indicator,
            format!("parameter \"{key}\" must be a positive number, got {raw}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    fn bars(closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| OhlcvBar {
                open_time: i as i64 * 60,
                open: *c,
                high: c + 1.0,
                low: c - 1.0,
                close: *c,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn resolve_defaults() {
        let empty = Params::new();
        assert_eq!(IndicatorKind::resolve("SMA", &empty).unwrap(), IndicatorKind::Sma(20));
        assert_eq!(IndicatorKind::resolve("rsi", &empty).unwrap(), IndicatorKind::Rsi(14));
        assert_eq!(
            IndicatorKind::resolve("macd", &empty).unwrap(),
            IndicatorKind::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
        );
        assert_eq!(IndicatorKind::resolve("close", &empty).unwrap(), IndicatorKind::Price);
    }

    #[test]
    fn resolve_reads_numeric_and_string_params() {
        let p = params(json!({"period": 5}));
        assert_eq!(IndicatorKind::resolve("ema", &p).unwrap(), IndicatorKind::Ema(5));
        let p = params(json!({"period": "7"}));
        assert_eq!(IndicatorKind::resolve("ema", &p).unwrap(), IndicatorKind::Ema(7));
        let p = params(json!({"period": 9.0}));
        assert_eq!(IndicatorKind::resolve("ema", &p).unwrap(), IndicatorKind::Ema(9));
    }

    #[test]
    fn resolve_rejects_bad_params() {
        for bad in [json!({"period": 0}), json!({"period": -3}), json!({"period": 2.5}), json!({"period": "x"})] {
            let p = params(bad);
            assert!(matches!(
                IndicatorKind::resolve("sma", &p),
                Err(BarscanError::IndicatorInvalid { .. })
            ));
        }
    }

    #[test]
    fn resolve_rejects_oversized_periods() {
        let cases = [
            ("sma", "period"),
            ("ema", "period"),
            ("wma", "period"),
            ("rsi", "period"),
            ("roc", "period"),
            ("atr", "period"),
            ("stddev", "period"),
            ("bollinger", "period"),
            ("macd", "signal"),
            ("stochastic", "k_period"),
            ("stochastic", "d_period"),
        ];
        for (name, key) in cases {
            for huge in [json!(5_000_000_000u64), json!(1e30), json!("18446744073709551615")] {
                let mut p = Params::new();
                p.insert(key.to_string(), huge.clone());
                let err = IndicatorKind::resolve(name, &p).unwrap_err();
                assert!(err.to_string().contains("at most"), "{name} {key} {huge}: {err}");
            }
        }
        let p = params(json!({"period": MAX_PERIOD}));
        assert_eq!(IndicatorKind::resolve("wma", &p).unwrap(), IndicatorKind::Wma(MAX_PERIOD));
    }

    #[test]
    fn unbounded_periods_compute_without_panicking() {
        let b = bars(&(1..=30).map(f64::from).collect::<Vec<_>>());
        let kinds = [
            IndicatorKind::Sma(usize::MAX),
            IndicatorKind::Ema(usize::MAX),
            IndicatorKind::Wma(usize::MAX),
            IndicatorKind::Rsi(usize::MAX),
            IndicatorKind::Roc(usize::MAX),
            IndicatorKind::Atr(usize::MAX),
            IndicatorKind::Stddev(usize::MAX),
            IndicatorKind::Bollinger {
                period: usize::MAX,
                std_dev: 2.0,
            },
            IndicatorKind::Stochastic {
                k_period: usize::MAX,
                d_period: usize::MAX,
            },
            IndicatorKind::Macd {
                fast: usize::MAX - 1,
                slow: usize::MAX,
                signal: usize::MAX,
            },
        ];
        for kind in kinds {
            for field in kind.fields() {
                let series = kind.compute(&b, field).unwrap();
                assert!(series.iter().all(|v| v.is_none()), "{kind:?} {field}");
            }
        }
    }

    #[test]
    fn resolve_rejects_inverted_macd() {
        let p = params(json!({"fast": 26, "slow": 12}));
        assert!(IndicatorKind::resolve("macd", &p).is_err());
    }

    #[test]
    fn resolve_rejects_unknown_name() {
        let err = IndicatorKind::resolve("ichimoku", &Params::new()).unwrap_err();
        assert_eq!(err.to_string(), "invalid indicator ichimoku: unknown indicator");
    }

    #[test]
    fn catalog_covers_every_name() {
        for info in CATALOG {
            let kind = IndicatorKind::resolve(info.name, &Params::new()).unwrap();
            assert_eq!(kind.fields(), info.fields);
            for alias in info.aliases {
                assert_eq!(IndicatorKind::resolve(alias, &Params::new()).unwrap(), kind);
            }
        }
    }

    #[test]
    fn compute_price_fields() {
        let b = bars(&[10.0, 11.0]);
        let kind = IndicatorKind::Price;
        assert_eq!(kind.compute(&b, "value").unwrap(), vec![Some(10.0), Some(11.0)]);
        assert_eq!(kind.compute(&b, "HIGH").unwrap(), vec![Some(11.0), Some(12.0)]);
        assert_eq!(kind.compute(&b, "volume").unwrap(), vec![Some(100.0), Some(100.0)]);
    }

    #[test]
    fn compute_rejects_unknown_field() {
        let b = bars(&[10.0, 11.0]);
        assert!(IndicatorKind::Sma(2).compute(&b, "upper").is_err());
    }

    #[test]
    fn compute_is_aligned_with_bars() {
        let b = bars(&(1..=40).map(f64::from).collect::<Vec<_>>());
        for info in CATALOG {
            let kind = IndicatorKind::resolve(info.name, &Params::new()).unwrap();
            for field in info.fields {
                assert_eq!(kind.compute(&b, field).unwrap().len(), b.len(), "{kind} {field}");
            }
        }
    }

    #[test]
    fn macd_value_aliases_line() {
        let b = bars(&(1..=60).map(|i| (i as f64).sin() * 5.0 + 50.0).collect::<Vec<_>>());
        let kind = IndicatorKind::Macd {
            fast: 3,
            slow: 6,
            signal: 4,
        };
        assert_eq!(kind.compute(&b, "value").unwrap(), kind.compute(&b, "macd").unwrap());
    }

    #[test]
    fn warmup_matches_first_fully_defined_bar() {
        let b = bars(&(1..=80).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect::<Vec<_>>());
        for info in CATALOG {
            let kind = IndicatorKind::resolve(info.name, &Params::new()).unwrap();
            let first = info
                .fields
                .iter()
                .map(|field| {
                    let series = kind.compute(&b, field).unwrap();
                    series.iter().position(|v| v.is_some()).unwrap()
                })
                .max()
                .unwrap();
            assert_eq!(first + 1, kind.warmup(), "{kind}");
        }
    }

    #[test]
    fn display_formats() {
        assert_eq!(IndicatorKind::Sma(20).to_string(), "SMA(20)");
        assert_eq!(
            IndicatorKind::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
            .to_string(),
            "MACD(12,26,9)"
        );
        assert_eq!(
            IndicatorKind::Bollinger {
                period: 20,
                std_dev: 2.0
            }
            .to_string(),
            "BOLLINGER(20,2)"
        );
    }
}
