//! Multi-symbol scanner.
//!
//! Applies one condition group to many symbols against the current snapshot
//! of the candle store. Each symbol is isolated: a store failure, short
//! history or evaluation fault becomes a [`ScanError`] for that symbol and the
//! batch carries on. The scan is one-shot; repeated scanning belongs to
//! whatever schedules the calls.

use crate::domain::condition::ConditionGroup;
use crate::domain::error::BarscanError;
use crate::domain::evaluator::{evaluate_group, EvaluationDetail, GroupEvaluation};
use crate::ports::candle_port::CandlePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::indicator_port::IndicatorPort;
use rayon::prelude::*;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};

pub const DEFAULT_BAR_LIMIT: usize = 200;
pub const MIN_BARS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub bar_limit: usize,
    pub min_bars: usize,
    pub parallel: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            bar_limit: DEFAULT_BAR_LIMIT,
            min_bars: MIN_BARS,
            parallel: false,
        }
    }
}

impl ScanConfig {
    /// Reads the `[scan]` section, falling back to defaults per key.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BarscanError> {
        let bar_limit = config.get_int("scan", "bar_limit", DEFAULT_BAR_LIMIT as i64);
        let min_bars = config.get_int("scan", "min_bars", MIN_BARS as i64);

        let scan_config = Self {
            bar_limit: usize::try_from(bar_limit).unwrap_or(0),
            min_bars: usize::try_from(min_bars).unwrap_or(0),
            parallel: config.get_bool("scan", "parallel", false),
        };
        scan_config.validate()?;
        Ok(scan_config)
    }

    pub fn validate(&self) -> Result<(), BarscanError> {
        let invalid = |key: &str, reason: String| BarscanError::ConfigInvalid {
            section: "scan".into(),
            key: key.into(),
            reason,
        };

        if self.bar_limit == 0 {
            return Err(invalid("bar_limit", "bar_limit must be positive".into()));
        }
        if self.min_bars < 2 {
            return Err(invalid("min_bars", "min_bars must be at least 2".into()));
        }
        if self.bar_limit < self.min_bars {
            return Err(invalid(
                "bar_limit",
                format!(
                    "bar_limit ({}) is below min_bars ({}); no symbol could ever be evaluated",
                    self.bar_limit, self.min_bars
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanMatch {
    pub symbol: String,
    pub price: f64,
    pub details: Vec<EvaluationDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanError {
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub matches: Vec<ScanMatch>,
    pub errors: Vec<ScanError>,
    pub scanned: usize,
}

/// Outcome of evaluating a group for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEvaluation {
    pub symbol: String,
    pub candle_count: usize,
    pub price: f64,
    pub evaluation: GroupEvaluation,
}

enum SymbolOutcome {
    Matched(ScanMatch),
    Unmatched,
    Failed(ScanError),
}

pub struct Scanner<'a> {
    candles: &'a (dyn CandlePort + Sync),
    indicators: &'a (dyn IndicatorPort + Sync),
    config: ScanConfig,
}

impl<'a> Scanner<'a> {
    pub fn new(
        candles: &'a (dyn CandlePort + Sync),
        indicators: &'a (dyn IndicatorPort + Sync),
        config: ScanConfig,
    ) -> Self {
        Self {
            candles,
            indicators,
            config,
        }
    }

    /// Load bars for one symbol and evaluate the group against them.
    pub fn evaluate_symbol(
        &self,
        group: &ConditionGroup,
        symbol: &str,
        timeframe: &str,
    ) -> Result<SymbolEvaluation, BarscanError> {
        let bars = self
            .candles
            .load_recent(symbol, timeframe, self.config.bar_limit)?;

        let price = match bars.last() {
            Some(last) if bars.len() >= self.config.min_bars => last.close,
            _ => {
                return Err(BarscanError::InsufficientData {
                    symbol: symbol.to_string(),
                    bars: bars.len(),
                    minimum: self.config.min_bars,
                });
            }
        };

        let evaluation = evaluate_group(group, &bars, self.indicators);
        Ok(SymbolEvaluation {
            symbol: symbol.to_string(),
            candle_count: bars.len(),
            price,
            evaluation,
        })
    }

    /// Evaluate the group for every symbol, in input order.
    ///
    /// Duplicates are evaluated once per occurrence. Parallel and sequential
    /// runs produce identical reports.
    pub fn scan(&self, group: &ConditionGroup, symbols: &[String], timeframe: &str) -> ScanReport {
        let outcomes: Vec<SymbolOutcome> = if self.config.parallel {
            symbols
                .par_iter()
                .map(|symbol| self.scan_symbol(group, symbol, timeframe))
                .collect()
        } else {
            symbols
                .iter()
                .map(|symbol| self.scan_symbol(group, symbol, timeframe))
                .collect()
        };

        let mut report = ScanReport {
            matches: Vec::new(),
            errors: Vec::new(),
            scanned: 0,
        };
        for outcome in outcomes {
            report.scanned += 1;
            match outcome {
                SymbolOutcome::Matched(m) => report.matches.push(m),
                SymbolOutcome::Unmatched => {}
                SymbolOutcome::Failed(e) => report.errors.push(e),
            }
        }

        tracing::info!(
            timeframe,
            scanned = report.scanned,
            matches = report.matches.len(),
            errors = report.errors.len(),
            "scan complete"
        );
        report
    }

    fn scan_symbol(&self, group: &ConditionGroup, symbol: &str, timeframe: &str) -> SymbolOutcome {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluate_symbol(group, symbol, timeframe)
        }));

        let error = match attempt {
            Ok(Ok(eval)) if eval.evaluation.result => {
                return SymbolOutcome::Matched(ScanMatch {
                    symbol: eval.symbol,
                    price: eval.price,
                    details: eval.evaluation.details,
                });
            }
            Ok(Ok(_)) => return SymbolOutcome::Unmatched,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        tracing::warn!(symbol, timeframe, %error, "skipping symbol");
        SymbolOutcome::Failed(ScanError {
            symbol: symbol.to_string(),
            error,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("evaluation panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("evaluation panicked: {s}")
    } else {
        "evaluation panicked".to_string()
    }
}
