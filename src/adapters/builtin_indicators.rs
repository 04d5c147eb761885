//! In-process indicator service backed by the built-in indicator set.

use crate::domain::condition::Params;
use crate::domain::error::BarscanError;
use crate::domain::indicator::IndicatorKind;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::indicator_port::IndicatorPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinIndicators;

impl BuiltinIndicators {
    fn series(
        &self,
        indicator: &str,
        bars: &[OhlcvBar],
        params: &Params,
        field: &str,
    ) -> Result<Vec<Option<f64>>, BarscanError> {
        let kind = IndicatorKind::resolve(indicator, params)?;
        let series = kind.compute(bars, field)?;
        tracing::trace!(indicator = %kind, field, bars = bars.len(), "computed indicator");
        Ok(series)
    }
}

impl IndicatorPort for BuiltinIndicators {
    fn latest_value(
        &self,
        indicator: &str,
        bars: &[OhlcvBar],
        params: &Params,
        field: &str,
    ) -> Result<Option<f64>, BarscanError> {
        Ok(self
            .series(indicator, bars, params, field)?
            .last()
            .copied()
            .flatten())
    }

    fn last_n_values(
        &self,
        indicator: &str,
        bars: &[OhlcvBar],
        params: &Params,
        field: &str,
        n: usize,
    ) -> Result<Vec<Option<f64>>, BarscanError> {
        let mut series = self.series(indicator, bars, params, field)?;
        let start = series.len().saturating_sub(n);
        Ok(series.split_off(start))
    }
}
