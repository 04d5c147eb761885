//! Indicator service port.
//!
//! `None` means "not computable from these bars" (short lookback, zero
//! division, ...). `Err` is reserved for a broken request such as an unknown
//! indicator or field.

use crate::domain::condition::Params;
use crate::domain::error::BarscanError;
use crate::domain::ohlcv::OhlcvBar;

pub trait IndicatorPort {
    fn latest_value(
        &self,
        indicator: &str,
        bars: &[OhlcvBar],
        params: &Params,
        field: &str,
    ) -> Result<Option<f64>, BarscanError>;

    /// The trailing `n` values, oldest first. May be shorter than `n`.
    fn last_n_values(
        &self,
        indicator: &str,
        bars: &[OhlcvBar],
        params: &Params,
        field: &str,
        n: usize,
    ) -> Result<Vec<Option<f64>>, BarscanError>;
}
