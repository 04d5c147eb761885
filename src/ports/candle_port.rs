//! Candle store access port.

use crate::domain::error::BarscanError;
use crate::domain::ohlcv::OhlcvBar;

/// Read-only view of a closed-bar cache keyed by (symbol, timeframe).
pub trait CandlePort {
    /// Up to `limit` most recent closed bars, oldest first.
    ///
    /// A key with no data yields an empty vec, not an error.
    fn load_recent(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<OhlcvBar>, BarscanError>;
}
