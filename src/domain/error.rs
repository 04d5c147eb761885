//! Domain error types.

/// Top-level error type for barscan.
///
/// Below the request boundary these are converted to data (a detail's
/// `error` string or a per-symbol scan error) rather than propagated.
#[derive(Debug, thiserror::Error)]
pub enum BarscanError {
    #[error("store error: {reason}")]
    Store { reason: String },

    #[error("store query error: {reason}")]
    StoreQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid arguments: {reason}")]
    Usage { reason: String },

    #[error("invalid conditions: {reason}")]
    ConditionParse { reason: String },

    #[error("invalid indicator {indicator}: {reason}")]
    IndicatorInvalid { indicator: String, reason: String },

    #[error("Insufficient data ({bars} candles)")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BarscanError {
    pub fn indicator(indicator: &str, reason: impl Into<String>) -> Self {
        BarscanError::IndicatorInvalid {
            indicator: indicator.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&BarscanError> for std::process::ExitCode {
    fn from(err: &BarscanError) -> Self {
        let code: u8 = match err {
            BarscanError::Io(_) => 1,
            BarscanError::ConfigParse { .. }
            | BarscanError::ConfigMissing { .. }
            | BarscanError::ConfigInvalid { .. } => 2,
            BarscanError::Store { .. } | BarscanError::StoreQuery { .. } => 3,
            BarscanError::Usage { .. }
            | BarscanError::ConditionParse { .. }
            | BarscanError::IndicatorInvalid { .. } => 4,
            BarscanError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
