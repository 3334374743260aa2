//! Domain error types.

use chrono::NaiveDate;

/// A bar that is missing (or carries a non-finite) required numeric field.
///
/// Recovered locally: the day is skipped and the pass continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed bar on {date}: missing or non-finite {field}")]
pub struct MalformedBarError {
    pub date: NaiveDate,
    pub field: &'static str,
}

/// Error returned by an entry validator. Every variant is treated as a rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidatorError {
    #[error("validator timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("validator unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Top-level error type for dipbuyer.
#[derive(Debug, thiserror::Error)]
pub enum DipbuyerError {
    #[error("data error: {reason}")]
    Data { reason: String },

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

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient history for {symbol}: {bars} bars, {usable} with complete indicators")]
    InsufficientHistory {
        symbol: String,
        bars: usize,
        usable: usize,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&DipbuyerError> for std::process::ExitCode {
    fn from(err: &DipbuyerError) -> Self {
        let code: u8 = match err {
            DipbuyerError::Io(_) | DipbuyerError::Report { .. } => 1,
            DipbuyerError::ConfigParse { .. }
            | DipbuyerError::ConfigMissing { .. }
            | DipbuyerError::ConfigInvalid { .. } => 2,
            DipbuyerError::Data { .. } => 3,
            DipbuyerError::NoData { .. } | DipbuyerError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
