//! Domain error types.
//!
//! Every failure belongs to one [`ErrorKind`]. Only connectivity and execution
//! failures are eligible for automatic retry; everything else is either
//! absorbed locally (data), corrected (validation) or halts new entries
//! (account limits).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Data,
    Connectivity,
    Validation,
    Execution,
    AccountLimit,
    Config,
    Io,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Connectivity | ErrorKind::Execution)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Data => "data",
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Validation => "validation",
            ErrorKind::Execution => "execution",
            ErrorKind::AccountLimit => "account-limit",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

/// Top-level error type for amatrader.
#[derive(Debug, thiserror::Error)]
pub enum AmatraderError {
    #[error("no data for {instrument} on {timeframe}")]
    NoData {
        instrument: String,
        timeframe: String,
    },

    #[error("insufficient data for {instrument}: have {bars} bars, need {minimum}")]
    InsufficientData {
        instrument: String,
        bars: usize,
        minimum: usize,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("venue unreachable: {reason}")]
    Disconnected { reason: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("order for {instrument} rejected: {reason}")]
    OrderRejected { instrument: String, reason: String },

    #[error("order for {instrument} not confirmed after {attempts} attempts")]
    RetriesExhausted { instrument: String, attempts: u32 },

    #[error("trading halted: {reason}")]
    TradingHalted { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AmatraderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmatraderError::NoData { .. }
            | AmatraderError::InsufficientData { .. }
            | AmatraderError::DataSource { .. } => ErrorKind::Data,
            AmatraderError::Disconnected { .. } => ErrorKind::Connectivity,
            AmatraderError::Invalid { .. } => ErrorKind::Validation,
            AmatraderError::OrderRejected { .. } | AmatraderError::RetriesExhausted { .. } => {
                ErrorKind::Execution
            }
            AmatraderError::TradingHalted { .. } => ErrorKind::AccountLimit,
            AmatraderError::ConfigParse { .. } => ErrorKind::Config,
            AmatraderError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<&AmatraderError> for std::process::ExitCode {
    fn from(err: &AmatraderError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Config => 2,
            ErrorKind::Connectivity => 3,
            ErrorKind::Execution => 4,
            ErrorKind::Data => 5,
            ErrorKind::AccountLimit => 6,
            ErrorKind::Validation => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connectivity_and_execution_retry() {
        assert!(ErrorKind::Connectivity.is_retryable());
        assert!(ErrorKind::Execution.is_retryable());
        assert!(!ErrorKind::Data.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::AccountLimit.is_retryable());
        assert!(!ErrorKind::Config.is_retryable());
    }

    #[test]
    fn variants_map_to_kinds() {
        let err = AmatraderError::Disconnected {
            reason: "timeout".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(err.is_retryable());

        let err = AmatraderError::TradingHalted {
            reason: "daily loss".into(),
        };
        assert_eq!(err.kind(), ErrorKind::AccountLimit);
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = AmatraderError::InsufficientData {
            instrument: "EURUSD".into(),
            bars: 12,
            minimum: 205,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for EURUSD: have 12 bars, need 205"
        );
    }
}
