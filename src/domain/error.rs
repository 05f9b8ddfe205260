//! Error types for the configuration, data and CLI surface.
//!
//! The risk/simulation/backtest core never returns these: it reports
//! problems through status enums and degradation reasons instead.

/// A parse error with position information for condition parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Failure while evaluating a parsed condition against a bar series.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("column '{0}' is not present in the bar series")]
    MissingColumn(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("bar index {index} out of range for {len} bars")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Top-level error type for marketscan.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
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

    #[error(transparent)]
    ConditionParse(#[from] ParseError),

    #[error("invalid condition: {reason}")]
    ConditionInvalid { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("no valid strategies loaded")]
    NoStrategies,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<EvalError> for ScannerError {
    fn from(err: EvalError) -> Self {
        ScannerError::ConditionInvalid {
            reason: err.to_string(),
        }
    }
}

impl From<&ScannerError> for std::process::ExitCode {
    fn from(err: &ScannerError) -> Self {
        let code: u8 = match err {
            ScannerError::Io(_) | ScannerError::Json(_) => 1,
            ScannerError::ConfigParse { .. }
            | ScannerError::ConfigMissing { .. }
            | ScannerError::ConfigInvalid { .. } => 2,
            ScannerError::Data { .. } => 3,
            ScannerError::ConditionParse(_) | ScannerError::ConditionInvalid { .. } => 4,
            ScannerError::NoData { .. } | ScannerError::NoStrategies => 5,
        };
        std::process::ExitCode::from(code)
    }
}
