use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while preparing, training or running a forecast.
///
/// Everything except [`ForecastError::InvalidDate`] is scoped to a single
/// ticker and is recorded on that ticker's result instead of aborting a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("Price series is empty")]
    EmptySeries,

    #[error("Degenerate price range: every close equals {value}")]
    DegenerateRange { value: f64 },

    #[error("Insufficient data: need {required} records, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Shape mismatch: expected window of {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("No data returned for {ticker}")]
    NoData { ticker: String },

    #[error("Division by zero: {context}")]
    DivisionByZero { context: String },

    #[error("Invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDate { input: String },

    #[error("Invalid price series: {reason}")]
    InvalidSeries { reason: String },

    #[error("Model has not been trained")]
    NotTrained,

    #[error("Model failure: {reason}")]
    Model { reason: String },

    #[error("Market data provider failed for {ticker}: {reason}")]
    Provider { ticker: String, reason: String },

    #[error("Forecast cancelled")]
    Cancelled,
}

impl ForecastError {
    /// Errors that invalidate the whole request rather than one ticker.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, ForecastError::InvalidDate { .. })
    }

    /// Short stable label used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::EmptySeries => "EmptySeries",
            ForecastError::DegenerateRange { .. } => "DegenerateRange",
            ForecastError::InsufficientData { .. } => "InsufficientData",
            ForecastError::ShapeMismatch { .. } => "ShapeMismatch",
            ForecastError::NoData { .. } => "NoData",
            ForecastError::DivisionByZero { .. } => "DivisionByZero",
            ForecastError::InvalidDate { .. } => "InvalidDate",
            ForecastError::InvalidSeries { .. } => "InvalidSeries",
            ForecastError::NotTrained => "NotTrained",
            ForecastError::Model { .. } => "Model",
            ForecastError::Provider { .. } => "Provider",
            ForecastError::Cancelled => "Cancelled",
        }
    }
}

/// Errors related to the virtual trading session
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradingError {
    #[error("Insufficient funds: need ${need}, available ${available}")]
    InsufficientFunds { need: Decimal, available: Decimal },

    #[error("Invalid amount: {amount} (must be positive)")]
    InvalidAmount { amount: Decimal },

    #[error("Invalid ticker: '{ticker}'")]
    InvalidTicker { ticker: String },
}
