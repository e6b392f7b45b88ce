use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("No market data available for {symbol}")]
    DataUnavailable { symbol: String },

    #[error("Invalid strategy config: {0}")]
    InvalidStrategyConfig(String),

    #[error("Insufficient data: need at least {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Insufficient cash: need ${required:.2}, have ${available:.2}")]
    InsufficientCash { required: f64, available: f64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid bar series: {0}")]
    InvalidBars(String),

    #[error("Data loading error: {0}")]
    DataLoadError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl BacktestError {
    pub fn invalid_strategy(reason: impl Into<String>) -> Self {
        Self::InvalidStrategyConfig(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, BacktestError>;
