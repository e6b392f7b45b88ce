pub mod config;
pub mod error;
pub mod strategy;
pub mod types;

pub use config::{BacktestParameters, IndicatorPrepass};
pub use error::{BacktestError, Result};
pub use strategy::*;
pub use types::*;
