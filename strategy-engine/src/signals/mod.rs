pub mod evaluator;
pub mod generator;

pub use evaluator::{compare_series, ConditionEvaluator};
pub use generator::{SignalGenerator, SignalSeries};
