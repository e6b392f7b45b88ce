use common::{Result, StrategyConfig};

use crate::indicators::IndicatorFrame;
use crate::signals::evaluator::ConditionEvaluator;

/// Buy and sell signals aligned 1:1 with the bars of an indicator frame
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    pub buy: Vec<bool>,
    pub sell: Vec<bool>,
}

impl SignalSeries {
    pub fn len(&self) -> usize {
        self.buy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_empty()
    }
}

/// Turns a strategy's buy and sell trees into per-bar signals
pub struct SignalGenerator<'a> {
    strategy: &'a StrategyConfig,
}

impl<'a> SignalGenerator<'a> {
    pub fn new(strategy: &'a StrategyConfig) -> Self {
        Self { strategy }
    }

    /// Evaluate both trees. Without a sell tree the sell series is all false.
    pub fn generate(&self, frame: &IndicatorFrame) -> Result<SignalSeries> {
        let evaluator = ConditionEvaluator::new(frame);

        let buy = evaluator.evaluate_node(&self.strategy.buy_conditions)?;
        let sell = match &self.strategy.sell_conditions {
            Some(node) => evaluator.evaluate_node(node)?,
            None => vec![false; frame.len()],
        };

        Ok(SignalSeries { buy, sell })
    }
}
