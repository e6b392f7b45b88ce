//! Condition tree evaluation over whole indicator series.
//!
//! Every output value at bar `t` depends only on bars `<= t`; cross operators look
//! back exactly one bar.

use common::{
    Condition, Connector, IndicatorSpec, LogicExpr, LogicNode, Operator, Result, SeriesRef,
    ValueRef,
};
use tracing::warn;

use crate::indicators::IndicatorFrame;

/// Evaluates leaf conditions and logic groups against one indicator frame
pub struct ConditionEvaluator<'a> {
    frame: &'a IndicatorFrame,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(frame: &'a IndicatorFrame) -> Self {
        Self { frame }
    }

    /// Resolve a value reference to one number per bar.
    ///
    /// A reference to a column the frame does not hold resolves to zeros and
    /// logs a warning.
    pub fn resolve(&self, value: &ValueRef) -> Result<Vec<Option<f64>>> {
        match value {
            ValueRef::Constant(v) => Ok(vec![Some(*v); self.frame.len()]),
            ValueRef::Indicator(spec) => self.resolve_spec(spec),
        }
    }

    pub fn resolve_spec(&self, spec: &IndicatorSpec) -> Result<Vec<Option<f64>>> {
        let series = match spec.series_ref()? {
            SeriesRef::Close => self.frame.closes().into_iter().map(Some).collect(),
            SeriesRef::Volume => self.frame.volumes().into_iter().map(Some).collect(),
            SeriesRef::Column(name) => match self.frame.column(&name) {
                Some(values) => values.to_vec(),
                None => {
                    warn!(column = %name, "indicator column missing, using zero series");
                    vec![Some(0.0); self.frame.len()]
                }
            },
        };
        Ok(series)
    }

    pub fn evaluate_condition(&self, condition: &Condition) -> Result<Vec<bool>> {
        let lhs = self.resolve_spec(&condition.indicator)?;
        let rhs = self.resolve(&condition.value)?;
        Ok(compare_series(&lhs, &rhs, condition.operator))
    }

    /// Fold children left to right with the node's connector, then negate.
    ///
    /// A group without children is true on every bar.
    pub fn evaluate_node(&self, node: &LogicNode) -> Result<Vec<bool>> {
        let n = self.frame.len();
        let mut children = node.children.iter();
        let Some(first) = children.next() else {
            return Ok(vec![true; n]);
        };

        let mut mask = self.evaluate_expr(first)?;
        for child in children {
            let child_mask = self.evaluate_expr(child)?;
            for (m, c) in mask.iter_mut().zip(child_mask) {
                *m = match node.connector {
                    Connector::And => *m && c,
                    Connector::Or => *m || c,
                };
            }
        }

        if node.negate {
            mask.iter_mut().for_each(|m| *m = !*m);
        }
        Ok(mask)
    }

    fn evaluate_expr(&self, expr: &LogicExpr) -> Result<Vec<bool>> {
        match expr {
            LogicExpr::Group(node) => self.evaluate_node(node),
            LogicExpr::Leaf(condition) => self.evaluate_condition(condition),
        }
    }
}

/// Pointwise comparison of two aligned series.
///
/// Undefined cells compare as false; cross operators are false at the first bar.
pub fn compare_series(lhs: &[Option<f64>], rhs: &[Option<f64>], op: Operator) -> Vec<bool> {
    (0..lhs.len().min(rhs.len()))
        .map(|t| {
            let (Some(l), Some(r)) = (lhs[t], rhs[t]) else {
                return false;
            };
            match op {
                Operator::Gt => l > r,
                Operator::Lt => l < r,
                Operator::Ge => l >= r,
                Operator::Le => l <= r,
                Operator::Eq => l == r,
                Operator::CrossUp | Operator::CrossDown => {
                    if t == 0 {
                        return false;
                    }
                    let (Some(lp), Some(rp)) = (lhs[t - 1], rhs[t - 1]) else {
                        return false;
                    };
                    if op == Operator::CrossUp {
                        lp < rp && l > r
                    } else {
                        lp > rp && l < r
                    }
                }
            }
        })
        .collect()
}
