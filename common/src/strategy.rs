//! Strategy documents: recursive condition trees over indicators plus the
//! scheduled-purchase (DCA) policy.
//!
//! A strategy arrives as a JSON document shaped like
//!
//! ```json
//! {
//!   "buy_conditions": {
//!     "connector": "AND",
//!     "children": [
//!       { "indicator": {"name": "RSI", "params": {"period": 14}},
//!         "operator": "<", "value_type": "STATIC", "value": 30 }
//!     ]
//!   },
//!   "dca_config": {"enabled": false, "amount": 100000, "interval": "monthly"}
//! }
//! ```
//!
//! Parsing is strict: unknown keys, operators, connectors and indicator names are
//! rejected, as is a `value` whose shape disagrees with `value_type`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BacktestError, Result};

/// Indicator family named in a strategy document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Macd,
    Bb,
    Price,
    Volume,
}

/// Line of a multi-line indicator (MACD, Bollinger Bands)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorOutput {
    Line,
    Signal,
    Histogram,
    Upper,
    Middle,
    Lower,
}

/// Indicator reference as written in a strategy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorSpec {
    pub name: IndicatorKind,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<IndicatorOutput>,
}

/// Fully resolved indicator with defaults applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Indicator {
    Sma { period: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Bollinger { period: usize, std_dev: f64 },
    Price,
    Volume,
}

/// Where a resolved value reference reads its per-bar numbers from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesRef {
    Close,
    Volume,
    Column(String),
}

impl IndicatorSpec {
    pub fn new(name: IndicatorKind) -> Self {
        Self {
            name,
            params: BTreeMap::new(),
            output: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: f64) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn with_output(mut self, output: IndicatorOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn price() -> Self {
        Self::new(IndicatorKind::Price)
    }

    pub fn volume() -> Self {
        Self::new(IndicatorKind::Volume)
    }

    pub fn sma(period: usize) -> Self {
        Self::new(IndicatorKind::Sma).with_param("period", period as f64)
    }

    pub fn ema(period: usize) -> Self {
        Self::new(IndicatorKind::Ema).with_param("period", period as f64)
    }

    pub fn rsi(period: usize) -> Self {
        Self::new(IndicatorKind::Rsi).with_param("period", period as f64)
    }

    pub fn macd(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(IndicatorKind::Macd)
            .with_param("fast", fast as f64)
            .with_param("slow", slow as f64)
            .with_param("signal", signal as f64)
    }

    pub fn bollinger(period: usize, std_dev: f64) -> Self {
        Self::new(IndicatorKind::Bb)
            .with_param("period", period as f64)
            .with_param("std_dev", std_dev)
    }

    /// Apply parameter defaults and validate the parameter set.
    pub fn resolve(&self) -> Result<Indicator> {
        let allowed: &[&str] = match self.name {
            IndicatorKind::Sma | IndicatorKind::Ema | IndicatorKind::Rsi => &["period"],
            IndicatorKind::Macd => &["fast", "slow", "signal"],
            IndicatorKind::Bb => &["period", "std_dev"],
            IndicatorKind::Price | IndicatorKind::Volume => &[],
        };
        if let Some(key) = self.params.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(BacktestError::invalid_strategy(format!(
                "unknown parameter '{}' for {:?}",
                key, self.name
            )));
        }

        let indicator = match self.name {
            IndicatorKind::Sma => Indicator::Sma {
                period: self.period_param("period", 20)?,
            },
            IndicatorKind::Ema => Indicator::Ema {
                period: self.period_param("period", 20)?,
            },
            IndicatorKind::Rsi => Indicator::Rsi {
                period: self.period_param("period", 14)?,
            },
            IndicatorKind::Macd => {
                let fast = self.period_param("fast", 12)?;
                let slow = self.period_param("slow", 26)?;
                let signal = self.period_param("signal", 9)?;
                if fast >= slow {
                    return Err(BacktestError::invalid_strategy(format!(
                        "MACD fast period ({}) must be shorter than slow period ({})",
                        fast, slow
                    )));
                }
                Indicator::Macd { fast, slow, signal }
            }
            IndicatorKind::Bb => {
                let std_dev = self.params.get("std_dev").copied().unwrap_or(2.0);
                if !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(BacktestError::invalid_strategy(format!(
                        "BB std_dev must be a non-negative number, got {}",
                        std_dev
                    )));
                }
                Indicator::Bollinger {
                    period: self.period_param("period", 20)?,
                    std_dev,
                }
            }
            IndicatorKind::Price => Indicator::Price,
            IndicatorKind::Volume => Indicator::Volume,
        };

        let output_ok = match (indicator, self.output) {
            (_, None) => true,
            (Indicator::Macd { .. }, Some(o)) => matches!(
                o,
                IndicatorOutput::Line | IndicatorOutput::Signal | IndicatorOutput::Histogram
            ),
            (Indicator::Bollinger { .. }, Some(o)) => matches!(
                o,
                IndicatorOutput::Upper | IndicatorOutput::Middle | IndicatorOutput::Lower
            ),
            _ => false,
        };
        if !output_ok {
            return Err(BacktestError::invalid_strategy(format!(
                "{:?} has no output {:?}",
                self.name, self.output
            )));
        }

        Ok(indicator)
    }

    /// Resolve to the series this reference reads from.
    pub fn series_ref(&self) -> Result<SeriesRef> {
        let indicator = self.resolve()?;
        Ok(match indicator {
            Indicator::Price => SeriesRef::Close,
            Indicator::Volume => SeriesRef::Volume,
            Indicator::Macd { .. } => {
                let output = self.output.unwrap_or(IndicatorOutput::Line);
                SeriesRef::Column(indicator.column_name(output))
            }
            Indicator::Bollinger { .. } => {
                let output = self.output.unwrap_or(IndicatorOutput::Middle);
                SeriesRef::Column(indicator.column_name(output))
            }
            _ => SeriesRef::Column(indicator.column_name(IndicatorOutput::Line)),
        })
    }

    fn period_param(&self, key: &str, default: usize) -> Result<usize> {
        let Some(&value) = self.params.get(key) else {
            return Ok(default);
        };
        if !value.is_finite() || value < 1.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
            return Err(BacktestError::invalid_strategy(format!(
                "{:?} parameter '{}' must be a positive integer, got {}",
                self.name, key, value
            )));
        }
        Ok(value as usize)
    }
}

impl Indicator {
    /// Deterministic column key for one output line
    pub fn column_name(&self, output: IndicatorOutput) -> String {
        match *self {
            Indicator::Sma { period } => format!("SMA_{}", period),
            Indicator::Ema { period } => format!("EMA_{}", period),
            Indicator::Rsi { period } => format!("RSI_{}", period),
            Indicator::Macd { fast, slow, signal } => match output {
                IndicatorOutput::Signal => format!("MACD_SIGNAL_{}_{}_{}", fast, slow, signal),
                IndicatorOutput::Histogram => format!("MACD_HIST_{}_{}_{}", fast, slow, signal),
                _ => format!("MACD_{}_{}_{}", fast, slow, signal),
            },
            Indicator::Bollinger { period, std_dev } => match output {
                IndicatorOutput::Upper => format!("BB_UPPER_{}_{}", period, std_dev),
                IndicatorOutput::Lower => format!("BB_LOWER_{}_{}", period, std_dev),
                _ => format!("BB_MIDDLE_{}_{}", period, std_dev),
            },
            Indicator::Price => "PRICE".to_string(),
            Indicator::Volume => "VOLUME".to_string(),
        }
    }
}

/// Comparison applied by a leaf condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "CROSS_UP")]
    CrossUp,
    #[serde(rename = "CROSS_DOWN")]
    CrossDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    Static,
    Indicator,
}

/// Right-hand side of a leaf condition
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRef {
    Constant(f64),
    Indicator(IndicatorSpec),
}

/// Leaf condition: `indicator <operator> value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    pub indicator: IndicatorSpec,
    pub operator: Operator,
    pub value: ValueRef,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    indicator: IndicatorSpec,
    operator: Operator,
    value_type: ValueType,
    value: RawValue,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Indicator(IndicatorSpec),
}

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> std::result::Result<Self, Self::Error> {
        let value = match (raw.value_type, raw.value) {
            (ValueType::Static, RawValue::Number(v)) => ValueRef::Constant(v),
            (ValueType::Indicator, RawValue::Indicator(spec)) => ValueRef::Indicator(spec),
            (ValueType::Static, RawValue::Indicator(_)) => {
                return Err("value_type STATIC requires a numeric value".to_string())
            }
            (ValueType::Indicator, RawValue::Number(_)) => {
                return Err("value_type INDICATOR requires an indicator value".to_string())
            }
        };
        Ok(Condition {
            indicator: raw.indicator,
            operator: raw.operator,
            value,
        })
    }
}

impl From<Condition> for RawCondition {
    fn from(cond: Condition) -> Self {
        let (value_type, value) = match cond.value {
            ValueRef::Constant(v) => (ValueType::Static, RawValue::Number(v)),
            ValueRef::Indicator(spec) => (ValueType::Indicator, RawValue::Indicator(spec)),
        };
        RawCondition {
            indicator: cond.indicator,
            operator: cond.operator,
            value_type,
            value,
        }
    }
}

impl Condition {
    pub fn new(indicator: IndicatorSpec, operator: Operator, value: ValueRef) -> Self {
        Self {
            indicator,
            operator,
            value,
        }
    }

    /// Compare against a fixed number
    pub fn against(indicator: IndicatorSpec, operator: Operator, value: f64) -> Self {
        Self::new(indicator, operator, ValueRef::Constant(value))
    }

    /// Compare against another indicator
    pub fn versus(indicator: IndicatorSpec, operator: Operator, other: IndicatorSpec) -> Self {
        Self::new(indicator, operator, ValueRef::Indicator(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    And,
    Or,
}

/// Group of conditions combined by one connector, optionally negated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogicNode {
    pub connector: Connector,
    #[serde(default, alias = "not_logic")]
    pub negate: bool,
    #[serde(alias = "conditions")]
    pub children: Vec<LogicExpr>,
}

/// Child of a [`LogicNode`]: a leaf condition or a nested group.
///
/// Objects carrying a `connector` key are groups, everything else is a leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogicExpr {
    Group(LogicNode),
    Leaf(Condition),
}

impl<'de> Deserialize<'de> for LogicExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.get("connector").is_some() {
            LogicNode::deserialize(value)
                .map(LogicExpr::Group)
                .map_err(D::Error::custom)
        } else {
            Condition::deserialize(value)
                .map(LogicExpr::Leaf)
                .map_err(D::Error::custom)
        }
    }
}

impl LogicNode {
    pub fn new(connector: Connector, children: Vec<LogicExpr>) -> Self {
        Self {
            connector,
            negate: false,
            children,
        }
    }

    /// AND-group of leaf conditions
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::new(
            Connector::And,
            conditions.into_iter().map(LogicExpr::Leaf).collect(),
        )
    }

    /// OR-group of leaf conditions
    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::new(
            Connector::Or,
            conditions.into_iter().map(LogicExpr::Leaf).collect(),
        )
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn with_group(mut self, group: LogicNode) -> Self {
        self.children.push(LogicExpr::Group(group));
        self
    }

    /// Every indicator referenced anywhere in the tree, in document order
    pub fn indicator_specs(&self) -> Vec<&IndicatorSpec> {
        let mut specs = Vec::new();
        self.collect_specs(&mut specs);
        specs
    }

    fn collect_specs<'a>(&'a self, out: &mut Vec<&'a IndicatorSpec>) {
        for child in &self.children {
            match child {
                LogicExpr::Group(node) => node.collect_specs(out),
                LogicExpr::Leaf(cond) => {
                    out.push(&cond.indicator);
                    if let ValueRef::Indicator(spec) = &cond.value {
                        out.push(spec);
                    }
                }
            }
        }
    }

    fn validate(&self, path: &str) -> Result<()> {
        for (i, child) in self.children.iter().enumerate() {
            let child_path = format!("{}[{}]", path, i);
            match child {
                LogicExpr::Group(node) => node.validate(&child_path)?,
                LogicExpr::Leaf(cond) => {
                    cond.indicator
                        .resolve()
                        .map_err(|e| prefix_error(&child_path, e))?;
                    match &cond.value {
                        ValueRef::Constant(v) if !v.is_finite() => {
                            return Err(BacktestError::invalid_strategy(format!(
                                "{}: constant must be finite",
                                child_path
                            )));
                        }
                        ValueRef::Constant(_) => {}
                        ValueRef::Indicator(spec) => {
                            spec.resolve().map_err(|e| prefix_error(&child_path, e))?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn prefix_error(path: &str, err: BacktestError) -> BacktestError {
    match err {
        BacktestError::InvalidStrategyConfig(reason) => {
            BacktestError::InvalidStrategyConfig(format!("{}: {}", path, reason))
        }
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DcaInterval {
    Daily,
    Weekly,
    Monthly,
}

/// How each scheduled purchase is sized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DcaKind {
    #[default]
    FixedAmount,
}

/// Scheduled periodic purchase policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DcaConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: DcaKind,
    pub amount: f64,
    pub interval: DcaInterval,
}

impl Default for DcaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: DcaKind::FixedAmount,
            amount: 100_000.0,
            interval: DcaInterval::Monthly,
        }
    }
}

impl DcaConfig {
    pub fn every(interval: DcaInterval, amount: f64) -> Self {
        Self {
            enabled: true,
            kind: DcaKind::FixedAmount,
            amount,
            interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub buy_conditions: LogicNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_conditions: Option<LogicNode>,
    #[serde(default)]
    pub dca_config: DcaConfig,
}

impl StrategyConfig {
    pub fn new(buy_conditions: LogicNode, sell_conditions: Option<LogicNode>) -> Self {
        Self {
            buy_conditions,
            sell_conditions,
            dca_config: DcaConfig::default(),
        }
    }

    pub fn with_dca(mut self, dca_config: DcaConfig) -> Self {
        self.dca_config = dca_config;
        self
    }

    /// Parse and validate a strategy document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StrategyConfig = serde_json::from_str(json)
            .map_err(|e| BacktestError::InvalidStrategyConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every indicator reference, constant and the DCA policy.
    pub fn validate(&self) -> Result<()> {
        self.buy_conditions.validate("buy_conditions")?;
        if let Some(sell) = &self.sell_conditions {
            sell.validate("sell_conditions")?;
        }
        if self.dca_config.enabled
            && (!self.dca_config.amount.is_finite() || self.dca_config.amount <= 0.0)
        {
            return Err(BacktestError::invalid_strategy(format!(
                "dca_config.amount must be positive, got {}",
                self.dca_config.amount
            )));
        }
        Ok(())
    }

    /// Indicators referenced by the buy and sell trees
    pub fn referenced_indicators(&self) -> Vec<IndicatorSpec> {
        let mut specs: Vec<IndicatorSpec> = self
            .buy_conditions
            .indicator_specs()
            .into_iter()
            .cloned()
            .collect();
        if let Some(sell) = &self.sell_conditions {
            specs.extend(sell.indicator_specs().into_iter().cloned());
        }
        specs
    }
}
