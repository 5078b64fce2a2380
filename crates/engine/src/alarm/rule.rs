use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::storage::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl Operator {
    /// Plain IEEE-754 comparison; `==` and `!=` are exact.
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterOrEqual => value >= threshold,
            Self::LessOrEqual => value <= threshold,
            Self::Equal => value == threshold,
            Self::NotEqual => value != threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Self::GreaterThan),
            "<" => Ok(Self::LessThan),
            ">=" => Ok(Self::GreaterOrEqual),
            "<=" => Ok(Self::LessOrEqual),
            "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            other => Err(RuleError::UnknownOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Simple,
    Conditional,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Conditional => "conditional",
        }
    }
}

impl FromStr for RuleKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "conditional" => Ok(Self::Conditional),
            other => Err(RuleError::InvalidDefinition(format!("unknown rule kind `{other}`"))),
        }
    }
}

/// Secondary condition of a conditional rule, possibly on another device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuntCondition {
    pub device_id: String,
    pub metric: String,
    pub operator: Operator,
    pub threshold: f64,
}

impl ShuntCondition {
    pub fn holds(&self, value: f64) -> bool {
        self.operator.evaluate(value, self.threshold)
    }
}

/// A validated alarm rule. Rules are immutable; edits replace the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRule {
    pub id: String,
    pub name: String,
    pub device_id: String,
    pub metric: String,
    pub operator: Operator,
    pub threshold: f64,
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shunt: Option<ShuntCondition>,
    pub message: String,
    pub enabled: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl AlarmRule {
    pub fn kind(&self) -> RuleKind {
        if self.shunt.is_some() {
            RuleKind::Conditional
        } else {
            RuleKind::Simple
        }
    }

    pub fn primary_holds(&self, value: f64) -> bool {
        self.operator.evaluate(value, self.threshold)
    }

    /// True when readings from `device_id` can change this rule's outcome.
    pub fn references(&self, device_id: &str) -> bool {
        self.device_id == device_id
            || self
                .shunt
                .as_ref()
                .is_some_and(|s| s.device_id == device_id)
    }

    /// Devices whose readings drive this rule, primary first.
    pub fn devices(&self) -> Vec<&str> {
        let mut out = vec![self.device_id.as_str()];
        if let Some(s) = &self.shunt {
            if s.device_id != self.device_id {
                out.push(s.device_id.as_str());
            }
        }
        out
    }
}

/// Unvalidated rule definition as received from the management surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub kind: RuleKind,
    pub device_id: String,
    pub metric: String,
    pub operator: Operator,
    pub threshold: f64,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub shunt_device_id: Option<String>,
    #[serde(default)]
    pub shunt_metric: Option<String>,
    #[serde(default)]
    pub shunt_operator: Option<Operator>,
    #[serde(default)]
    pub shunt_threshold: Option<f64>,
    #[serde(default)]
    pub message: String,
    #[serde(default = "yes")]
    pub enabled: bool,
}

fn yes() -> bool {
    true
}

impl RuleDraft {
    pub fn simple(
        name: impl Into<String>,
        device_id: impl Into<String>,
        metric: impl Into<String>,
        operator: Operator,
        threshold: f64,
        duration_ms: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: RuleKind::Simple,
            device_id: device_id.into(),
            metric: metric.into(),
            operator,
            threshold,
            duration_ms,
            shunt_device_id: None,
            shunt_metric: None,
            shunt_operator: None,
            shunt_threshold: None,
            message: message.into(),
            enabled: true,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn conditional(
        name: impl Into<String>,
        device_id: impl Into<String>,
        metric: impl Into<String>,
        operator: Operator,
        threshold: f64,
        duration_ms: i64,
        shunt: ShuntCondition,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: RuleKind::Conditional,
            shunt_device_id: Some(shunt.device_id),
            shunt_metric: Some(shunt.metric),
            shunt_operator: Some(shunt.operator),
            shunt_threshold: Some(shunt.threshold),
            ..Self::simple(name, device_id, metric, operator, threshold, duration_ms, message)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Validates the draft into a rule with the given id.
    pub fn into_rule(self, id: String, now_ms: i64) -> Result<AlarmRule, RuleError> {
        let invalid = |msg: &str| Err(RuleError::InvalidDefinition(msg.to_string()));

        if id.trim().is_empty() {
            return invalid("id must not be empty");
        }
        if self.device_id.trim().is_empty() {
            return invalid("device_id must not be empty");
        }
        if self.metric.trim().is_empty() {
            return invalid("metric must not be empty");
        }
        if !self.threshold.is_finite() {
            return invalid("threshold must be a finite number");
        }
        if self.duration_ms < 0 {
            return invalid("duration must not be negative");
        }

        let has_any_shunt = self.shunt_device_id.is_some()
            || self.shunt_metric.is_some()
            || self.shunt_operator.is_some()
            || self.shunt_threshold.is_some();

        let shunt = match self.kind {
            RuleKind::Simple => {
                if has_any_shunt {
                    return invalid("simple rules must not carry shunt fields");
                }
                None
            }
            RuleKind::Conditional => {
                let (Some(device_id), Some(metric), Some(operator), Some(threshold)) = (
                    self.shunt_device_id,
                    self.shunt_metric,
                    self.shunt_operator,
                    self.shunt_threshold,
                ) else {
                    return invalid("conditional rules require shunt_device_id, shunt_metric, shunt_operator and shunt_threshold");
                };
                if device_id.trim().is_empty() || metric.trim().is_empty() {
                    return invalid("shunt device and metric must not be empty");
                }
                if !threshold.is_finite() {
                    return invalid("shunt_threshold must be a finite number");
                }
                Some(ShuntCondition {
                    device_id,
                    metric,
                    operator,
                    threshold,
                })
            }
        };

        let name = if self.name.trim().is_empty() {
            id.clone()
        } else {
            self.name
        };

        Ok(AlarmRule {
            id,
            name,
            device_id: self.device_id,
            metric: self.metric,
            operator: self.operator,
            threshold: self.threshold,
            duration_ms: self.duration_ms,
            shunt,
            message: self.message,
            enabled: self.enabled,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }
}

impl From<&AlarmRule> for RuleDraft {
    fn from(r: &AlarmRule) -> Self {
        Self {
            id: Some(r.id.clone()),
            name: r.name.clone(),
            kind: r.kind(),
            device_id: r.device_id.clone(),
            metric: r.metric.clone(),
            operator: r.operator,
            threshold: r.threshold,
            duration_ms: r.duration_ms,
            shunt_device_id: r.shunt.as_ref().map(|s| s.device_id.clone()),
            shunt_metric: r.shunt.as_ref().map(|s| s.metric.clone()),
            shunt_operator: r.shunt.as_ref().map(|s| s.operator),
            shunt_threshold: r.shunt.as_ref().map(|s| s.threshold),
            message: r.message.clone(),
            enabled: r.enabled,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid rule definition: {0}")]
    InvalidDefinition(String),
    #[error("unknown comparison operator `{0}`")]
    UnknownOperator(String),
    #[error("rule not found: {0}")]
    NotFound(String),
    #[error("rule already exists: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}
