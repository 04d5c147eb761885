//! Condition model: single comparisons and flat AND/OR groups.
//!
//! A group is an ordered list of items, each either a [`Condition`] or a
//! logic token. Tokens do not nest and carry no precedence: the effective
//! logic of the whole group is the *last* token seen, defaulting to AND.
//!
//! Groups arrive as JSON from the host, e.g.
//!
//! ```json
//! [
//!   {"indicator": "rsi", "params": {"period": 14}, "operator": "<", "value": 30},
//!   "AND",
//!   {"indicator": "macd", "field": "histogram", "operator": "crosses_above", "value": 0}
//! ]
//! ```

use crate::domain::error::BarscanError;
use crate::domain::indicator::IndicatorKind;
use crate::domain::scanner::DEFAULT_BAR_LIMIT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Indicator configuration, opaque to the evaluator.
pub type Params = serde_json::Map<String, Value>;

pub const DEFAULT_FIELD: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "between")]
    Between,
    #[serde(rename = "crosses_above")]
    CrossesAbove,
    #[serde(rename = "crosses_below")]
    CrossesBelow,
}

impl Operator {
    pub fn is_crossing(self) -> bool {
        matches!(self, Operator::CrossesAbove | Operator::CrossesBelow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Eq => "==",
            Operator::Between => "between",
            Operator::CrossesAbove => "crosses_above",
            Operator::CrossesBelow => "crosses_below",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_field() -> String {
    DEFAULT_FIELD.to_string()
}

/// One evaluatable comparison. `value2` only matters for `between`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub indicator: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default = "default_field")]
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<f64>,
}

impl Condition {
    pub fn new(indicator: &str, operator: Operator, value: f64) -> Self {
        Self {
            indicator: indicator.to_string(),
            params: Params::new(),
            field: default_field(),
            operator,
            value,
            value2: None,
        }
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_upper(mut self, value2: f64) -> Self {
        self.value2 = Some(value2);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Logic {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl Logic {
    /// Case-insensitive token parse; anything but AND/OR is `None`.
    pub fn from_token(token: &str) -> Option<Logic> {
        match token.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Logic::And),
            "OR" => Some(Logic::Or),
            _ => None,
        }
    }

    pub fn combine(self, flags: &[bool]) -> bool {
        match self {
            Logic::And => flags.iter().all(|met| *met),
            Logic::Or => flags.iter().any(|met| *met),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupItem {
    Condition(Condition),
    Logic(Logic),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionGroup {
    items: Vec<GroupItem>,
}

impl ConditionGroup {
    pub fn new(items: Vec<GroupItem>) -> Self {
        Self { items }
    }

    /// Conditions joined by a single trailing logic token.
    pub fn joined(conditions: Vec<Condition>, logic: Logic) -> Self {
        let mut items: Vec<GroupItem> = conditions.into_iter().map(GroupItem::Condition).collect();
        items.push(GroupItem::Logic(logic));
        Self { items }
    }

    pub fn parse(json: &str) -> Result<Self, BarscanError> {
        let value: Value = serde_json::from_str(json).map_err(|e| BarscanError::ConditionParse {
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Accepts an item array, a single condition object, or
    /// `{"conditions": [...], "logic": "OR"}`.
    pub fn from_value(value: Value) -> Result<Self, BarscanError> {
        match value {
            Value::Array(raw) => {
                let items = raw
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| parse_item(index, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self { items })
            }
            Value::Object(mut map) if map.contains_key("conditions") => {
                let conditions = map.remove("conditions").unwrap_or(Value::Null);
                let mut group = match conditions {
                    Value::Array(_) => Self::from_value(conditions)?,
                    other => {
                        return Err(BarscanError::ConditionParse {
                            reason: format!("\"conditions\" must be an array, got {}", kind_of(&other)),
                        });
                    }
                };
                match map.remove("logic") {
                    None | Some(Value::Null) => {}
                    Some(Value::String(token)) => {
                        let logic = Logic::from_token(&token).ok_or_else(|| {
                            BarscanError::ConditionParse {
                                reason: format!("unknown logic token \"{token}\""),
                            }
                        })?;
                        group.items.push(GroupItem::Logic(logic));
                    }
                    Some(other) => {
                        return Err(BarscanError::ConditionParse {
                            reason: format!("\"logic\" must be a string, got {}", kind_of(&other)),
                        });
                    }
                }
                Ok(group)
            }
            Value::Object(_) => Ok(Self {
                items: vec![parse_item(0, value)?],
            }),
            other => Err(BarscanError::ConditionParse {
                reason: format!("expected an array of conditions, got {}", kind_of(&other)),
            }),
        }
    }

    pub fn items(&self) -> &[GroupItem] {
        &self.items
    }

    /// Conditions in order, plus the effective logic (last token wins).
    pub fn split(&self) -> (Vec<&Condition>, Logic) {
        let mut conditions = Vec::new();
        let mut logic = Logic::default();
        for item in &self.items {
            match item {
                GroupItem::Condition(c) => conditions.push(c),
                GroupItem::Logic(l) => logic = *l,
            }
        }
        (conditions, logic)
    }

    pub fn logic(&self) -> Logic {
        self.split().1
    }

    pub fn condition_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, GroupItem::Condition(_)))
            .count()
    }

    /// Pre-flight check against the built-in indicator set.
    ///
    /// Unresolvable indicators or fields are errors; suspicious but
    /// evaluatable shapes come back as warnings.
    pub fn validate(&self) -> Result<Vec<String>, BarscanError> {
        let (conditions, logic) = self.split();
        let mut warnings = Vec::new();

        if conditions.is_empty() {
            warnings.push("group has no conditions and always evaluates false".to_string());
        }

        let tokens = self
            .items
            .iter()
            .filter_map(|item| match item {
                GroupItem::Logic(l) => Some(*l),
                GroupItem::Condition(_) => None,
            })
            .collect::<Vec<_>>();
        if tokens.iter().any(|t| *t != logic) {
            warnings.push(format!(
                "mixed AND/OR tokens: only the last one ({logic}) applies to the whole group"
            ));
        }

        for (index, condition) in conditions.iter().enumerate() {
            let kind = IndicatorKind::resolve(&condition.indicator, &condition.params)?;
            if !kind.supports_field(&condition.field) {
                return Err(BarscanError::indicator(
                    &condition.indicator,
                    format!(
                        "unknown field \"{}\" (expected one of: {})",
                        condition.field,
                        kind.fields().join(", ")
                    ),
                ));
            }
            // Crossings read one extra bar.
            let needed = kind
                .warmup()
                .saturating_add(usize::from(condition.operator.is_crossing()));
            if needed > DEFAULT_BAR_LIMIT {
                warnings.push(format!(
                    "condition {index}: {kind} needs {needed} bars but scans load {DEFAULT_BAR_LIMIT} by default"
                ));
            }
            if condition.operator == Operator::Between {
                match condition.value2 {
                    None => warnings.push(format!(
                        "condition {index}: between without value2 never matches"
                    )),
                    Some(upper) if upper < condition.value => warnings.push(format!(
                        "condition {index}: between lower bound {} exceeds upper bound {upper}",
                        condition.value
                    )),
                    Some(_) => {}
                }
            } else if condition.value2.is_some() {
                warnings.push(format!(
                    "condition {index}: value2 is ignored for operator {}",
                    condition.operator
                ));
            }
        }

        Ok(warnings)
    }
}

fn parse_item(index: usize, item: Value) -> Result<GroupItem, BarscanError> {
    match item {
        Value::String(token) => Logic::from_token(&token)
            .map(GroupItem::Logic)
            .ok_or_else(|| BarscanError::ConditionParse {
                reason: format!("item {index}: unknown logic token \"{token}\""),
            }),
        Value::Object(_) => serde_json::from_value::<Condition>(item)
            .map(GroupItem::Condition)
            .map_err(|e| BarscanError::ConditionParse {
                reason: format!("item {index}: {e}"),
            }),
        other => Err(BarscanError::ConditionParse {
            reason: format!("item {index}: expected condition object or logic token, got {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
