//! Condition evaluation engine.
//!
//! Evaluates one [`Condition`], or a flat AND/OR [`ConditionGroup`], against
//! a bar series through an [`IndicatorPort`].
//!
//! # Evaluation Semantics
//!
//! - Scalar operators read the single latest indicator value.
//! - `crosses_above`: `prev <= target && curr > target` over the last 2 values.
//! - `crosses_below`: `prev >= target && curr < target` over the last 2 values.
//! - `==` uses an absolute tolerance of [`EQ_TOLERANCE`].
//! - `between` is inclusive on both ends and never matches without `value2`.
//! - A group evaluates every condition (no short-circuit) so the caller gets a
//!   full detail list either way. An empty group is `false`.
//!
//! Failures never escape: an indicator error becomes `met = false` with the
//! error text on the detail.

use crate::domain::condition::{Condition, ConditionGroup, Logic, Operator};
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::indicator_port::IndicatorPort;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const EQ_TOLERANCE: f64 = 0.0001;

pub const INSUFFICIENT_CROSSING_DATA: &str = "Insufficient data for crossing detection";
pub const NO_VALUE: &str = "Indicator returned NaN";
pub const MISSING_UPPER_BOUND: &str = "between requires value2";

/// One condition's outcome.
///
/// On the wire `prev_value` is present (possibly `null`) exactly when the
/// operator is a crossing, and `error` only when set.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationDetail {
    pub met: bool,
    pub indicator: String,
    pub field: String,
    pub computed_value: Option<f64>,
    pub operator: Operator,
    pub target: f64,
    pub prev_value: Option<f64>,
    pub error: Option<String>,
}

impl Serialize for EvaluationDetail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("met", &self.met)?;
        map.serialize_entry("indicator", &self.indicator)?;
        map.serialize_entry("field", &self.field)?;
        map.serialize_entry("computed_value", &self.computed_value)?;
        map.serialize_entry("operator", &self.operator)?;
        map.serialize_entry("target", &self.target)?;
        if self.operator.is_crossing() {
            map.serialize_entry("prev_value", &self.prev_value)?;
        }
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
        }
        map.end()
    }
}

impl EvaluationDetail {
    fn pending(condition: &Condition) -> Self {
        Self {
            met: false,
            indicator: condition.indicator.clone(),
            field: condition.field.clone(),
            computed_value: None,
            operator: condition.operator,
            target: condition.value,
            prev_value: None,
            error: None,
        }
    }

    fn failed(mut self, error: impl Into<String>) -> Self {
        self.met = false;
        self.error = Some(error.into());
        self
    }

    /// True when the value could not be computed, as opposed to a
    /// legitimately unmet condition.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupEvaluation {
    pub result: bool,
    pub details: Vec<EvaluationDetail>,
    pub logic: Logic,
}

pub fn evaluate_condition(
    condition: &Condition,
    bars: &[OhlcvBar],
    indicators: &dyn IndicatorPort,
) -> EvaluationDetail {
    if condition.operator.is_crossing() {
        evaluate_crossing(condition, bars, indicators)
    } else {
        evaluate_scalar(condition, bars, indicators)
    }
}

fn evaluate_crossing(
    condition: &Condition,
    bars: &[OhlcvBar],
    indicators: &dyn IndicatorPort,
) -> EvaluationDetail {
    let mut detail = EvaluationDetail::pending(condition);

    let values = match indicators.last_n_values(
        &condition.indicator,
        bars,
        &condition.params,
        &condition.field,
        2,
    ) {
        Ok(values) => values,
        Err(e) => return detail.failed(e.to_string()),
    };

    let (prev, curr) = match values.as_slice() {
        [.., Some(prev), Some(curr)] => (*prev, *curr),
        _ => {
            detail.computed_value = values.last().copied().flatten();
            return detail.failed(INSUFFICIENT_CROSSING_DATA);
        }
    };

    let target = condition.value;
    detail.met = match condition.operator {
        Operator::CrossesAbove => prev <= target && curr > target,
        Operator::CrossesBelow => prev >= target && curr < target,
        _ => false,
    };
    detail.prev_value = Some(prev);
    detail.computed_value = Some(curr);
    detail
}

fn evaluate_scalar(
    condition: &Condition,
    bars: &[OhlcvBar],
    indicators: &dyn IndicatorPort,
) -> EvaluationDetail {
    let mut detail = EvaluationDetail::pending(condition);

    let computed = match indicators.latest_value(
        &condition.indicator,
        bars,
        &condition.params,
        &condition.field,
    ) {
        Ok(Some(v)) if v.is_finite() => v,
        Ok(_) => return detail.failed(NO_VALUE),
        Err(e) => return detail.failed(e.to_string()),
    };
    detail.computed_value = Some(computed);

    let target = condition.value;
    detail.met = match condition.operator {
        Operator::Gt => computed > target,
        Operator::Lt => computed < target,
        Operator::Gte => computed >= target,
        Operator::Lte => computed <= target,
        Operator::Eq => (computed - target).abs() < EQ_TOLERANCE,
        Operator::Between => match condition.value2 {
            Some(upper) => target <= computed && computed <= upper,
            None => return detail.failed(MISSING_UPPER_BOUND),
        },
        Operator::CrossesAbove | Operator::CrossesBelow => false,
    };
    detail
}

pub fn evaluate_group(
    group: &ConditionGroup,
    bars: &[OhlcvBar],
    indicators: &dyn IndicatorPort,
) -> GroupEvaluation {
    let (conditions, logic) = group.split();
    if conditions.is_empty() {
        return GroupEvaluation {
            result: false,
            details: Vec::new(),
            logic,
        };
    }

    let details: Vec<EvaluationDetail> = conditions
        .iter()
        .map(|c| evaluate_condition(c, bars, indicators))
        .collect();
    let flags: Vec<bool> = details.iter().map(|d| d.met).collect();

    tracing::debug!(
        conditions = details.len(),
        met = flags.iter().filter(|m| **m).count(),
        %logic,
        "evaluated condition group"
    );

    GroupEvaluation {
        result: logic.combine(&flags),
        details,
        logic,
    }
}
