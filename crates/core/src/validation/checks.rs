//! The closed set of executable rule checks.
//!
//! A rule's stored [`CheckSpec`] names one of the kinds below plus its
//! parameters. Specs are resolved once per run by [`CheckKind::parse`];
//! anything unresolvable (unknown kind, unknown field, bad parameters,
//! invalid regex) is a [`CoreError::Configuration`] and the rule is
//! skipped, never executed.
//!
//! Execution returns `Ok(None)` on pass, `Ok(Some(message))` on violation
//! (the message embeds the offending value), or `Err(CheckError)` when the
//! check cannot be computed for this record. Missing optional fields pass
//! every check except `required`.

use chrono::Datelike;
use regex::Regex;

use crate::error::CoreError;
use crate::property::{is_property_field, FieldValue, PropertyRecord};
use crate::validation::evaluator::EvaluationContext;
use crate::validation::rules::CheckSpec;

/// A check failed to execute against a specific record (type mismatch,
/// division by zero). Surfaced as a per-rule diagnostic, never a panic.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CheckError(pub String);

/// Comparison operator for `compare_fields`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl CompareOp {
    fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "lt" => Ok(CompareOp::Lt),
            "le" => Ok(CompareOp::Le),
            "eq" => Ok(CompareOp::Eq),
            "ge" => Ok(CompareOp::Ge),
            "gt" => Ok(CompareOp::Gt),
            other => Err(CoreError::Configuration(format!(
                "Unknown comparison operator: '{other}'"
            ))),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
        }
    }

    fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
            CompareOp::Ge => left >= right,
            CompareOp::Gt => left > right,
        }
    }
}

/// A compiled, executable check.
#[derive(Debug)]
pub enum CheckKind {
    /// Field must be present and, for text, non-empty.
    Required { field: String },
    /// Numeric field must be >= 0.
    NonNegative { field: String },
    /// Numeric field must be >= `min`.
    MinValue { field: String, min: f64 },
    /// Numeric field must be <= `max`.
    MaxValue { field: String, max: f64 },
    /// Text field must match an anchored regex.
    Pattern {
        field: String,
        pattern: String,
        regex: Regex,
    },
    /// Text field must be one of an allowed vocabulary.
    OneOf { field: String, allowed: Vec<String> },
    /// Two numeric fields must satisfy a comparison.
    CompareFields {
        left: String,
        op: CompareOp,
        right: String,
    },
    /// Component fields must sum to a total field within `tolerance`.
    SumMatches {
        components: Vec<String>,
        total: String,
        tolerance: f64,
    },
    /// Integer year field must fall within a window around the evaluation
    /// date's year: `[year - past, year + future]`.
    YearWithin {
        field: String,
        past: i32,
        future: i32,
    },
    /// Date field must not be after the evaluation date.
    DateNotInFuture { field: String },
    /// Ratio of two numeric fields must fall within `[min, max]`.
    RatioWithin {
        numerator: String,
        denominator: String,
        min: f64,
        max: f64,
    },
}

// ---------------------------------------------------------------------------
// Parameter extraction helpers
// ---------------------------------------------------------------------------

fn param_field(params: &serde_json::Value, key: &str) -> Result<String, CoreError> {
    let name = params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::Configuration(format!("Missing '{key}' parameter")))?;
    if !is_property_field(name) {
        return Err(CoreError::Configuration(format!(
            "Unknown property field: '{name}'"
        )));
    }
    Ok(name.to_string())
}

fn param_f64(params: &serde_json::Value, key: &str) -> Result<f64, CoreError> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| CoreError::Configuration(format!("Missing numeric '{key}' parameter")))
}

fn param_i32_or(params: &serde_json::Value, key: &str, default: i32) -> Result<i32, CoreError> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| {
                CoreError::Configuration(format!("'{key}' must be an integer in i32 range"))
            }),
    }
}

fn param_f64_or(params: &serde_json::Value, key: &str, default: f64) -> Result<f64, CoreError> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| CoreError::Configuration(format!("'{key}' must be a number"))),
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl CheckKind {
    /// Resolve a stored check spec to an executable check.
    pub fn parse(spec: &CheckSpec) -> Result<CheckKind, CoreError> {
        let params = &spec.params;
        match spec.kind.as_str() {
            "required" => Ok(CheckKind::Required {
                field: param_field(params, "field")?,
            }),
            "non_negative" => Ok(CheckKind::NonNegative {
                field: param_field(params, "field")?,
            }),
            "min_value" => Ok(CheckKind::MinValue {
                field: param_field(params, "field")?,
                min: param_f64(params, "min")?,
            }),
            "max_value" => Ok(CheckKind::MaxValue {
                field: param_field(params, "field")?,
                max: param_f64(params, "max")?,
            }),
            "pattern" => {
                let field = param_field(params, "field")?;
                let pattern = params
                    .get("pattern")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        CoreError::Configuration("Missing 'pattern' parameter".to_string())
                    })?
                    .to_string();
                let regex = Regex::new(&pattern).map_err(|e| {
                    CoreError::Configuration(format!("Invalid regex '{pattern}': {e}"))
                })?;
                Ok(CheckKind::Pattern {
                    field,
                    pattern,
                    regex,
                })
            }
            "one_of" => {
                let field = param_field(params, "field")?;
                let allowed: Vec<String> = params
                    .get("values")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                if allowed.is_empty() {
                    return Err(CoreError::Configuration(
                        "'values' must be a non-empty array of strings".to_string(),
                    ));
                }
                Ok(CheckKind::OneOf { field, allowed })
            }
            "compare_fields" => {
                let op = params
                    .get("op")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CoreError::Configuration("Missing 'op' parameter".to_string()))
                    .and_then(CompareOp::parse)?;
                Ok(CheckKind::CompareFields {
                    left: param_field(params, "left")?,
                    op,
                    right: param_field(params, "right")?,
                })
            }
            "sum_matches" => {
                let components: Vec<String> = params
                    .get("components")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                if components.len() < 2 {
                    return Err(CoreError::Configuration(
                        "'components' must list at least two fields".to_string(),
                    ));
                }
                for name in &components {
                    if !is_property_field(name) {
                        return Err(CoreError::Configuration(format!(
                            "Unknown property field: '{name}'"
                        )));
                    }
                }
                Ok(CheckKind::SumMatches {
                    components,
                    total: param_field(params, "total")?,
                    tolerance: param_f64_or(params, "tolerance", 0.0)?,
                })
            }
            "year_within" => Ok(CheckKind::YearWithin {
                field: param_field(params, "field")?,
                past: param_i32_or(params, "past", 1)?,
                future: param_i32_or(params, "future", 1)?,
            }),
            "date_not_in_future" => Ok(CheckKind::DateNotInFuture {
                field: param_field(params, "field")?,
            }),
            "ratio_within" => Ok(CheckKind::RatioWithin {
                numerator: param_field(params, "numerator")?,
                denominator: param_field(params, "denominator")?,
                min: param_f64(params, "min")?,
                max: param_f64(params, "max")?,
            }),
            other => Err(CoreError::Configuration(format!(
                "Unknown check kind: '{other}'"
            ))),
        }
    }

    /// The property fields this check reads. Used to narrow a run to rules
    /// touching a caller-supplied field list.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            CheckKind::Required { field }
            | CheckKind::NonNegative { field }
            | CheckKind::MinValue { field, .. }
            | CheckKind::MaxValue { field, .. }
            | CheckKind::Pattern { field, .. }
            | CheckKind::OneOf { field, .. }
            | CheckKind::YearWithin { field, .. }
            | CheckKind::DateNotInFuture { field } => vec![field],
            CheckKind::CompareFields { left, right, .. } => vec![left, right],
            CheckKind::SumMatches {
                components, total, ..
            } => {
                let mut fields: Vec<&str> = components.iter().map(String::as_str).collect();
                fields.push(total);
                fields
            }
            CheckKind::RatioWithin {
                numerator,
                denominator,
                ..
            } => vec![numerator, denominator],
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

fn fetch(record: &PropertyRecord, field: &str) -> Result<Option<FieldValue>, CheckError> {
    record
        .field(field)
        .map_err(|e| CheckError(format!("Field lookup failed: {e}")))
}

fn fetch_number(record: &PropertyRecord, field: &str) -> Result<Option<f64>, CheckError> {
    match fetch(record, field)? {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| CheckError(format!("Field '{field}' is not numeric (was {value})"))),
    }
}

fn fetch_text(record: &PropertyRecord, field: &str) -> Result<Option<String>, CheckError> {
    match fetch(record, field)? {
        None => Ok(None),
        Some(value) => value
            .as_text()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| CheckError(format!("Field '{field}' is not text (was {value})"))),
    }
}

impl CheckKind {
    /// Run the check against one record.
    pub fn execute(
        &self,
        record: &PropertyRecord,
        ctx: &EvaluationContext,
    ) -> Result<Option<String>, CheckError> {
        match self {
            CheckKind::Required { field } => match fetch(record, field)? {
                None => Ok(Some(format!("{field} is required but missing"))),
                Some(FieldValue::Text(s)) if s.trim().is_empty() => {
                    Ok(Some(format!("{field} is required but empty")))
                }
                Some(_) => Ok(None),
            },

            CheckKind::NonNegative { field } => match fetch_number(record, field)? {
                Some(v) if v < 0.0 => Ok(Some(format!("{field} must be >= 0 but was {v}"))),
                _ => Ok(None),
            },

            CheckKind::MinValue { field, min } => match fetch_number(record, field)? {
                Some(v) if v < *min => {
                    Ok(Some(format!("{field} must be >= {min} but was {v}")))
                }
                _ => Ok(None),
            },

            CheckKind::MaxValue { field, max } => match fetch_number(record, field)? {
                Some(v) if v > *max => {
                    Ok(Some(format!("{field} must be <= {max} but was {v}")))
                }
                _ => Ok(None),
            },

            CheckKind::Pattern {
                field,
                pattern,
                regex,
            } => match fetch_text(record, field)? {
                Some(s) if !regex.is_match(&s) => Ok(Some(format!(
                    "{field} must match pattern '{pattern}' but was '{s}'"
                ))),
                _ => Ok(None),
            },

            CheckKind::OneOf { field, allowed } => match fetch_text(record, field)? {
                Some(s) if !allowed.contains(&s) => Ok(Some(format!(
                    "{field} must be one of [{}] but was '{s}'",
                    allowed.join(", ")
                ))),
                _ => Ok(None),
            },

            CheckKind::CompareFields { left, op, right } => {
                let (lv, rv) = match (
                    fetch_number(record, left)?,
                    fetch_number(record, right)?,
                ) {
                    (Some(l), Some(r)) => (l, r),
                    _ => return Ok(None),
                };
                if op.holds(lv, rv) {
                    Ok(None)
                } else {
                    Ok(Some(format!(
                        "{left} ({lv}) must be {} {right} ({rv})",
                        op.as_str()
                    )))
                }
            }

            CheckKind::SumMatches {
                components,
                total,
                tolerance,
            } => {
                let mut sum = 0.0;
                for name in components {
                    match fetch_number(record, name)? {
                        Some(v) => sum += v,
                        None => return Ok(None),
                    }
                }
                let expected = match fetch_number(record, total)? {
                    Some(v) => v,
                    None => return Ok(None),
                };
                if (sum - expected).abs() > *tolerance {
                    Ok(Some(format!(
                        "[{}] sum to {sum} but {total} is {expected}",
                        components.join(" + ")
                    )))
                } else {
                    Ok(None)
                }
            }

            CheckKind::YearWithin {
                field,
                past,
                future,
            } => {
                let year = match fetch_number(record, field)? {
                    Some(v) => v as i32,
                    None => return Ok(None),
                };
                let current = ctx.today.year();
                if year < current - past || year > current + future {
                    Ok(Some(format!(
                        "{field} must be between {} and {} but was {year}",
                        current - past,
                        current + future
                    )))
                } else {
                    Ok(None)
                }
            }

            CheckKind::DateNotInFuture { field } => match fetch(record, field)? {
                None => Ok(None),
                Some(value) => {
                    let date = value.as_date().ok_or_else(|| {
                        CheckError(format!("Field '{field}' is not a date (was {value})"))
                    })?;
                    if date > ctx.today {
                        Ok(Some(format!(
                            "{field} must not be in the future but was {date}"
                        )))
                    } else {
                        Ok(None)
                    }
                }
            },

            CheckKind::RatioWithin {
                numerator,
                denominator,
                min,
                max,
            } => {
                let (num, den) = match (
                    fetch_number(record, numerator)?,
                    fetch_number(record, denominator)?,
                ) {
                    (Some(n), Some(d)) => (n, d),
                    _ => return Ok(None),
                };
                if den == 0.0 {
                    return Err(CheckError(format!(
                        "Cannot compute {numerator}/{denominator}: {denominator} is zero"
                    )));
                }
                let ratio = num / den;
                if ratio < *min || ratio > *max {
                    Ok(Some(format!(
                        "{numerator}/{denominator} must be between {min} and {max} but was {ratio:.3}"
                    )))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
