//! Validation rule catalog types.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Entity type for assessment roll property records. The catalog is keyed
/// by entity type so other record kinds can carry their own rule sets.
pub const ENTITY_TYPE_PROPERTY: &str = "property";

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How serious a rule violation is. Copied onto issues at detection time,
/// so a later rule edit never rewrites historical issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: &'static [Severity] = &[
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(CoreError::Validation(format!("Unknown severity: '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// What aspect of data quality a rule guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// A required field is present.
    Completeness,
    /// Fields agree with each other (sums, ratios, formats).
    Consistency,
    /// A statutory constraint holds.
    Regulatory,
}

impl RuleCategory {
    pub const ALL: &'static [RuleCategory] = &[
        RuleCategory::Completeness,
        RuleCategory::Consistency,
        RuleCategory::Regulatory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Completeness => "completeness",
            RuleCategory::Consistency => "consistency",
            RuleCategory::Regulatory => "regulatory",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "completeness" => Ok(RuleCategory::Completeness),
            "consistency" => Ok(RuleCategory::Consistency),
            "regulatory" => Ok(RuleCategory::Regulatory),
            other => Err(CoreError::Validation(format!(
                "Unknown rule category: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule entity
// ---------------------------------------------------------------------------

/// The stored implementation reference: a check kind name plus its
/// parameters. Resolved to an executable check by
/// [`crate::validation::checks::CheckKind::parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A validation rule as stored in the catalog.
///
/// `code` is the stable external identifier (unique within the catalog,
/// immutable after registration); `id` is the internal numeric key.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRule {
    pub id: DbId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: RuleCategory,
    pub severity: Severity,
    pub entity_type: String,
    pub check: CheckSpec,
    /// Statute or citation backing the rule, e.g. "RCW 84.40.020".
    pub reference: Option<String>,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn default_entity_type() -> String {
    ENTITY_TYPE_PROPERTY.to_string()
}

fn default_is_active() -> bool {
    true
}

/// DTO for registering a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRule {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: RuleCategory,
    pub severity: Severity,
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
    pub check: CheckSpec,
    pub reference: Option<String>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    pub created_by: Option<String>,
}

/// DTO for partial rule updates. `code` is immutable and absent by design.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<RuleCategory>,
    pub severity: Option<Severity>,
    pub check: Option<CheckSpec>,
    pub reference: Option<String>,
    pub is_active: Option<bool>,
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.severity.is_none()
            && self.check.is_none()
            && self.reference.is_none()
            && self.is_active.is_none()
    }
}

/// Filter for listing catalog rules.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub category: Option<RuleCategory>,
    pub entity_type: Option<String>,
    pub active_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn severity_round_trips_through_strings() {
        for severity in Severity::ALL {
            assert_eq!(Severity::from_str(severity.as_str()).unwrap(), *severity);
        }
    }

    #[test]
    fn category_round_trips_through_strings() {
        for category in RuleCategory::ALL {
            assert_eq!(RuleCategory::from_str(category.as_str()).unwrap(), *category);
        }
    }

    #[test]
    fn unknown_severity_rejected() {
        assert_matches!(Severity::from_str("fatal"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn new_rule_deserializes_with_defaults() {
        let rule: NewRule = serde_json::from_value(serde_json::json!({
            "code": "R1",
            "name": "Assessed value non-negative",
            "category": "regulatory",
            "severity": "error",
            "check": { "kind": "non_negative", "params": { "field": "assessed_value" } }
        }))
        .unwrap();
        assert_eq!(rule.entity_type, ENTITY_TYPE_PROPERTY);
        assert!(rule.is_active);
    }
}
