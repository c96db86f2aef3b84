//! Jurisdiction-specific rule sets layered onto the base catalog.

pub mod washington;

use serde_json::Value;

use crate::validation::rules::{
    CheckSpec, NewRule, RuleCategory, Severity, ValidationRule, ENTITY_TYPE_PROPERTY,
};

/// A seed definition for one jurisdiction rule. Converted to a [`NewRule`]
/// when the catalog is initialized at startup.
#[derive(Debug, Clone)]
pub struct RuleSeed {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: RuleCategory,
    pub severity: Severity,
    pub check_kind: &'static str,
    pub check_params: Value,
    pub reference: Option<&'static str>,
}

impl RuleSeed {
    pub fn check(&self) -> CheckSpec {
        CheckSpec {
            kind: self.check_kind.to_string(),
            params: self.check_params.clone(),
        }
    }

    pub fn to_new_rule(&self, created_by: &str) -> NewRule {
        NewRule {
            code: self.code.to_string(),
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            category: self.category,
            severity: self.severity,
            entity_type: ENTITY_TYPE_PROPERTY.to_string(),
            check: self.check(),
            reference: self.reference.map(str::to_string),
            is_active: true,
            created_by: Some(created_by.to_string()),
        }
    }

    /// Whether an existing catalog rule still carries this seed's content.
    /// Used by idempotent seeding to distinguish "already seeded" from
    /// "edited by an operator" (edits are never clobbered).
    pub fn matches(&self, rule: &ValidationRule) -> bool {
        rule.name == self.name
            && rule.description.as_deref() == Some(self.description)
            && rule.category == self.category
            && rule.severity == self.severity
            && rule.entity_type == ENTITY_TYPE_PROPERTY
            && rule.check == self.check()
            && rule.reference.as_deref() == self.reference
            && rule.is_active
    }
}
