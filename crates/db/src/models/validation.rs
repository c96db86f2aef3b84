//! Row models for the validation rule catalog and issue tables.

use sqlx::FromRow;
use taxroll_core::error::CoreError;
use taxroll_core::types::{DbId, Timestamp};
use taxroll_core::validation::issue::{IssueStatus, ValidationIssue};
use taxroll_core::validation::rules::{CheckSpec, RuleCategory, Severity, ValidationRule};

/// A row from the `validation_rules` table.
#[derive(Debug, Clone, FromRow)]
pub struct ValidationRuleRow {
    pub id: DbId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub severity: String,
    pub entity_type: String,
    pub check_kind: String,
    pub check_params: serde_json::Value,
    pub reference: Option<String>,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ValidationRuleRow {
    pub fn into_rule(self) -> Result<ValidationRule, CoreError> {
        let category = RuleCategory::from_str(&self.category)
            .map_err(|e| CoreError::Internal(format!("Bad row for rule {}: {e}", self.code)))?;
        let severity = Severity::from_str(&self.severity)
            .map_err(|e| CoreError::Internal(format!("Bad row for rule {}: {e}", self.code)))?;
        Ok(ValidationRule {
            id: self.id,
            code: self.code,
            name: self.name,
            description: self.description,
            category,
            severity,
            entity_type: self.entity_type,
            check: CheckSpec {
                kind: self.check_kind,
                params: self.check_params,
            },
            reference: self.reference,
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A row from the `validation_issues` table.
#[derive(Debug, Clone, FromRow)]
pub struct ValidationIssueRow {
    pub id: DbId,
    pub property_id: DbId,
    pub rule_code: String,
    pub severity: String,
    pub message: String,
    pub detected_at: Timestamp,
    pub status: String,
    pub resolution: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub superseded_by: Option<DbId>,
}

impl ValidationIssueRow {
    pub fn into_issue(self) -> Result<ValidationIssue, CoreError> {
        let severity = Severity::from_str(&self.severity)
            .map_err(|e| CoreError::Internal(format!("Bad row for issue {}: {e}", self.id)))?;
        let status = IssueStatus::from_str(&self.status)
            .map_err(|e| CoreError::Internal(format!("Bad row for issue {}: {e}", self.id)))?;
        Ok(ValidationIssue {
            id: self.id,
            property_id: self.property_id,
            rule_code: self.rule_code,
            severity,
            message: self.message,
            detected_at: self.detected_at,
            status,
            resolution: self.resolution,
            resolved_by: self.resolved_by,
            resolved_at: self.resolved_at,
            superseded_by: self.superseded_by,
        })
    }
}
