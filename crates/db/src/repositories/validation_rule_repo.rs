//! Repository for the validation rule catalog.

use sqlx::PgPool;
use taxroll_core::validation::rules::{NewRule, RuleFilter, RulePatch};

use crate::models::validation::ValidationRuleRow;

/// Column list for `validation_rules` queries.
const RULE_COLUMNS: &str = "id, code, name, description, category, severity, entity_type, \
     check_kind, check_params, reference, is_active, created_by, created_at, updated_at";

/// Provides CRUD operations for validation rules. Rules are deactivated
/// via partial update, never deleted.
pub struct ValidationRuleRepo;

impl ValidationRuleRepo {
    /// Insert a new rule. A duplicate `code` violates
    /// `uq_validation_rules_code` and surfaces as a database error.
    pub async fn insert(pool: &PgPool, input: &NewRule) -> Result<ValidationRuleRow, sqlx::Error> {
        let sql = format!(
            "INSERT INTO validation_rules \
                (code, name, description, category, severity, entity_type, \
                 check_kind, check_params, reference, is_active, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {RULE_COLUMNS}"
        );
        sqlx::query_as::<_, ValidationRuleRow>(&sql)
            .bind(&input.code)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.category.as_str())
            .bind(input.severity.as_str())
            .bind(&input.entity_type)
            .bind(&input.check.kind)
            .bind(&input.check.params)
            .bind(&input.reference)
            .bind(input.is_active)
            .bind(&input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_code(
        pool: &PgPool,
        code: &str,
    ) -> Result<Option<ValidationRuleRow>, sqlx::Error> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM validation_rules WHERE code = $1");
        sqlx::query_as::<_, ValidationRuleRow>(&sql)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    /// List rules ordered by `code`, applying the optional filter fields.
    pub async fn list(
        pool: &PgPool,
        filter: &RuleFilter,
    ) -> Result<Vec<ValidationRuleRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM validation_rules \
             WHERE ($1::TEXT IS NULL OR category = $1) \
               AND ($2::TEXT IS NULL OR entity_type = $2) \
               AND (NOT $3 OR is_active = true) \
             ORDER BY code"
        );
        sqlx::query_as::<_, ValidationRuleRow>(&sql)
            .bind(filter.category.map(|c| c.as_str()))
            .bind(filter.entity_type.as_deref())
            .bind(filter.active_only)
            .fetch_all(pool)
            .await
    }

    /// Apply a partial update. Only non-`None` fields in `patch` change;
    /// `code` is immutable. Returns `None` if no rule with `code` exists.
    pub async fn update(
        pool: &PgPool,
        code: &str,
        patch: &RulePatch,
    ) -> Result<Option<ValidationRuleRow>, sqlx::Error> {
        let (check_kind, check_params) = match &patch.check {
            Some(check) => (Some(check.kind.clone()), Some(check.params.clone())),
            None => (None, None),
        };
        let sql = format!(
            "UPDATE validation_rules SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                category = COALESCE($4, category), \
                severity = COALESCE($5, severity), \
                check_kind = COALESCE($6, check_kind), \
                check_params = COALESCE($7, check_params), \
                reference = COALESCE($8, reference), \
                is_active = COALESCE($9, is_active), \
                updated_at = now() \
             WHERE code = $1 \
             RETURNING {RULE_COLUMNS}"
        );
        sqlx::query_as::<_, ValidationRuleRow>(&sql)
            .bind(code)
            .bind(&patch.name)
            .bind(&patch.description)
            .bind(patch.category.map(|c| c.as_str()))
            .bind(patch.severity.map(|s| s.as_str()))
            .bind(check_kind)
            .bind(check_params)
            .bind(&patch.reference)
            .bind(patch.is_active)
            .fetch_optional(pool)
            .await
    }
}
