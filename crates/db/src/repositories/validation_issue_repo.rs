//! Repository for validation issues.

use sqlx::PgPool;
use taxroll_core::property::ValidationStatus;
use taxroll_core::types::{DbId, Timestamp};
use taxroll_core::validation::issue::{IssueFilter, IssueStatus, IssueTransition};
use taxroll_core::validation::recording::{IssueWritePlan, SUPERSEDED_RESOLUTION};

use crate::models::validation::ValidationIssueRow;

/// Column list for `validation_issues` queries.
const ISSUE_COLUMNS: &str = "id, property_id, rule_code, severity, message, detected_at, \
     status, resolution, resolved_by, resolved_at, superseded_by";

/// Provides persistence for recorded rule violations.
pub struct ValidationIssueRepo;

impl ValidationIssueRepo {
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ValidationIssueRow>, sqlx::Error> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM validation_issues WHERE id = $1");
        sqlx::query_as::<_, ValidationIssueRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_property(
        pool: &PgPool,
        property_id: DbId,
        status: Option<IssueStatus>,
    ) -> Result<Vec<ValidationIssueRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM validation_issues \
             WHERE property_id = $1 \
               AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, ValidationIssueRow>(&sql)
            .bind(property_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(pool)
            .await
    }

    /// Non-terminal issues for a property (open or acknowledged).
    pub async fn list_outstanding(
        pool: &PgPool,
        property_id: DbId,
    ) -> Result<Vec<ValidationIssueRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM validation_issues \
             WHERE property_id = $1 AND status IN ('open', 'acknowledged') \
             ORDER BY id"
        );
        sqlx::query_as::<_, ValidationIssueRow>(&sql)
            .bind(property_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_outstanding(pool: &PgPool, property_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM validation_issues \
             WHERE property_id = $1 AND status IN ('open', 'acknowledged')",
        )
        .bind(property_id)
        .fetch_one(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &IssueFilter,
    ) -> Result<Vec<ValidationIssueRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM validation_issues \
             WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ValidationIssueRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.limit.unwrap_or(100))
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(pool)
            .await
    }

    /// Guarded status transition: the update only applies while the row is
    /// still in `expected` status, so two concurrent transitions cannot
    /// both win. Returns `None` when the row is missing or was moved by a
    /// concurrent writer.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        expected: IssueStatus,
        transition: &IssueTransition,
        at: Timestamp,
    ) -> Result<Option<ValidationIssueRow>, sqlx::Error> {
        let terminal = transition.status.is_terminal();
        let sql = format!(
            "UPDATE validation_issues SET \
                status = $3, \
                resolution = COALESCE($4, resolution), \
                resolved_by = CASE WHEN $5 THEN $6 ELSE resolved_by END, \
                resolved_at = CASE WHEN $5 THEN $7 ELSE resolved_at END, \
                updated_at = now() \
             WHERE id = $1 AND status = $2 \
             RETURNING {ISSUE_COLUMNS}"
        );
        sqlx::query_as::<_, ValidationIssueRow>(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(transition.status.as_str())
            .bind(&transition.resolution)
            .bind(terminal)
            .bind(&transition.actor)
            .bind(at)
            .fetch_optional(pool)
            .await
    }

    /// Apply one property's evaluation atomically: insert new issues,
    /// close superseded ones (linked to their replacements), and rewrite
    /// the denormalized validation fields on the property row. Either the
    /// whole evaluation commits or none of it does.
    pub async fn apply_evaluation(
        pool: &PgPool,
        property_id: DbId,
        plan: &IssueWritePlan,
        status: ValidationStatus,
        validated_at: Timestamp,
    ) -> Result<Vec<ValidationIssueRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let insert_sql = format!(
            "INSERT INTO validation_issues \
                (property_id, rule_code, severity, message, detected_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ISSUE_COLUMNS}"
        );
        let mut inserted = Vec::with_capacity(plan.append.len());
        for draft in &plan.append {
            let row = sqlx::query_as::<_, ValidationIssueRow>(&insert_sql)
                .bind(property_id)
                .bind(&draft.rule_code)
                .bind(draft.severity.as_str())
                .bind(&draft.message)
                .bind(validated_at)
                .fetch_one(&mut *tx)
                .await?;
            inserted.push(row);
        }

        for supersession in &plan.supersede {
            let replacement_id = inserted[supersession.replacement].id;
            sqlx::query(
                "UPDATE validation_issues SET \
                    status = 'resolved', \
                    resolution = $2, \
                    resolved_at = $3, \
                    superseded_by = $4, \
                    updated_at = now() \
                 WHERE id = $1",
            )
            .bind(supersession.issue_id)
            .bind(SUPERSEDED_RESOLUTION)
            .bind(validated_at)
            .bind(replacement_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE properties SET \
                validation_status = $2, \
                open_issue_count = $3, \
                last_validated_at = $4 \
             WHERE id = $1",
        )
        .bind(property_id)
        .bind(status.as_str())
        .bind(plan.outstanding_after)
        .bind(validated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }
}
