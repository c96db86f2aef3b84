//! Postgres-backed [`PropertyStore`] delegating to the `taxroll-db`
//! repositories.

use async_trait::async_trait;

use taxroll_core::error::CoreError;
use taxroll_core::property::{PropertyRecord, ValidationStatus};
use taxroll_core::types::{DbId, Timestamp};
use taxroll_core::validation::issue::{
    IssueFilter, IssueStatus, IssueTransition, ValidationIssue,
};
use taxroll_core::validation::recording::IssueWritePlan;
use taxroll_core::validation::rules::{NewRule, RuleFilter, RulePatch, ValidationRule};
use taxroll_db::repositories::{PropertyRepo, ValidationIssueRepo, ValidationRuleRepo};
use taxroll_db::DbPool;

use super::{PropertyFilter, PropertyStore, StoreError};

/// Production store over a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Classify a sqlx failure: connectivity problems mean the whole backend
/// is out (batch runs abort), unique violations are conflicts, and
/// anything else is a per-operation backend error.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn map_core(err: CoreError) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl PropertyStore for PgStore {
    async fn property_by_id(&self, id: DbId) -> Result<Option<PropertyRecord>, StoreError> {
        PropertyRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_sqlx)?
            .map(|row| row.into_record().map_err(map_core))
            .transpose()
    }

    async fn property_by_parcel(
        &self,
        parcel_number: &str,
    ) -> Result<Option<PropertyRecord>, StoreError> {
        PropertyRepo::find_by_parcel(&self.pool, parcel_number)
            .await
            .map_err(map_sqlx)?
            .map(|row| row.into_record().map_err(map_core))
            .transpose()
    }

    async fn count_properties(&self) -> Result<i64, StoreError> {
        PropertyRepo::count(&self.pool).await.map_err(map_sqlx)
    }

    async fn properties_page(
        &self,
        after_id: DbId,
        limit: i64,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        PropertyRepo::list_page(&self.pool, after_id, limit)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(|row| row.into_record().map_err(map_core))
            .collect()
    }

    async fn list_properties(
        &self,
        filter: &PropertyFilter,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        PropertyRepo::list(
            &self.pool,
            filter.validation_status,
            filter.limit.unwrap_or(100),
            filter.offset.unwrap_or(0),
        )
        .await
        .map_err(map_sqlx)?
        .into_iter()
        .map(|row| row.into_record().map_err(map_core))
        .collect()
    }

    async fn update_validation_status(
        &self,
        property_id: DbId,
        status: ValidationStatus,
        open_issue_count: i32,
        last_validated_at: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        let updated = PropertyRepo::update_validation_status(
            &self.pool,
            property_id,
            status,
            open_issue_count,
            last_validated_at,
        )
        .await
        .map_err(map_sqlx)?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "Property",
                key: property_id.to_string(),
            })
        }
    }

    async fn insert_rule(&self, rule: &NewRule) -> Result<ValidationRule, StoreError> {
        ValidationRuleRepo::insert(&self.pool, rule)
            .await
            .map_err(map_sqlx)?
            .into_rule()
            .map_err(map_core)
    }

    async fn rule_by_code(&self, code: &str) -> Result<Option<ValidationRule>, StoreError> {
        ValidationRuleRepo::find_by_code(&self.pool, code)
            .await
            .map_err(map_sqlx)?
            .map(|row| row.into_rule().map_err(map_core))
            .transpose()
    }

    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<ValidationRule>, StoreError> {
        ValidationRuleRepo::list(&self.pool, filter)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(|row| row.into_rule().map_err(map_core))
            .collect()
    }

    async fn update_rule(
        &self,
        code: &str,
        patch: &RulePatch,
    ) -> Result<Option<ValidationRule>, StoreError> {
        ValidationRuleRepo::update(&self.pool, code, patch)
            .await
            .map_err(map_sqlx)?
            .map(|row| row.into_rule().map_err(map_core))
            .transpose()
    }

    async fn issue_by_id(&self, id: DbId) -> Result<Option<ValidationIssue>, StoreError> {
        ValidationIssueRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_sqlx)?
            .map(|row| row.into_issue().map_err(map_core))
            .transpose()
    }

    async fn issues_for_property(
        &self,
        property_id: DbId,
        status: Option<IssueStatus>,
    ) -> Result<Vec<ValidationIssue>, StoreError> {
        ValidationIssueRepo::list_for_property(&self.pool, property_id, status)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(|row| row.into_issue().map_err(map_core))
            .collect()
    }

    async fn outstanding_issues(
        &self,
        property_id: DbId,
    ) -> Result<Vec<ValidationIssue>, StoreError> {
        ValidationIssueRepo::list_outstanding(&self.pool, property_id)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(|row| row.into_issue().map_err(map_core))
            .collect()
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<ValidationIssue>, StoreError> {
        ValidationIssueRepo::list(&self.pool, filter)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(|row| row.into_issue().map_err(map_core))
            .collect()
    }

    async fn transition_issue(
        &self,
        id: DbId,
        expected: IssueStatus,
        transition: &IssueTransition,
        at: Timestamp,
    ) -> Result<Option<ValidationIssue>, StoreError> {
        ValidationIssueRepo::transition(&self.pool, id, expected, transition, at)
            .await
            .map_err(map_sqlx)?
            .map(|row| row.into_issue().map_err(map_core))
            .transpose()
    }

    async fn apply_evaluation(
        &self,
        property_id: DbId,
        plan: &IssueWritePlan,
        status: ValidationStatus,
        validated_at: Timestamp,
    ) -> Result<Vec<ValidationIssue>, StoreError> {
        ValidationIssueRepo::apply_evaluation(&self.pool, property_id, plan, status, validated_at)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(|row| row.into_issue().map_err(map_core))
            .collect()
    }
}
