//! The storage collaborator boundary.
//!
//! The engine never talks to a database directly; everything goes through
//! [`PropertyStore`]. Production uses [`postgres::PgStore`]; tests and
//! embedded use run on [`memory::MemoryStore`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use taxroll_core::property::{PropertyRecord, ValidationStatus};
use taxroll_core::types::{DbId, Timestamp};
use taxroll_core::validation::issue::{
    IssueFilter, IssueStatus, IssueTransition, ValidationIssue,
};
use taxroll_core::validation::recording::IssueWritePlan;
use taxroll_core::validation::rules::{NewRule, RuleFilter, RulePatch, ValidationRule};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage failures, split by blast radius.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend cannot be reached at all. Batch runs abort on this;
    /// everything else is per-item.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A single operation failed; other items are unaffected.
    #[error("Store operation failed: {0}")]
    Backend(String),

    /// A uniqueness or concurrent-modification conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Entity not found: {entity} '{key}'")]
    NotFound { entity: &'static str, key: String },
}

/// Filter for the property listing surface.
#[derive(Debug, Clone, Default)]
pub struct PropertyFilter {
    pub validation_status: Option<ValidationStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Abstract persistent store for properties, rules, and issues.
///
/// Writes that record an evaluation go through [`apply_evaluation`] so the
/// issues and the denormalized property status commit together per
/// property.
///
/// [`apply_evaluation`]: PropertyStore::apply_evaluation
#[async_trait]
pub trait PropertyStore: Send + Sync {
    // -- properties -----------------------------------------------------

    async fn property_by_id(&self, id: DbId) -> Result<Option<PropertyRecord>, StoreError>;

    async fn property_by_parcel(
        &self,
        parcel_number: &str,
    ) -> Result<Option<PropertyRecord>, StoreError>;

    async fn count_properties(&self) -> Result<i64, StoreError>;

    /// Keyset page ordered by id, for walking the whole roll in chunks.
    async fn properties_page(
        &self,
        after_id: DbId,
        limit: i64,
    ) -> Result<Vec<PropertyRecord>, StoreError>;

    async fn list_properties(
        &self,
        filter: &PropertyFilter,
    ) -> Result<Vec<PropertyRecord>, StoreError>;

    /// Rewrite the denormalized validation fields on a property.
    async fn update_validation_status(
        &self,
        property_id: DbId,
        status: ValidationStatus,
        open_issue_count: i32,
        last_validated_at: Option<Timestamp>,
    ) -> Result<(), StoreError>;

    // -- rules ----------------------------------------------------------

    /// Insert a rule; a duplicate `code` is a [`StoreError::Conflict`].
    async fn insert_rule(&self, rule: &NewRule) -> Result<ValidationRule, StoreError>;

    async fn rule_by_code(&self, code: &str) -> Result<Option<ValidationRule>, StoreError>;

    /// List rules ordered by `code`.
    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<ValidationRule>, StoreError>;

    /// Partial update; `code` is immutable. `Ok(None)` when absent.
    async fn update_rule(
        &self,
        code: &str,
        patch: &RulePatch,
    ) -> Result<Option<ValidationRule>, StoreError>;

    // -- issues ---------------------------------------------------------

    async fn issue_by_id(&self, id: DbId) -> Result<Option<ValidationIssue>, StoreError>;

    async fn issues_for_property(
        &self,
        property_id: DbId,
        status: Option<IssueStatus>,
    ) -> Result<Vec<ValidationIssue>, StoreError>;

    /// Non-terminal issues for a property.
    async fn outstanding_issues(
        &self,
        property_id: DbId,
    ) -> Result<Vec<ValidationIssue>, StoreError>;

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<ValidationIssue>, StoreError>;

    /// Compare-and-set status transition: applies only while the issue is
    /// still in `expected` status. `Ok(None)` means a concurrent writer
    /// moved it first (or it vanished).
    async fn transition_issue(
        &self,
        id: DbId,
        expected: IssueStatus,
        transition: &IssueTransition,
        at: Timestamp,
    ) -> Result<Option<ValidationIssue>, StoreError>;

    /// Atomically record one property's evaluation: append and supersede
    /// issues per the plan and rewrite the denormalized status. Returns
    /// the newly inserted issues.
    async fn apply_evaluation(
        &self,
        property_id: DbId,
        plan: &IssueWritePlan,
        status: ValidationStatus,
        validated_at: Timestamp,
    ) -> Result<Vec<ValidationIssue>, StoreError>;
}
