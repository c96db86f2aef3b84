//! In-memory [`PropertyStore`] implementation.
//!
//! Feature-complete against the trait so engine and API tests (and any
//! embedded use without Postgres) exercise the same contracts as
//! production. `set_offline` simulates a store outage for failure-path
//! tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use taxroll_core::property::{PropertyRecord, ValidationStatus};
use taxroll_core::types::{DbId, Timestamp};
use taxroll_core::validation::issue::{
    IssueFilter, IssueStatus, IssueTransition, ValidationIssue,
};
use taxroll_core::validation::recording::{IssueWritePlan, SUPERSEDED_RESOLUTION};
use taxroll_core::validation::rules::{NewRule, RuleFilter, RulePatch, ValidationRule};

use super::{PropertyFilter, PropertyStore, StoreError};

#[derive(Default)]
struct Inner {
    properties: BTreeMap<DbId, PropertyRecord>,
    rules: BTreeMap<String, ValidationRule>,
    issues: BTreeMap<DbId, ValidationIssue>,
    next_property_id: DbId,
    next_rule_id: DbId,
    next_issue_id: DbId,
}

/// In-memory store over async `RwLock`ed maps.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When offline, every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Insert a property, assigning its id. Test/embedding helper.
    pub async fn insert_property(&self, mut record: PropertyRecord) -> DbId {
        let mut inner = self.inner.write().await;
        inner.next_property_id += 1;
        let id = inner.next_property_id;
        record.id = id;
        inner.properties.insert(id, record);
        id
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn property_by_id(&self, id: DbId) -> Result<Option<PropertyRecord>, StoreError> {
        self.check_online()?;
        Ok(self.inner.read().await.properties.get(&id).cloned())
    }

    async fn property_by_parcel(
        &self,
        parcel_number: &str,
    ) -> Result<Option<PropertyRecord>, StoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .read()
            .await
            .properties
            .values()
            .find(|p| p.parcel_number == parcel_number)
            .cloned())
    }

    async fn count_properties(&self) -> Result<i64, StoreError> {
        self.check_online()?;
        Ok(self.inner.read().await.properties.len() as i64)
    }

    async fn properties_page(
        &self,
        after_id: DbId,
        limit: i64,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .properties
            .range((after_id + 1)..)
            .take(limit as usize)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn list_properties(
        &self,
        filter: &PropertyFilter,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .properties
            .values()
            .filter(|p| {
                filter
                    .validation_status
                    .map_or(true, |s| p.validation_status == s)
            })
            .skip(filter.offset.unwrap_or(0) as usize)
            .take(filter.limit.unwrap_or(100) as usize)
            .cloned()
            .collect())
    }

    async fn update_validation_status(
        &self,
        property_id: DbId,
        status: ValidationStatus,
        open_issue_count: i32,
        last_validated_at: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        let property =
            inner
                .properties
                .get_mut(&property_id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "Property",
                    key: property_id.to_string(),
                })?;
        property.validation_status = status;
        property.open_issue_count = open_issue_count;
        property.last_validated_at = last_validated_at;
        Ok(())
    }

    async fn insert_rule(&self, rule: &NewRule) -> Result<ValidationRule, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        if inner.rules.contains_key(&rule.code) {
            return Err(StoreError::Conflict(format!(
                "Rule '{}' already exists",
                rule.code
            )));
        }
        inner.next_rule_id += 1;
        let now = chrono::Utc::now();
        let stored = ValidationRule {
            id: inner.next_rule_id,
            code: rule.code.clone(),
            name: rule.name.clone(),
            description: rule.description.clone(),
            category: rule.category,
            severity: rule.severity,
            entity_type: rule.entity_type.clone(),
            check: rule.check.clone(),
            reference: rule.reference.clone(),
            is_active: rule.is_active,
            created_by: rule.created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.rules.insert(rule.code.clone(), stored.clone());
        Ok(stored)
    }

    async fn rule_by_code(&self, code: &str) -> Result<Option<ValidationRule>, StoreError> {
        self.check_online()?;
        Ok(self.inner.read().await.rules.get(code).cloned())
    }

    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<ValidationRule>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .rules
            .values()
            .filter(|rule| {
                filter.category.map_or(true, |c| rule.category == c)
                    && filter
                        .entity_type
                        .as_deref()
                        .map_or(true, |t| rule.entity_type == t)
                    && (!filter.active_only || rule.is_active)
            })
            .cloned()
            .collect())
    }

    async fn update_rule(
        &self,
        code: &str,
        patch: &RulePatch,
    ) -> Result<Option<ValidationRule>, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        let Some(rule) = inner.rules.get_mut(code) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            rule.name = name.clone();
        }
        if let Some(description) = &patch.description {
            rule.description = Some(description.clone());
        }
        if let Some(category) = patch.category {
            rule.category = category;
        }
        if let Some(severity) = patch.severity {
            rule.severity = severity;
        }
        if let Some(check) = &patch.check {
            rule.check = check.clone();
        }
        if let Some(reference) = &patch.reference {
            rule.reference = Some(reference.clone());
        }
        if let Some(is_active) = patch.is_active {
            rule.is_active = is_active;
        }
        rule.updated_at = chrono::Utc::now();
        Ok(Some(rule.clone()))
    }

    async fn issue_by_id(&self, id: DbId) -> Result<Option<ValidationIssue>, StoreError> {
        self.check_online()?;
        Ok(self.inner.read().await.issues.get(&id).cloned())
    }

    async fn issues_for_property(
        &self,
        property_id: DbId,
        status: Option<IssueStatus>,
    ) -> Result<Vec<ValidationIssue>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .issues
            .values()
            .filter(|issue| {
                issue.property_id == property_id && status.map_or(true, |s| issue.status == s)
            })
            .cloned()
            .collect())
    }

    async fn outstanding_issues(
        &self,
        property_id: DbId,
    ) -> Result<Vec<ValidationIssue>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .issues
            .values()
            .filter(|issue| issue.property_id == property_id && issue.status.is_outstanding())
            .cloned()
            .collect())
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<ValidationIssue>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .issues
            .values()
            .filter(|issue| filter.status.map_or(true, |s| issue.status == s))
            .skip(filter.offset.unwrap_or(0) as usize)
            .take(filter.limit.unwrap_or(100) as usize)
            .cloned()
            .collect())
    }

    async fn transition_issue(
        &self,
        id: DbId,
        expected: IssueStatus,
        transition: &IssueTransition,
        at: Timestamp,
    ) -> Result<Option<ValidationIssue>, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        let Some(issue) = inner.issues.get_mut(&id) else {
            return Ok(None);
        };
        if issue.status != expected {
            return Ok(None);
        }
        issue.status = transition.status;
        if let Some(resolution) = &transition.resolution {
            issue.resolution = Some(resolution.clone());
        }
        if transition.status.is_terminal() {
            issue.resolved_by = transition.actor.clone();
            issue.resolved_at = Some(at);
        }
        Ok(Some(issue.clone()))
    }

    async fn apply_evaluation(
        &self,
        property_id: DbId,
        plan: &IssueWritePlan,
        status: ValidationStatus,
        validated_at: Timestamp,
    ) -> Result<Vec<ValidationIssue>, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        if !inner.properties.contains_key(&property_id) {
            return Err(StoreError::NotFound {
                entity: "Property",
                key: property_id.to_string(),
            });
        }

        let mut inserted = Vec::with_capacity(plan.append.len());
        for draft in &plan.append {
            inner.next_issue_id += 1;
            let issue = ValidationIssue {
                id: inner.next_issue_id,
                property_id,
                rule_code: draft.rule_code.clone(),
                severity: draft.severity,
                message: draft.message.clone(),
                detected_at: validated_at,
                status: IssueStatus::Open,
                resolution: None,
                resolved_by: None,
                resolved_at: None,
                superseded_by: None,
            };
            inner.issues.insert(issue.id, issue.clone());
            inserted.push(issue);
        }

        for supersession in &plan.supersede {
            let replacement_id = inserted[supersession.replacement].id;
            if let Some(old) = inner.issues.get_mut(&supersession.issue_id) {
                old.status = IssueStatus::Resolved;
                old.resolution = Some(SUPERSEDED_RESOLUTION.to_string());
                old.resolved_at = Some(validated_at);
                old.superseded_by = Some(replacement_id);
            }
        }

        let property = inner
            .properties
            .get_mut(&property_id)
            .expect("checked above");
        property.validation_status = status;
        property.open_issue_count = plan.outstanding_after;
        property.last_validated_at = Some(validated_at);

        Ok(inserted)
    }
}
