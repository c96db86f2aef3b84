//! Issue lifecycle service: listing recorded issues and applying guarded
//! status transitions, keeping the denormalized property status in step.

use std::sync::Arc;

use taxroll_core::error::CoreError;
use taxroll_core::property::compute_validation_status;
use taxroll_core::types::DbId;
use taxroll_core::validation::issue::{IssueFilter, IssueTransition, ValidationIssue};

use crate::store::PropertyStore;
use crate::{EngineError, EngineResult};

/// Manages recorded validation issues over a [`PropertyStore`].
#[derive(Clone)]
pub struct IssueService {
    store: Arc<dyn PropertyStore>,
}

impl IssueService {
    pub fn new(store: Arc<dyn PropertyStore>) -> Self {
        Self { store }
    }

    pub async fn get_issue(&self, id: DbId) -> EngineResult<ValidationIssue> {
        self.store.issue_by_id(id).await?.ok_or_else(|| {
            EngineError::Core(CoreError::NotFound {
                entity: "ValidationIssue",
                key: id.to_string(),
            })
        })
    }

    /// All issues recorded against a parcel, newest last.
    pub async fn issues_for_parcel(
        &self,
        parcel_number: &str,
    ) -> EngineResult<Vec<ValidationIssue>> {
        let property = self
            .store
            .property_by_parcel(parcel_number)
            .await?
            .ok_or_else(|| {
                EngineError::Core(CoreError::NotFound {
                    entity: "Property",
                    key: parcel_number.to_string(),
                })
            })?;
        Ok(self.store.issues_for_property(property.id, None).await?)
    }

    pub async fn list_issues(&self, filter: &IssueFilter) -> EngineResult<Vec<ValidationIssue>> {
        Ok(self.store.list_issues(filter).await?)
    }

    /// Apply a lifecycle transition to an issue.
    ///
    /// Illegal transitions (per the issue state machine) and races with a
    /// concurrent transition both surface as conflicts. When the issue
    /// reaches a terminal state, the owning property's denormalized
    /// validation fields are recomputed.
    pub async fn update_status(
        &self,
        id: DbId,
        transition: &IssueTransition,
    ) -> EngineResult<ValidationIssue> {
        let issue = self.get_issue(id).await?;

        if !issue.status.can_transition_to(transition.status) {
            return Err(CoreError::Conflict(format!(
                "Issue {} cannot move from '{}' to '{}'",
                id,
                issue.status.as_str(),
                transition.status.as_str()
            ))
            .into());
        }

        let now = chrono::Utc::now();
        let updated = self
            .store
            .transition_issue(id, issue.status, transition, now)
            .await?
            .ok_or_else(|| {
                EngineError::Core(CoreError::Conflict(format!(
                    "Issue {id} was modified concurrently"
                )))
            })?;

        if updated.status.is_terminal() {
            self.recompute_property_status(updated.property_id).await?;
        }

        tracing::info!(
            issue_id = id,
            status = updated.status.as_str(),
            "issue status updated"
        );
        Ok(updated)
    }

    /// Recompute a property's denormalized validation fields from its
    /// outstanding issues. `last_validated_at` is preserved; only a
    /// validation run moves it.
    async fn recompute_property_status(&self, property_id: DbId) -> EngineResult<()> {
        let property = self
            .store
            .property_by_id(property_id)
            .await?
            .ok_or_else(|| {
                EngineError::Core(CoreError::NotFound {
                    entity: "Property",
                    key: property_id.to_string(),
                })
            })?;
        let outstanding = self.store.outstanding_issues(property_id).await?;
        let count = outstanding.len() as i32;
        let status = compute_validation_status(count, property.last_validated_at.is_some());
        self.store
            .update_validation_status(property_id, status, count, property.last_validated_at)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use taxroll_core::property::{PropertyRecord, ValidationStatus};
    use taxroll_core::validation::evaluator::IssueDraft;
    use taxroll_core::validation::issue::IssueStatus;
    use taxroll_core::validation::recording::plan_issue_writes;
    use taxroll_core::validation::rules::Severity;

    async fn store_with_open_issue() -> (Arc<MemoryStore>, DbId, DbId) {
        let store = Arc::new(MemoryStore::new());
        let property_id = store
            .insert_property(PropertyRecord {
                parcel_number: "123456-789".to_string(),
                ..Default::default()
            })
            .await;
        let plan = plan_issue_writes(
            &[],
            vec![IssueDraft {
                rule_code: "R1".to_string(),
                severity: Severity::Error,
                message: "assessed_value is required but missing".to_string(),
            }],
        );
        let inserted = store
            .apply_evaluation(
                property_id,
                &plan,
                ValidationStatus::Invalid,
                chrono::Utc::now(),
            )
            .await
            .unwrap();
        (store, property_id, inserted[0].id)
    }

    fn transition(status: IssueStatus) -> IssueTransition {
        IssueTransition {
            status,
            resolution: Some("Corrected in source system".to_string()),
            actor: Some("assessor".to_string()),
        }
    }

    #[tokio::test]
    async fn open_to_acknowledged_to_resolved() {
        let (store, property_id, issue_id) = store_with_open_issue().await;
        let service = IssueService::new(store.clone());

        let acked = service
            .update_status(issue_id, &transition(IssueStatus::Acknowledged))
            .await
            .unwrap();
        assert_eq!(acked.status, IssueStatus::Acknowledged);
        // Acknowledged still counts against the property.
        let property = store.property_by_id(property_id).await.unwrap().unwrap();
        assert_eq!(property.open_issue_count, 1);
        assert_eq!(property.validation_status, ValidationStatus::Invalid);

        let resolved = service
            .update_status(issue_id, &transition(IssueStatus::Resolved))
            .await
            .unwrap();
        assert_eq!(resolved.status, IssueStatus::Resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("assessor"));
        assert!(resolved.resolved_at.is_some());

        // Last outstanding issue closed: property flips to validated.
        let property = store.property_by_id(property_id).await.unwrap().unwrap();
        assert_eq!(property.open_issue_count, 0);
        assert_eq!(property.validation_status, ValidationStatus::Validated);
    }

    #[tokio::test]
    async fn terminal_issue_rejects_further_transitions() {
        let (store, _, issue_id) = store_with_open_issue().await;
        let service = IssueService::new(store);

        service
            .update_status(issue_id, &transition(IssueStatus::Waived))
            .await
            .unwrap();
        let err = service
            .update_status(issue_id, &transition(IssueStatus::Resolved))
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_issue_is_not_found() {
        let service = IssueService::new(Arc::new(MemoryStore::new()));
        let err = service
            .update_status(999, &transition(IssueStatus::Resolved))
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn issues_for_unknown_parcel_is_not_found() {
        let service = IssueService::new(Arc::new(MemoryStore::new()));
        let err = service.issues_for_parcel("000000-000").await.unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
    }
}
