//! Background job registry for full validation runs.
//!
//! One registry owns every job's lifecycle state and cancellation token;
//! progress flows into the per-job snapshot rather than any shared
//! global. At most one full-roll run is active at a time, which also
//! serializes same-property writes across runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use taxroll_core::error::CoreError;
use taxroll_core::types::Timestamp;

use crate::runner::{BatchRunner, BatchSummary, ProgressFn, RunOptions};
use crate::{EngineError, EngineResult};

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Point-in-time view of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub state: JobState,
    pub processed: u64,
    pub total: u64,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub summary: Option<BatchSummary>,
    pub error: Option<String>,
}

struct JobEntry {
    snapshot: JobSnapshot,
    cancel: CancellationToken,
}

#[derive(Default)]
struct RegistryInner {
    jobs: HashMap<JobId, JobEntry>,
    active: Option<JobId>,
}

/// Tracks background validation jobs.
#[derive(Default)]
pub struct JobRegistry {
    inner: Mutex<RegistryInner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a full-roll validation run. Returns the job id immediately;
    /// the run executes on a spawned task. A second submission while one
    /// is still pending or running is a conflict.
    pub fn start_validate_all(
        self: &Arc<Self>,
        runner: BatchRunner,
        options: RunOptions,
    ) -> EngineResult<JobId> {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        {
            let mut inner = self.inner.lock().expect("job registry lock poisoned");
            if let Some(active) = inner.active {
                if inner
                    .jobs
                    .get(&active)
                    .is_some_and(|entry| !entry.snapshot.state.is_terminal())
                {
                    return Err(EngineError::Core(CoreError::Conflict(
                        "A full validation run is already in progress".to_string(),
                    )));
                }
            }
            inner.jobs.insert(
                id,
                JobEntry {
                    snapshot: JobSnapshot {
                        id,
                        state: JobState::Pending,
                        processed: 0,
                        total: 0,
                        submitted_at: chrono::Utc::now(),
                        started_at: None,
                        finished_at: None,
                        summary: None,
                        error: None,
                    },
                    cancel: cancel.clone(),
                },
            );
            inner.active = Some(id);
        }

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.update(id, |snapshot| {
                snapshot.state = JobState::Running;
                snapshot.started_at = Some(chrono::Utc::now());
            });

            let progress_registry = Arc::clone(&registry);
            let progress: ProgressFn = Arc::new(move |processed, total| {
                progress_registry.update(id, |snapshot| {
                    snapshot.processed = processed;
                    snapshot.total = total;
                });
            });

            let outcome = runner.validate_all(&options, Some(progress), &cancel).await;
            registry.update(id, |snapshot| {
                snapshot.finished_at = Some(chrono::Utc::now());
                match &outcome {
                    Ok(summary) => {
                        snapshot.state = JobState::Completed;
                        snapshot.processed = summary.total;
                        snapshot.total = summary.total;
                        snapshot.summary = Some(summary.clone());
                    }
                    Err(EngineError::Cancelled) => snapshot.state = JobState::Cancelled,
                    Err(e) => {
                        snapshot.state = JobState::Failed;
                        snapshot.error = Some(e.to_string());
                    }
                }
            });
            match &outcome {
                Ok(_) => tracing::info!(job_id = %id, "validation job completed"),
                Err(EngineError::Cancelled) => {
                    tracing::info!(job_id = %id, "validation job cancelled")
                }
                Err(e) => tracing::error!(job_id = %id, error = %e, "validation job failed"),
            }
        });

        Ok(id)
    }

    pub fn snapshot(&self, id: JobId) -> EngineResult<JobSnapshot> {
        let inner = self.inner.lock().expect("job registry lock poisoned");
        inner
            .jobs
            .get(&id)
            .map(|entry| entry.snapshot.clone())
            .ok_or_else(|| {
                EngineError::Core(CoreError::NotFound {
                    entity: "ValidationJob",
                    key: id.to_string(),
                })
            })
    }

    /// Request cancellation. Idempotent; a job already in a terminal
    /// state is returned unchanged.
    pub fn cancel(&self, id: JobId) -> EngineResult<JobSnapshot> {
        let inner = self.inner.lock().expect("job registry lock poisoned");
        let entry = inner.jobs.get(&id).ok_or_else(|| {
            EngineError::Core(CoreError::NotFound {
                entity: "ValidationJob",
                key: id.to_string(),
            })
        })?;
        if !entry.snapshot.state.is_terminal() {
            entry.cancel.cancel();
        }
        Ok(entry.snapshot.clone())
    }

    /// Cancel every non-terminal job; used on graceful shutdown.
    pub fn shutdown(&self) {
        let inner = self.inner.lock().expect("job registry lock poisoned");
        for entry in inner.jobs.values() {
            if !entry.snapshot.state.is_terminal() {
                entry.cancel.cancel();
            }
        }
    }

    fn update(&self, id: JobId, f: impl FnOnce(&mut JobSnapshot)) {
        let mut inner = self.inner.lock().expect("job registry lock poisoned");
        if let Some(entry) = inner.jobs.get_mut(&id) {
            f(&mut entry.snapshot);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RuleCatalog;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::time::Duration;
    use taxroll_core::property::PropertyRecord;
    use taxroll_core::validation::rules::{
        CheckSpec, NewRule, RuleCategory, Severity, ENTITY_TYPE_PROPERTY,
    };

    async fn runner_with_properties(count: usize) -> BatchRunner {
        let store = Arc::new(MemoryStore::new());
        let catalog = RuleCatalog::new(store.clone());
        catalog
            .register_rule(NewRule {
                code: "R1".to_string(),
                name: "Assessed value non-negative".to_string(),
                description: None,
                category: RuleCategory::Regulatory,
                severity: Severity::Error,
                entity_type: ENTITY_TYPE_PROPERTY.to_string(),
                check: CheckSpec {
                    kind: "non_negative".to_string(),
                    params: json!({"field": "assessed_value"}),
                },
                reference: None,
                is_active: true,
                created_by: None,
            })
            .await
            .unwrap();
        for i in 0..count {
            store
                .insert_property(PropertyRecord {
                    parcel_number: format!("P{i}"),
                    assessed_value: Some(100),
                    ..Default::default()
                })
                .await;
        }
        BatchRunner::new(store, catalog)
    }

    async fn wait_terminal(registry: &JobRegistry, id: JobId) -> JobSnapshot {
        for _ in 0..200 {
            let snapshot = registry.snapshot(id).unwrap();
            if snapshot.state.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn job_runs_to_completion_with_summary() {
        let registry = Arc::new(JobRegistry::new());
        let runner = runner_with_properties(7).await;

        let id = registry
            .start_validate_all(runner, RunOptions::default())
            .unwrap();
        let snapshot = wait_terminal(&registry, id).await;
        assert_eq!(snapshot.state, JobState::Completed);
        assert_eq!(snapshot.processed, 7);
        let summary = snapshot.summary.unwrap();
        assert_eq!(summary.total, 7);
        assert_eq!(summary.valid, 7);
    }

    #[tokio::test]
    async fn second_concurrent_start_is_a_conflict() {
        let registry = Arc::new(JobRegistry::new());
        let first = runner_with_properties(3).await;
        let second = runner_with_properties(3).await;

        let id = registry
            .start_validate_all(first, RunOptions::default())
            .unwrap();
        let err = registry
            .start_validate_all(second, RunOptions::default())
            .unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::Conflict(_)));

        // After the first completes, a new run is allowed.
        wait_terminal(&registry, id).await;
        let third = runner_with_properties(3).await;
        registry
            .start_validate_all(third, RunOptions::default())
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_moves_job_to_cancelled() {
        let registry = Arc::new(JobRegistry::new());
        let runner = runner_with_properties(5).await;

        let id = registry
            .start_validate_all(runner, RunOptions::default())
            .unwrap();
        registry.cancel(id).unwrap();
        let snapshot = wait_terminal(&registry, id).await;
        assert_eq!(snapshot.state, JobState::Cancelled);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let registry = JobRegistry::new();
        let err = registry.snapshot(Uuid::new_v4()).unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
    }
}
