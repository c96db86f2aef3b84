//! Batch validation runner.
//!
//! Walks the roll in keyset pages so the whole table never sits in
//! memory, evaluates each page with bounded concurrency, and records
//! results per property through [`PropertyStore::apply_evaluation`].
//! Per-property failures are isolated; only a systemic
//! [`StoreError::Unavailable`] aborts a run.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use taxroll_core::error::CoreError;
use taxroll_core::property::{
    compute_validation_status, is_property_field, PropertyRecord, ValidationStatus,
};
use taxroll_core::types::{DbId, Timestamp};
use taxroll_core::validation::evaluator::{
    evaluate_property, CompiledRule, EvaluationContext, RuleDiagnostic,
};
use taxroll_core::validation::issue::ValidationIssue;
use taxroll_core::validation::recording::plan_issue_writes;
use taxroll_core::validation::rules::ENTITY_TYPE_PROPERTY;

use crate::catalog::RuleCatalog;
use crate::store::{PropertyStore, StoreError};
use crate::{EngineError, EngineResult};

/// Upper bound on in-flight evaluations within one page.
const MAX_CONCURRENCY: usize = 8;

/// Options for a validation run.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RunOptions {
    /// Properties fetched and evaluated per page. Clamped to 1..=500.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Skip properties already validated and unchanged since.
    #[serde(default)]
    pub skip_validated: bool,
    /// Restrict the run to rules touching any of these fields.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

fn default_batch_size() -> usize {
    50
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            batch_size: default_batch_size(),
            skip_validated: false,
            fields: None,
        }
    }
}

impl RunOptions {
    fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, 500)
    }

    fn concurrency(&self) -> usize {
        self.effective_batch_size().min(MAX_CONCURRENCY)
    }
}

/// Cumulative `(processed, total)` callback, fired after every page.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: u64,
    pub valid: u64,
    pub invalid: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Violations detected across the run (including re-detections).
    pub issue_count: u64,
    /// Issue records actually appended.
    pub new_issue_count: u64,
    pub processing_time_ms: u64,
    pub validation_date: Timestamp,
}

impl BatchSummary {
    fn new(total: u64, validation_date: Timestamp) -> Self {
        BatchSummary {
            total,
            valid: 0,
            invalid: 0,
            skipped: 0,
            failed: 0,
            issue_count: 0,
            new_issue_count: 0,
            processing_time_ms: 0,
            validation_date,
        }
    }
}

/// Full result of validating a single property.
#[derive(Debug, Serialize)]
pub struct PropertyReport {
    pub property_id: DbId,
    pub parcel_number: String,
    pub is_valid: bool,
    pub issue_count: usize,
    /// The property's outstanding issues after recording.
    pub issues: Vec<ValidationIssue>,
    pub diagnostics: Vec<RuleDiagnostic>,
}

/// Outcome of evaluating and recording one property.
enum ItemOutcome {
    Skipped,
    Done {
        outstanding_after: i32,
        detected: usize,
        appended: usize,
    },
}

/// Runs validation over the stored roll.
#[derive(Clone)]
pub struct BatchRunner {
    store: Arc<dyn PropertyStore>,
    catalog: RuleCatalog,
    /// Serializes read-plan-apply per property so concurrent runs of the
    /// same property never record against a stale outstanding-issue
    /// read. Shared across clones, so a single-parcel run and a
    /// background full-roll job contend on the same lock.
    record_locks: Arc<Mutex<HashMap<DbId, Arc<AsyncMutex<()>>>>>,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn PropertyStore>, catalog: RuleCatalog) -> Self {
        Self {
            store,
            catalog,
            record_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn record_lock(&self, id: DbId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.record_locks.lock().unwrap();
        Arc::clone(locks.entry(id).or_default())
    }

    /// Drop a lock entry once no task holds it any more.
    fn release_record_lock(&self, id: DbId) {
        let mut locks = self.record_locks.lock().unwrap();
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }

    /// Validate a single property by parcel number and return the full
    /// report. Always evaluates; `skip_validated` only applies to batch
    /// paths.
    pub async fn validate_parcel(
        &self,
        parcel_number: &str,
        options: &RunOptions,
    ) -> EngineResult<PropertyReport> {
        let record = self
            .store
            .property_by_parcel(parcel_number)
            .await?
            .ok_or_else(|| {
                EngineError::Core(CoreError::NotFound {
                    entity: "Property",
                    key: parcel_number.to_string(),
                })
            })?;

        let rules = self.compiled_rules(options).await?;
        let ctx = EvaluationContext::for_today();
        let now = chrono::Utc::now();
        let property_id = record.id;

        let lock = self.record_lock(property_id);
        let guard = lock.lock().await;
        let result: EngineResult<PropertyReport> = async {
            let evaluation = evaluate_property(&record, &rules, &ctx);
            let diagnostics = evaluation.diagnostics;
            let outstanding = self.store.outstanding_issues(property_id).await?;
            let plan = plan_issue_writes(&outstanding, evaluation.issues);
            let status = compute_validation_status(plan.outstanding_after, true);
            self.store
                .apply_evaluation(property_id, &plan, status, now)
                .await?;

            let issues = self.store.outstanding_issues(property_id).await?;
            Ok(PropertyReport {
                property_id,
                parcel_number: record.parcel_number,
                is_valid: issues.is_empty(),
                issue_count: issues.len(),
                issues,
                diagnostics,
            })
        }
        .await;
        drop(guard);
        drop(lock);
        self.release_record_lock(property_id);
        result
    }

    /// Validate an explicit list of parcels. Duplicates are validated
    /// once; unknown parcels count as failed and the rest of the list
    /// still runs.
    pub async fn validate_parcels(
        &self,
        parcel_numbers: &[String],
        options: &RunOptions,
    ) -> EngineResult<BatchSummary> {
        let rules = Arc::new(self.compiled_rules(options).await?);
        let ctx = EvaluationContext::for_today();
        let started = Instant::now();
        let validation_date = chrono::Utc::now();

        let mut seen = HashSet::new();
        let parcels: Vec<&String> = parcel_numbers
            .iter()
            .filter(|p| seen.insert(p.as_str()))
            .collect();
        let mut summary = BatchSummary::new(parcels.len() as u64, validation_date);

        let mut records = Vec::with_capacity(parcels.len());
        for parcel in parcels {
            match self.store.property_by_parcel(parcel).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    tracing::warn!(parcel_number = %parcel, "parcel not found, skipping");
                    summary.failed += 1;
                }
                Err(e @ StoreError::Unavailable(_)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(parcel_number = %parcel, error = %e, "parcel lookup failed");
                    summary.failed += 1;
                }
            }
        }

        self.run_page(records, &rules, &ctx, options, validation_date, &mut summary)
            .await?;
        summary.processing_time_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Validate the entire roll.
    ///
    /// `progress` receives cumulative `(processed, total)` after each
    /// page. Cancellation is honored between pages; the in-flight page
    /// always commits, and re-running is safe because recording
    /// deduplicates.
    pub async fn validate_all(
        &self,
        options: &RunOptions,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> EngineResult<BatchSummary> {
        let rules = Arc::new(self.compiled_rules(options).await?);
        let ctx = EvaluationContext::for_today();
        let started = Instant::now();
        let validation_date = chrono::Utc::now();

        let total = self.store.count_properties().await? as u64;
        let mut summary = BatchSummary::new(total, validation_date);
        let batch_size = options.effective_batch_size();
        let mut after_id = 0;
        let mut processed: u64 = 0;

        tracing::info!(total, batch_size, "starting full validation run");

        loop {
            if cancel.is_cancelled() {
                tracing::info!(processed, total, "validation run cancelled");
                return Err(EngineError::Cancelled);
            }

            let page = self
                .store
                .properties_page(after_id, batch_size as i64)
                .await?;
            if page.is_empty() {
                break;
            }
            after_id = page.last().map(|p| p.id).unwrap_or(after_id);
            processed += page.len() as u64;

            self.run_page(page, &rules, &ctx, options, validation_date, &mut summary)
                .await?;

            if let Some(progress) = &progress {
                progress(processed, total);
            }
        }

        summary.processing_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            total = summary.total,
            valid = summary.valid,
            invalid = summary.invalid,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = summary.processing_time_ms,
            "validation run complete"
        );
        Ok(summary)
    }

    /// Compile the active rule snapshot, optionally narrowed to rules
    /// touching the requested fields.
    async fn compiled_rules(&self, options: &RunOptions) -> EngineResult<Vec<CompiledRule>> {
        let (compiled, diagnostics) = self.catalog.active_snapshot(ENTITY_TYPE_PROPERTY).await?;
        for diagnostic in &diagnostics {
            tracing::warn!(
                rule_code = %diagnostic.rule_code,
                detail = %diagnostic.detail,
                "skipping unresolvable rule"
            );
        }

        let Some(fields) = &options.fields else {
            return Ok(compiled);
        };
        for field in fields {
            if !is_property_field(field) {
                return Err(
                    CoreError::Validation(format!("Unknown property field: '{field}'")).into(),
                );
            }
        }
        Ok(compiled
            .into_iter()
            .filter(|rule| rule.check.fields().iter().any(|f| fields.iter().any(|w| w == f)))
            .collect())
    }

    /// Evaluate and record one page of properties with bounded
    /// concurrency, folding the outcomes into `summary`.
    async fn run_page(
        &self,
        page: Vec<PropertyRecord>,
        rules: &Arc<Vec<CompiledRule>>,
        ctx: &EvaluationContext,
        options: &RunOptions,
        validated_at: Timestamp,
        summary: &mut BatchSummary,
    ) -> EngineResult<()> {
        let mut outcomes = stream::iter(page.into_iter().map(|record| {
            let rules = Arc::clone(rules);
            let ctx = *ctx;
            let skip_validated = options.skip_validated;
            async move {
                let parcel = record.parcel_number.clone();
                let outcome = self
                    .validate_one(record, &rules, &ctx, skip_validated, validated_at)
                    .await;
                (parcel, outcome)
            }
        }))
        .buffer_unordered(options.concurrency());

        while let Some((parcel, outcome)) = outcomes.next().await {
            match outcome {
                Ok(ItemOutcome::Skipped) => summary.skipped += 1,
                Ok(ItemOutcome::Done {
                    outstanding_after,
                    detected,
                    appended,
                }) => {
                    if outstanding_after > 0 {
                        summary.invalid += 1;
                    } else {
                        summary.valid += 1;
                    }
                    summary.issue_count += detected as u64;
                    summary.new_issue_count += appended as u64;
                }
                Err(e @ StoreError::Unavailable(_)) => {
                    tracing::error!(error = %e, "store unavailable, aborting run");
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::warn!(parcel_number = %parcel, error = %e, "property validation failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Evaluate one property and record the outcome.
    async fn validate_one(
        &self,
        record: PropertyRecord,
        rules: &[CompiledRule],
        ctx: &EvaluationContext,
        skip_validated: bool,
        validated_at: Timestamp,
    ) -> Result<ItemOutcome, StoreError> {
        if skip_validated
            && record.validation_status == ValidationStatus::Validated
            && record
                .last_validated_at
                .is_some_and(|at| at >= record.updated_at)
        {
            return Ok(ItemOutcome::Skipped);
        }

        let evaluation = evaluate_property(&record, rules, ctx);
        for diagnostic in &evaluation.diagnostics {
            tracing::warn!(
                parcel_number = %record.parcel_number,
                rule_code = %diagnostic.rule_code,
                detail = %diagnostic.detail,
                "rule execution failed for property"
            );
        }

        let detected = evaluation.issues.len();
        let lock = self.record_lock(record.id);
        let guard = lock.lock().await;
        let result = async {
            let outstanding = self.store.outstanding_issues(record.id).await?;
            let plan = plan_issue_writes(&outstanding, evaluation.issues);
            let status = compute_validation_status(plan.outstanding_after, true);
            let appended = plan.append.len();
            let outstanding_after = plan.outstanding_after;
            self.store
                .apply_evaluation(record.id, &plan, status, validated_at)
                .await?;

            Ok(ItemOutcome::Done {
                outstanding_after,
                detected,
                appended,
            })
        }
        .await;
        drop(guard);
        drop(lock);
        self.release_record_lock(record.id);
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
