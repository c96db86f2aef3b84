//! Rule catalog service: registration, listing, partial updates, and
//! idempotent seeding, with check definitions validated before anything
//! is stored.

use std::sync::Arc;

use taxroll_core::error::CoreError;
use taxroll_core::jurisdiction::RuleSeed;
use taxroll_core::validation::checks::CheckKind;
use taxroll_core::validation::evaluator::{compile_rules, CompiledRule, RuleDiagnostic};
use taxroll_core::validation::rules::{NewRule, RuleFilter, RulePatch, ValidationRule};

use crate::store::PropertyStore;
use crate::{EngineError, EngineResult};

/// Outcome of one idempotent seeding pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Seeds that were absent and got inserted.
    pub inserted: usize,
    /// Seeds already present with unchanged content.
    pub unchanged: usize,
    /// Seeds whose stored rule was edited by an operator; left alone.
    pub kept: usize,
}

/// Manages the stored rule catalog over a [`PropertyStore`].
#[derive(Clone)]
pub struct RuleCatalog {
    store: Arc<dyn PropertyStore>,
}

impl RuleCatalog {
    pub fn new(store: Arc<dyn PropertyStore>) -> Self {
        Self { store }
    }

    /// Register a new rule. The check definition is resolved up front so a
    /// rule that cannot execute never enters the catalog.
    pub async fn register_rule(&self, rule: NewRule) -> EngineResult<ValidationRule> {
        if rule.code.trim().is_empty() {
            return Err(CoreError::Validation("Rule code must not be empty".to_string()).into());
        }
        if rule.name.trim().is_empty() {
            return Err(CoreError::Validation("Rule name must not be empty".to_string()).into());
        }
        CheckKind::parse(&rule.check)?;
        Ok(self.store.insert_rule(&rule).await?)
    }

    pub async fn get_rule(&self, code: &str) -> EngineResult<ValidationRule> {
        self.store
            .rule_by_code(code)
            .await?
            .ok_or_else(|| {
                EngineError::Core(CoreError::NotFound {
                    entity: "ValidationRule",
                    key: code.to_string(),
                })
            })
    }

    pub async fn list_rules(&self, filter: &RuleFilter) -> EngineResult<Vec<ValidationRule>> {
        Ok(self.store.list_rules(filter).await?)
    }

    /// Apply a partial update. A patched check definition is validated the
    /// same way as at registration.
    pub async fn update_rule(&self, code: &str, patch: &RulePatch) -> EngineResult<ValidationRule> {
        if patch.is_empty() {
            return Err(CoreError::Validation("Patch contains no fields".to_string()).into());
        }
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(
                    CoreError::Validation("Rule name must not be empty".to_string()).into(),
                );
            }
        }
        if let Some(check) = &patch.check {
            CheckKind::parse(check)?;
        }
        self.store
            .update_rule(code, patch)
            .await?
            .ok_or_else(|| {
                EngineError::Core(CoreError::NotFound {
                    entity: "ValidationRule",
                    key: code.to_string(),
                })
            })
    }

    /// Idempotently install a seed set. Absent seeds are inserted; seeds
    /// already present with identical content count as unchanged; rules an
    /// operator has edited are kept as-is.
    pub async fn seed_rules(&self, seeds: &[RuleSeed], created_by: &str) -> EngineResult<SeedReport> {
        let mut report = SeedReport::default();
        for seed in seeds {
            match self.store.rule_by_code(seed.code).await? {
                None => {
                    self.store.insert_rule(&seed.to_new_rule(created_by)).await?;
                    report.inserted += 1;
                }
                Some(existing) if seed.matches(&existing) => report.unchanged += 1,
                Some(_) => report.kept += 1,
            }
        }
        Ok(report)
    }

    /// Load and compile the active rules for one entity type, ready for a
    /// validation run. Unresolvable stored checks come back as diagnostics
    /// instead of failing the snapshot.
    pub async fn active_snapshot(
        &self,
        entity_type: &str,
    ) -> EngineResult<(Vec<CompiledRule>, Vec<RuleDiagnostic>)> {
        let rules = self
            .store
            .list_rules(&RuleFilter {
                entity_type: Some(entity_type.to_string()),
                active_only: true,
                ..Default::default()
            })
            .await?;
        Ok(compile_rules(&rules, entity_type))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use assert_matches::assert_matches;
    use serde_json::json;
    use taxroll_core::jurisdiction::washington::washington_rules;
    use taxroll_core::validation::rules::{CheckSpec, RuleCategory, Severity};

    fn catalog() -> RuleCatalog {
        RuleCatalog::new(Arc::new(MemoryStore::new()))
    }

    fn new_rule(code: &str) -> NewRule {
        NewRule {
            code: code.to_string(),
            name: "Assessed value present".to_string(),
            description: None,
            category: RuleCategory::Completeness,
            severity: Severity::Error,
            entity_type: "property".to_string(),
            check: CheckSpec {
                kind: "required".to_string(),
                params: json!({"field": "assessed_value"}),
            },
            reference: None,
            is_active: true,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let catalog = catalog();
        let created = catalog.register_rule(new_rule("R1")).await.unwrap();
        let fetched = catalog.get_rule("R1").await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.code, "R1");
    }

    #[tokio::test]
    async fn duplicate_code_is_a_conflict() {
        let catalog = catalog();
        catalog.register_rule(new_rule("R1")).await.unwrap();
        let err = catalog.register_rule(new_rule("R1")).await.unwrap_err();
        assert_matches!(err, EngineError::Store(StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_check_kind_rejected_at_registration() {
        let catalog = catalog();
        let mut rule = new_rule("R1");
        rule.check.kind = "frobnicate".to_string();
        let err = catalog.register_rule(rule).await.unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::Configuration(_)));
        // Nothing was stored.
        assert_matches!(
            catalog.get_rule("R1").await.unwrap_err(),
            EngineError::Core(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn empty_patch_rejected() {
        let catalog = catalog();
        catalog.register_rule(new_rule("R1")).await.unwrap();
        let err = catalog
            .update_rule("R1", &RulePatch::default())
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn patch_with_bad_check_rejected() {
        let catalog = catalog();
        catalog.register_rule(new_rule("R1")).await.unwrap();
        let patch = RulePatch {
            check: Some(CheckSpec {
                kind: "min_value".to_string(),
                params: json!({"field": "no_such_field", "min": 0}),
            }),
            ..Default::default()
        };
        let err = catalog.update_rule("R1", &patch).await.unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::Configuration(_)));
        // Original check untouched.
        let rule = catalog.get_rule("R1").await.unwrap();
        assert_eq!(rule.check.kind, "required");
    }

    #[tokio::test]
    async fn deactivation_removes_rule_from_snapshot() {
        let catalog = catalog();
        catalog.register_rule(new_rule("R1")).await.unwrap();
        let (compiled, _) = catalog.active_snapshot("property").await.unwrap();
        assert_eq!(compiled.len(), 1);

        let patch = RulePatch {
            is_active: Some(false),
            ..Default::default()
        };
        catalog.update_rule("R1", &patch).await.unwrap();
        let (compiled, _) = catalog.active_snapshot("property").await.unwrap();
        assert!(compiled.is_empty());
    }

    #[tokio::test]
    async fn seeding_is_idempotent_and_preserves_edits() {
        let catalog = catalog();
        let seeds = washington_rules();

        let first = catalog.seed_rules(&seeds, "system").await.unwrap();
        assert_eq!(first.inserted, seeds.len());
        assert_eq!(first.unchanged, 0);

        let second = catalog.seed_rules(&seeds, "system").await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.unchanged, seeds.len());

        // An operator edit survives the next seeding pass.
        let patch = RulePatch {
            severity: Some(Severity::Info),
            ..Default::default()
        };
        catalog.update_rule(seeds[0].code, &patch).await.unwrap();
        let third = catalog.seed_rules(&seeds, "system").await.unwrap();
        assert_eq!(third.kept, 1);
        assert_eq!(third.unchanged, seeds.len() - 1);
        let edited = catalog.get_rule(seeds[0].code).await.unwrap();
        assert_eq!(edited.severity, Severity::Info);
    }
}
