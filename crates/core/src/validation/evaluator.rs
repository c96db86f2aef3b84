//! Rule evaluator — pure logic, no database access.
//!
//! Rules are compiled once per run so every property in a batch sees the
//! same rule set, and the evaluation date is captured once in
//! [`EvaluationContext`]; given the same record, rules, and context the
//! evaluator always produces the same issue drafts.

use chrono::NaiveDate;
use serde::Serialize;

use crate::validation::checks::CheckKind;
use crate::validation::rules::{Severity, ValidationRule};

/// The only wall-clock input to evaluation, captured once per run.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext {
    pub today: NaiveDate,
}

impl EvaluationContext {
    /// Capture the current UTC date.
    pub fn for_today() -> Self {
        EvaluationContext {
            today: chrono::Utc::now().date_naive(),
        }
    }
}

/// An active rule with its check resolved to an executable form.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: ValidationRule,
    pub check: CheckKind,
}

/// Why a rule could not produce a pass/fail answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// The stored check definition could not be resolved; the rule was
    /// skipped for the whole run.
    Configuration,
    /// The check failed while executing against a specific record.
    Execution,
}

/// A per-rule failure surfaced alongside (never instead of) the results
/// of the remaining rules.
#[derive(Debug, Clone, Serialize)]
pub struct RuleDiagnostic {
    pub rule_code: String,
    pub kind: DiagnosticKind,
    pub detail: String,
}

/// A detected violation, not yet persisted. Severity is copied from the
/// rule at detection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDraft {
    pub rule_code: String,
    pub severity: Severity,
    pub message: String,
}

/// The outcome of evaluating one property against a compiled rule set.
#[derive(Debug, Default)]
pub struct PropertyEvaluation {
    pub issues: Vec<IssueDraft>,
    pub diagnostics: Vec<RuleDiagnostic>,
}

impl PropertyEvaluation {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Resolve each active rule's check once, for the duration of a run.
///
/// Rules that are inactive or target a different entity type are dropped.
/// Unresolvable checks become configuration diagnostics; one bad rule
/// never blocks the others.
pub fn compile_rules(
    rules: &[ValidationRule],
    entity_type: &str,
) -> (Vec<CompiledRule>, Vec<RuleDiagnostic>) {
    let mut compiled = Vec::new();
    let mut diagnostics = Vec::new();

    for rule in rules {
        if !rule.is_active || rule.entity_type != entity_type {
            continue;
        }
        match CheckKind::parse(&rule.check) {
            Ok(check) => compiled.push(CompiledRule {
                rule: rule.clone(),
                check,
            }),
            Err(e) => {
                diagnostics.push(RuleDiagnostic {
                    rule_code: rule.code.clone(),
                    kind: DiagnosticKind::Configuration,
                    detail: e.to_string(),
                });
            }
        }
    }

    (compiled, diagnostics)
}

/// Evaluate one property against a compiled rule set.
///
/// A check execution failure is isolated to its rule and recorded as a
/// diagnostic; remaining rules still run.
pub fn evaluate_property(
    record: &crate::property::PropertyRecord,
    rules: &[CompiledRule],
    ctx: &EvaluationContext,
) -> PropertyEvaluation {
    let mut evaluation = PropertyEvaluation::default();

    for compiled in rules {
        match compiled.check.execute(record, ctx) {
            Ok(None) => {}
            Ok(Some(message)) => evaluation.issues.push(IssueDraft {
                rule_code: compiled.rule.code.clone(),
                severity: compiled.rule.severity,
                message,
            }),
            Err(e) => {
                evaluation.diagnostics.push(RuleDiagnostic {
                    rule_code: compiled.rule.code.clone(),
                    kind: DiagnosticKind::Execution,
                    detail: e.to_string(),
                });
            }
        }
    }

    evaluation
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyRecord;
    use crate::validation::rules::{CheckSpec, RuleCategory, ENTITY_TYPE_PROPERTY};
    use serde_json::json;

    fn rule(code: &str, kind: &str, params: serde_json::Value) -> ValidationRule {
        let now = chrono::Utc::now();
        ValidationRule {
            id: 1,
            code: code.to_string(),
            name: code.to_string(),
            description: None,
            category: RuleCategory::Regulatory,
            severity: Severity::Error,
            entity_type: ENTITY_TYPE_PROPERTY.to_string(),
            check: CheckSpec {
                kind: kind.to_string(),
                params,
            },
            reference: None,
            is_active: true,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext {
            today: chrono::NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
        }
    }

    #[test]
    fn negative_assessed_value_yields_exactly_one_issue() {
        let rules = vec![rule(
            "R1",
            "non_negative",
            json!({"field": "assessed_value"}),
        )];
        let (compiled, diagnostics) = compile_rules(&rules, ENTITY_TYPE_PROPERTY);
        assert!(diagnostics.is_empty());

        let record = PropertyRecord {
            parcel_number: "P1".to_string(),
            assessed_value: Some(-500),
            ..Default::default()
        };
        let evaluation = evaluate_property(&record, &compiled, &ctx());
        assert_eq!(evaluation.issues.len(), 1);
        let issue = &evaluation.issues[0];
        assert_eq!(issue.rule_code, "R1");
        assert_eq!(issue.severity, Severity::Error);
        assert!(issue.message.contains("-500"));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let rules = vec![
            rule("R1", "non_negative", json!({"field": "assessed_value"})),
            rule("R2", "required", json!({"field": "owner_name"})),
        ];
        let (compiled, _) = compile_rules(&rules, ENTITY_TYPE_PROPERTY);
        let record = PropertyRecord {
            assessed_value: Some(-500),
            ..Default::default()
        };

        let first = evaluate_property(&record, &compiled, &ctx());
        let second = evaluate_property(&record, &compiled, &ctx());
        assert_eq!(first.issues, second.issues);
        assert_eq!(first.issues.len(), 2);
    }

    #[test]
    fn inactive_rules_are_never_evaluated() {
        let mut inactive = rule("R1", "non_negative", json!({"field": "assessed_value"}));
        inactive.is_active = false;
        let (compiled, diagnostics) = compile_rules(&[inactive], ENTITY_TYPE_PROPERTY);
        assert!(compiled.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn other_entity_types_are_filtered_out() {
        let mut other = rule("R1", "non_negative", json!({"field": "assessed_value"}));
        other.entity_type = "levy_district".to_string();
        let (compiled, _) = compile_rules(&[other], ENTITY_TYPE_PROPERTY);
        assert!(compiled.is_empty());
    }

    #[test]
    fn bad_rule_is_isolated_as_configuration_diagnostic() {
        let rules = vec![
            rule("BAD", "frobnicate", json!({})),
            rule("R1", "non_negative", json!({"field": "assessed_value"})),
        ];
        let (compiled, diagnostics) = compile_rules(&rules, ENTITY_TYPE_PROPERTY);
        assert_eq!(compiled.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_code, "BAD");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Configuration);

        // The good rule still fires.
        let record = PropertyRecord {
            assessed_value: Some(-1),
            ..Default::default()
        };
        let evaluation = evaluate_property(&record, &compiled, &ctx());
        assert_eq!(evaluation.issues.len(), 1);
        assert_eq!(evaluation.issues[0].rule_code, "R1");
    }

    #[test]
    fn execution_failure_is_a_diagnostic_not_an_issue() {
        let rules = vec![
            rule(
                "RATIO",
                "ratio_within",
                json!({
                    "numerator": "assessed_value",
                    "denominator": "market_value",
                    "min": 0.9,
                    "max": 1.1
                }),
            ),
            rule("R1", "non_negative", json!({"field": "land_value"})),
        ];
        let (compiled, _) = compile_rules(&rules, ENTITY_TYPE_PROPERTY);

        // Zero denominator makes the ratio check unexecutable for this record.
        let record = PropertyRecord {
            assessed_value: Some(100),
            market_value: Some(0),
            land_value: Some(-5),
            ..Default::default()
        };
        let evaluation = evaluate_property(&record, &compiled, &ctx());
        assert_eq!(evaluation.diagnostics.len(), 1);
        assert_eq!(evaluation.diagnostics[0].kind, DiagnosticKind::Execution);
        // The other rule's violation still appears.
        assert_eq!(evaluation.issues.len(), 1);
        assert_eq!(evaluation.issues[0].rule_code, "R1");
    }
}
