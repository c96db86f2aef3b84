//! Write planning for recording detections against existing issues.
//!
//! Re-running validation must never silently overwrite an unresolved
//! issue. The plan computed here appends genuinely new detections,
//! supersedes outstanding issues whose violation changed (the old record
//! is closed with a supersession note and linked to its replacement), and
//! leaves an unchanged outstanding violation alone so repeated runs are
//! no-ops. Outstanding issues whose rule now passes are also left alone;
//! closing them is an explicit lifecycle action, not a side effect.

use serde::Serialize;

use crate::types::DbId;
use crate::validation::evaluator::IssueDraft;
use crate::validation::issue::ValidationIssue;

/// Resolution note recorded on an issue closed by supersession.
pub const SUPERSEDED_RESOLUTION: &str = "Superseded by re-detection with updated finding";

/// An outstanding issue to close because a re-detection replaced it.
/// `replacement` indexes into [`IssueWritePlan::append`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Supersession {
    pub issue_id: DbId,
    pub replacement: usize,
}

/// The writes required to record one evaluation of one property.
#[derive(Debug, Default, Serialize)]
pub struct IssueWritePlan {
    /// New issue records to insert.
    pub append: Vec<IssueDraft>,
    /// Outstanding issues to close as superseded, linked to their
    /// replacements in `append`.
    pub supersede: Vec<Supersession>,
    /// Outstanding issues matched by an identical re-detection; kept as-is.
    pub unchanged: Vec<DbId>,
    /// Outstanding issue count after the plan is applied, for the
    /// denormalized property status.
    pub outstanding_after: i32,
}

impl IssueWritePlan {
    /// True when applying the plan writes nothing.
    pub fn is_noop(&self) -> bool {
        self.append.is_empty() && self.supersede.is_empty()
    }
}

/// Compute the writes for one evaluation pass.
///
/// `outstanding` is the property's current non-terminal issues; `drafts`
/// is what the evaluator just detected.
pub fn plan_issue_writes(
    outstanding: &[ValidationIssue],
    drafts: Vec<IssueDraft>,
) -> IssueWritePlan {
    let mut plan = IssueWritePlan::default();
    let mut matched: Vec<DbId> = Vec::new();

    // Exact (rule, message) matches claim their records first, so an
    // unchanged violation never loses its record to a changed sibling
    // of the same rule.
    let mut changed: Vec<IssueDraft> = Vec::new();
    for draft in drafts {
        let existing = outstanding.iter().find(|issue| {
            issue.rule_code == draft.rule_code
                && issue.message == draft.message
                && !matched.contains(&issue.id)
        });
        match existing {
            Some(issue) => {
                matched.push(issue.id);
                plan.unchanged.push(issue.id);
            }
            None => changed.push(draft),
        }
    }

    for draft in changed {
        let existing = outstanding
            .iter()
            .find(|issue| issue.rule_code == draft.rule_code && !matched.contains(&issue.id));
        match existing {
            Some(issue) => {
                matched.push(issue.id);
                plan.supersede.push(Supersession {
                    issue_id: issue.id,
                    replacement: plan.append.len(),
                });
                plan.append.push(draft);
            }
            None => plan.append.push(draft),
        }
    }

    plan.outstanding_after =
        (outstanding.len() - plan.supersede.len() + plan.append.len()) as i32;
    plan
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::issue::IssueStatus;
    use crate::validation::rules::Severity;

    fn draft(rule_code: &str, message: &str) -> IssueDraft {
        IssueDraft {
            rule_code: rule_code.to_string(),
            severity: Severity::Error,
            message: message.to_string(),
        }
    }

    fn outstanding(id: DbId, rule_code: &str, message: &str) -> ValidationIssue {
        ValidationIssue {
            id,
            property_id: 1,
            rule_code: rule_code.to_string(),
            severity: Severity::Error,
            message: message.to_string(),
            detected_at: chrono::Utc::now(),
            status: IssueStatus::Open,
            resolution: None,
            resolved_by: None,
            resolved_at: None,
            superseded_by: None,
        }
    }

    #[test]
    fn first_detection_appends() {
        let plan = plan_issue_writes(&[], vec![draft("R1", "assessed_value was -500")]);
        assert_eq!(plan.append.len(), 1);
        assert!(plan.supersede.is_empty());
        assert_eq!(plan.outstanding_after, 1);
    }

    #[test]
    fn identical_redetection_is_a_noop() {
        let existing = outstanding(10, "R1", "assessed_value was -500");
        let plan = plan_issue_writes(
            std::slice::from_ref(&existing),
            vec![draft("R1", "assessed_value was -500")],
        );
        assert!(plan.is_noop());
        assert_eq!(plan.unchanged, vec![10]);
        assert_eq!(plan.outstanding_after, 1);
    }

    #[test]
    fn changed_violation_supersedes_rather_than_overwrites() {
        let existing = outstanding(10, "R1", "assessed_value was -500");
        let plan = plan_issue_writes(
            std::slice::from_ref(&existing),
            vec![draft("R1", "assessed_value was -900")],
        );
        assert_eq!(plan.append.len(), 1);
        assert_eq!(
            plan.supersede,
            vec![Supersession {
                issue_id: 10,
                replacement: 0
            }]
        );
        // One closed, one opened.
        assert_eq!(plan.outstanding_after, 1);
    }

    #[test]
    fn passing_rule_leaves_outstanding_issue_untouched() {
        let existing = outstanding(10, "R1", "assessed_value was -500");
        let plan = plan_issue_writes(std::slice::from_ref(&existing), vec![]);
        assert!(plan.is_noop());
        assert!(plan.unchanged.is_empty());
        assert_eq!(plan.outstanding_after, 1);
    }

    #[test]
    fn exact_match_claims_its_record_before_supersession() {
        let existing = vec![
            outstanding(10, "R1", "assessed_value was -500"),
            outstanding(11, "R1", "land_value was -10"),
        ];
        // Re-detecting only the second issue must not supersede the first.
        let plan = plan_issue_writes(&existing, vec![draft("R1", "land_value was -10")]);
        assert!(plan.is_noop());
        assert_eq!(plan.unchanged, vec![11]);
        assert_eq!(plan.outstanding_after, 2);
    }

    #[test]
    fn changed_sibling_supersedes_the_remaining_record() {
        let existing = vec![
            outstanding(10, "R1", "assessed_value was -500"),
            outstanding(11, "R1", "land_value was -10"),
        ];
        let plan = plan_issue_writes(
            &existing,
            vec![
                draft("R1", "land_value was -10"),
                draft("R1", "assessed_value was -900"),
            ],
        );
        assert_eq!(plan.unchanged, vec![11]);
        assert_eq!(
            plan.supersede,
            vec![Supersession {
                issue_id: 10,
                replacement: 0
            }]
        );
        assert_eq!(plan.append.len(), 1);
        assert_eq!(plan.outstanding_after, 2);
    }

    #[test]
    fn independent_rules_do_not_interfere() {
        let existing = outstanding(10, "R1", "assessed_value was -500");
        let plan = plan_issue_writes(
            std::slice::from_ref(&existing),
            vec![
                draft("R1", "assessed_value was -500"),
                draft("R2", "owner_name is required but missing"),
            ],
        );
        assert_eq!(plan.append.len(), 1);
        assert_eq!(plan.append[0].rule_code, "R2");
        assert_eq!(plan.unchanged, vec![10]);
        assert_eq!(plan.outstanding_after, 2);
    }
}
