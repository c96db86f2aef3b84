//! Validation issue entity and status lifecycle.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};
use crate::validation::rules::Severity;

// ---------------------------------------------------------------------------
// Status lifecycle
// ---------------------------------------------------------------------------

/// Issue lifecycle state.
///
/// Transitions: `open -> {acknowledged, resolved, waived}`,
/// `acknowledged -> {resolved, waived}`. Resolved and waived are terminal;
/// re-detection after a terminal state creates a new issue record rather
/// than reverting status, so history stays unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Open,
    Acknowledged,
    Resolved,
    Waived,
}

impl IssueStatus {
    pub const ALL: &'static [IssueStatus] = &[
        IssueStatus::Open,
        IssueStatus::Acknowledged,
        IssueStatus::Resolved,
        IssueStatus::Waived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Acknowledged => "acknowledged",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Waived => "waived",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "open" => Ok(IssueStatus::Open),
            "acknowledged" => Ok(IssueStatus::Acknowledged),
            "resolved" => Ok(IssueStatus::Resolved),
            "waived" => Ok(IssueStatus::Waived),
            other => Err(CoreError::Validation(format!(
                "Unknown issue status: '{other}'"
            ))),
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IssueStatus::Resolved | IssueStatus::Waived)
    }

    /// An issue still counts against the property until it reaches a
    /// terminal state.
    pub fn is_outstanding(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the transition `self -> to` is legal.
    pub fn can_transition_to(&self, to: IssueStatus) -> bool {
        match self {
            IssueStatus::Open => matches!(
                to,
                IssueStatus::Acknowledged | IssueStatus::Resolved | IssueStatus::Waived
            ),
            IssueStatus::Acknowledged => {
                matches!(to, IssueStatus::Resolved | IssueStatus::Waived)
            }
            IssueStatus::Resolved | IssueStatus::Waived => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Issue entity
// ---------------------------------------------------------------------------

/// A recorded violation of a rule against a specific property.
///
/// `severity` is the rule's severity at detection time; later rule edits
/// never rewrite it. `superseded_by` links an issue that was replaced by
/// a re-detection with a different message.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub id: DbId,
    pub property_id: DbId,
    pub rule_code: String,
    pub severity: Severity,
    pub message: String,
    pub detected_at: Timestamp,
    pub status: IssueStatus,
    pub resolution: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub superseded_by: Option<DbId>,
}

/// A requested status transition.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueTransition {
    pub status: IssueStatus,
    pub resolution: Option<String>,
    pub actor: Option<String>,
}

/// Filter for listing issues across properties.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
