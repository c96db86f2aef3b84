//! Row structs matching database tables.
//!
//! Each row type is `FromRow` and carries an `into_*` conversion to the
//! corresponding `taxroll_core` domain type, parsing stored enum strings.

pub mod property;
pub mod validation;

pub use property::PropertyRow;
pub use validation::{ValidationIssueRow, ValidationRuleRow};
