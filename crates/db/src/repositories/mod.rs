//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod property_repo;
pub mod validation_issue_repo;
pub mod validation_rule_repo;

pub use property_repo::PropertyRepo;
pub use validation_issue_repo::ValidationIssueRepo;
pub use validation_rule_repo::ValidationRuleRepo;
