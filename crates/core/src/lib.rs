//! Pure domain logic for the property assessment platform.
//!
//! No database access and no async I/O — everything here is deterministic
//! given its inputs, which keeps rule evaluation testable without a store.

pub mod error;
pub mod jurisdiction;
pub mod property;
pub mod types;
pub mod validation;
