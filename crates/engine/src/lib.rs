//! Validation engine orchestration: rule catalog service, issue lifecycle,
//! batch runs, background jobs, and jurisdiction seeding, all over an
//! abstract [`store::PropertyStore`].

pub mod catalog;
pub mod issues;
pub mod jobs;
pub mod runner;
pub mod seed;
pub mod store;

use taxroll_core::error::CoreError;

use crate::store::StoreError;

/// Error type for engine services.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A run was stopped by cooperative cancellation. Already-committed
    /// batches stay committed; re-running is safe.
    #[error("Validation run cancelled")]
    Cancelled,
}

/// Convenience alias for engine service results.
pub type EngineResult<T> = Result<T, EngineError>;
