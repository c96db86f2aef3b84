#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} '{key}'")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A rule's stored check definition cannot be resolved to an executable
    /// check (unknown kind, unknown field, bad parameters, invalid regex).
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
