pub mod issues;
pub mod properties;
pub mod validation;
