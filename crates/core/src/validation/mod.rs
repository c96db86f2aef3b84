//! Property data validation engine.
//!
//! Rule definitions, a closed dispatch table of executable checks, a pure
//! evaluator, issue lifecycle types, and write planning for recording
//! detections — all without database dependencies.

pub mod checks;
pub mod evaluator;
pub mod issue;
pub mod recording;
pub mod rules;
