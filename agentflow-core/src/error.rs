//! ABOUTME: Error types shared by every agentflow core data structure
//! ABOUTME: Richer per-variant fields than a flat message, matched by planner/runner/executor crates

use thiserror::Error;

/// Errors raised while constructing or mutating the core data model itself
/// (as opposed to errors raised by the planner, runner, executor, or
/// rollback controller, which define their own error enums wrapping this
/// one where relevant).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("step '{step}' has invalid dependency '{dependency}'")]
    InvalidDependency { step: String, dependency: String },

    #[error("step '{step}' depends on itself")]
    SelfDependency { step: String },

    #[error("workflow contains a dependency cycle: {cycle:?}")]
    Cycle { cycle: Vec<String> },

    #[error("step '{step}' variant payload does not match declared type {expected:?}")]
    VariantMismatch { step: String, expected: String },

    #[error("illegal workflow status transition: {from:?} -> {to:?}")]
    IllegalStateTransition { from: String, to: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
