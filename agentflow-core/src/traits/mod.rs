//! ABOUTME: External-interface traits the core depends on, supplied by other crates at construction

pub mod oracle;
pub mod rollback;
pub mod step_runner;
pub mod tool_registry;

pub use oracle::{Oracle, OracleError, OracleOptions};
pub use rollback::{RollbackController, RollbackError};
pub use step_runner::StepRunner;
pub use tool_registry::{
    looks_destructive, ParameterDescriptor, ToolDescriptor, ToolInvocationContext,
    ToolInvocationResult, ToolRegistry,
};
