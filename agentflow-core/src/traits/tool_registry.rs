//! ABOUTME: Tool Registry interface: the external library of named side-effectful operations
//! ABOUTME: Consumed by the step runner; concrete tool implementations live outside this workspace

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// A minimal JSON-schema-shaped parameter descriptor. Full JSON Schema
/// validation is a tool-registry concern; the core only needs enough shape
/// to list tools for the planner's system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescriptor>,
}

#[derive(Debug, Clone)]
pub struct ToolInvocationContext {
    pub working_directory: PathBuf,
    pub cancel_signal: CancellationToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    /// If absent, a failed invocation defaults to recoverable = true.
    pub recoverable: Option<bool>,
}

impl ToolInvocationResult {
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            recoverable: None,
        }
    }

    #[must_use]
    pub fn err(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            recoverable: Some(recoverable),
        }
    }

    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.recoverable.unwrap_or(true)
    }
}

/// The external collaborator known as the "Tool Registry": lookup by
/// name plus invocation. This core crate never implements a tool -- concrete
/// tools (browser automation, email, git, filesystem, ...) live entirely
/// outside this workspace.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn describe_all(&self) -> Vec<ToolDescriptor>;
    fn describe(&self, name: &str) -> Option<ToolDescriptor>;
    fn contains(&self, name: &str) -> bool {
        self.describe(name).is_some()
    }

    async fn execute(
        &self,
        name: &str,
        parameters: HashMap<String, Value>,
        ctx: ToolInvocationContext,
    ) -> ToolInvocationResult;
}

/// Conservative, domain-agnostic heuristic for "this tool probably mutates
/// external state and deserves a checkpoint/confirmation before it runs"
/// (paired with the `requireConfirmationForDestructive` config key). Policy
/// about which operations truly count as destructive belongs to the tool
/// registry; this is only the fallback substring match.
#[must_use]
pub fn looks_destructive(tool_name: &str) -> bool {
    const MARKERS: &[&str] = &["write", "delete", "commit", "push"];
    let lower = tool_name.to_lowercase();
    MARKERS.iter().any(|m| lower.contains(m))
}
