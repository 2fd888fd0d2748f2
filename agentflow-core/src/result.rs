//! ABOUTME: Step execution results, structured log entries, and workflow-level errors
//! ABOUTME: Produced by the step runner, consumed by the executor and persisted verbatim

use crate::ids::StepId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
    pub data: Option<Value>,
}

impl LogEntry {
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A stable, machine-matchable error code. `Cancelled` is never retried and
/// never triggers recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    ToolError,
    OracleError,
    ExpressionError,
    HumanInputError,
    Cancelled,
    Timeout,
    Deadlock,
    PlanValidation,
    PlannerBlocked,
    SnapshotError,
    RestoreError,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub status: crate::step::StepStatus,
    pub output: Option<Value>,
    pub error: Option<StepError>,
    pub duration: Duration,
    pub retry_count: u32,
    pub logs: Vec<LogEntry>,
}

impl StepResult {
    #[must_use]
    pub fn success(step_id: StepId, output: Value, duration: Duration, retry_count: u32) -> Self {
        Self {
            step_id,
            status: crate::step::StepStatus::Completed,
            output: Some(output),
            error: None,
            duration,
            retry_count,
            logs: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(step_id: StepId, error: StepError, duration: Duration, retry_count: u32) -> Self {
        Self {
            step_id,
            status: crate::step::StepStatus::Failed,
            output: None,
            error: Some(error),
            duration,
            retry_count,
            logs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_logs(mut self, logs: Vec<LogEntry>) -> Self {
        self.logs = logs;
        self
    }

    /// Strips `Debug`-level entries, implementing the non-verbose default
    /// for spec.md §6's `verboseLogging`.
    #[must_use]
    pub fn without_debug_logs(mut self) -> Self {
        self.logs.retain(|entry| entry.level != LogLevel::Debug);
        self
    }
}

/// Workflow-level error, attached to `Workflow::error` once status becomes
/// `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowError {
    pub step_id: Option<StepId>,
    pub code: ErrorCode,
    pub message: String,
    pub stack: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub recovery_attempted: bool,
    pub recovery_succeeded: Option<bool>,
}

impl WorkflowError {
    #[must_use]
    pub fn new(step_id: Option<StepId>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            step_id,
            code,
            message: message.into(),
            stack: None,
            timestamp: chrono::Utc::now(),
            recovery_attempted: false,
            recovery_succeeded: None,
        }
    }
}
