//! ABOUTME: Step definition: variant payloads, retry/rollback configuration, status
//! ABOUTME: One node of a workflow's dependency DAG

use crate::ids::StepId;
use crate::result::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Discriminant for which variant payload a step carries. Kept distinct from
/// the payload enum itself so a partially-parsed step (e.g. from a malformed
/// planner response) can still declare its intended type even if the
/// payload failed to parse — see `StepVariant::Unparsed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepType {
    Tool,
    Oracle,
    Conditional,
    Parallel,
    Loop,
    HumanInput,
    Checkpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HumanInputType {
    Text,
    Choice,
    Confirm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RollbackActionKind {
    Tool { name: String, parameters: HashMap<String, Value> },
    Custom { handler: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackAction {
    pub action: RollbackActionKind,
}

/// Invariant S1: exactly one of these is populated, and it matches
/// `Step::step_type`. A planner response whose step shape doesn't match any
/// known variant is rejected during plan materialization rather than stored
/// here, so every `Step` that reaches a workflow has a well-formed variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepVariant {
    Tool {
        name: String,
        parameters: HashMap<String, Value>,
    },
    Oracle {
        prompt: String,
        system_prompt: Option<String>,
        output_key: String,
    },
    Conditional {
        expression: String,
        then_steps: Vec<StepId>,
        else_steps: Vec<StepId>,
    },
    Parallel {
        step_ids: Vec<StepId>,
        wait_for_all: bool,
    },
    Loop {
        items_key: String,
        item_key: String,
        body_steps: Vec<StepId>,
    },
    HumanInput {
        prompt: String,
        input_type: HumanInputType,
        choices: Option<Vec<String>>,
        output_key: String,
    },
    Checkpoint,
}

impl StepVariant {
    #[must_use]
    pub fn step_type(&self) -> StepType {
        match self {
            Self::Tool { .. } => StepType::Tool,
            Self::Oracle { .. } => StepType::Oracle,
            Self::Conditional { .. } => StepType::Conditional,
            Self::Parallel { .. } => StepType::Parallel,
            Self::Loop { .. } => StepType::Loop,
            Self::HumanInput { .. } => StepType::HumanInput,
            Self::Checkpoint => StepType::Checkpoint,
        }
    }

    /// Step ids this variant refers to structurally (not dependency edges):
    /// branch targets, fan-out siblings, loop body steps. Used by the
    /// executor to mark unselected branches `skipped` and to validate
    /// invariant S2.
    #[must_use]
    pub fn referenced_step_ids(&self) -> Vec<StepId> {
        match self {
            Self::Conditional { then_steps, else_steps, .. } => {
                then_steps.iter().chain(else_steps.iter()).copied().collect()
            }
            Self::Parallel { step_ids, .. } => step_ids.clone(),
            Self::Loop { body_steps, .. } => body_steps.clone(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Error codes this step will NOT retry on even if the failure was
    /// reported recoverable -- spec.md §3's `retryConfig.retryableErrors`
    /// negative list. `None` retries on any recoverable failure.
    pub retryable_errors: Option<Vec<ErrorCode>>,
}

impl RetryConfig {
    /// Delay before attempt `attempt` (1-indexed retry number, i.e. the
    /// delay preceding the *next* attempt after a failed one), capped at
    /// 60 seconds.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped = scaled.min(60_000.0).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Whether a failure with this code should still be retried. A code
    /// present in `retryable_errors` is excluded from retry regardless of
    /// the tool/oracle's own `recoverable` flag.
    #[must_use]
    pub fn permits_retry(&self, code: ErrorCode) -> bool {
        !self.retryable_errors.as_ref().is_some_and(|excluded| excluded.contains(&code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    RolledBack,
}

impl StepStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::RolledBack
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub variant: StepVariant,
    pub dependencies: HashSet<StepId>,
    pub status: StepStatus,
    pub retry_config: Option<RetryConfig>,
    pub rollback_action: Option<RollbackAction>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Step {
    #[must_use]
    pub fn new(variant: StepVariant) -> Self {
        Self {
            id: StepId::new(),
            variant,
            dependencies: HashSet::new(),
            status: StepStatus::Pending,
            retry_config: None,
            rollback_action: None,
            started_at: None,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: StepId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dep: StepId) -> Self {
        self.dependencies.insert(dep);
        self
    }

    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = StepId>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry_config = Some(retry);
        self
    }

    #[must_use]
    pub fn with_rollback_action(mut self, action: RollbackAction) -> Self {
        self.rollback_action = Some(action);
        self
    }

    #[must_use]
    pub fn step_type(&self) -> StepType {
        self.variant.step_type()
    }

    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) if end >= start => (end - start).to_std().ok(),
            _ => None,
        }
    }
}
