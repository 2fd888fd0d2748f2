//! ABOUTME: Step Runner interface consumed by the executor, kept behind a trait object to avoid a cyclic crate dependency
//! ABOUTME: Concrete implementation lives in agentflow-runner; the executor only ever sees this trait object

use crate::context::WorkflowContext;
use crate::ids::StepId;
use crate::result::StepResult;
use crate::step::Step;
use async_trait::async_trait;

/// Single-writer on `step` and `context`: the caller (the executor)
/// guarantees no concurrent invocation for the same step id, and that the
/// context handed in is not mutated by anyone else while this call is
/// in-flight.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn execute_step(&self, step: &Step, context: &mut WorkflowContext) -> StepResult;

    /// Flip the per-step cancellation signal. In-flight tools observe it
    /// cooperatively; the step terminates with `ErrorCode::Cancelled` once
    /// observed.
    fn cancel_step(&self, step_id: StepId);

    /// Deliver a suspended `humanInput` step's value. Returns `false` if no
    /// step with that id is currently suspended.
    fn provide_input(&self, step_id: StepId, value: serde_json::Value) -> bool;
}
