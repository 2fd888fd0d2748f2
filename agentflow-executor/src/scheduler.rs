//! ABOUTME: WorkflowExecutor: the dependency-driven scheduler that turns a planned Workflow into completed steps
//! ABOUTME: A Kahn's-algorithm ready-set loop, generalized to a live async scheduler with bounded parallelism, pause/resume/cancel, checkpoint policy, and failure recovery

use crate::error::ExecutorError;
use crate::loop_expand;
use crate::persistence::WorkflowStore;
use agentflow_core::{
    ErrorCode, RollbackController, Step, StepError, StepId, StepResult, StepRunner, StepStatus,
    StepVariant, Workflow, WorkflowContext, WorkflowError, WorkflowId, WorkflowStatus,
};
use agentflow_config::EngineConfig;
use agentflow_events::{EventBus, WorkflowEvent};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A step's execution outcome paired with the context clone it mutated,
/// returned from a spawned task so the scheduler can merge it back under
/// the single-writer discipline described on [`agentflow_core::traits::StepRunner`].
type StepTaskResult = (StepId, StepResult, WorkflowContext);

struct ParallelBarrier {
    member_order: Vec<StepId>,
    remaining: HashSet<StepId>,
    wait_for_all: bool,
}

struct LoopProgress {
    items: Vec<Value>,
    item_key: String,
    body_steps: Vec<StepId>,
    next_index: usize,
    watch: StepId,
    clone_ids: HashSet<StepId>,
}

enum NextAction {
    Run(StepId),
    Checkpoint(StepId),
    OpenParallel(StepId, Vec<StepId>, bool),
    OpenLoop(StepId, Vec<Value>, String, Vec<StepId>),
}

/// Runs exactly one workflow to a terminal status. The engine crate keeps
/// one executor instance per in-flight workflow; `pause`/`resume`/`cancel`/
/// `provide_input` are safe to call from another task while `run` is
/// in-flight.
pub struct WorkflowExecutor {
    runner: Arc<dyn StepRunner>,
    rollback: Arc<dyn RollbackController>,
    config: EngineConfig,
    events: Option<EventBus>,
    store: Option<WorkflowStore>,
    paused: AtomicBool,
    resume_notify: Notify,
    cancel: CancellationToken,
}

impl WorkflowExecutor {
    #[must_use]
    pub fn new(runner: Arc<dyn StepRunner>, rollback: Arc<dyn RollbackController>, config: EngineConfig) -> Self {
        Self {
            runner,
            rollback,
            config,
            events: None,
            store: None,
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: WorkflowStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn request_pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn request_resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume_notify.notify_waiters();
    }

    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn provide_input(&self, step_id: StepId, value: Value) -> bool {
        self.runner.provide_input(step_id, value)
    }

    /// Purges persisted workflows that finished more than `max_age` ago,
    /// implementing the `logRetention` config knob (spec.md §6). A no-op if
    /// the executor was built without a [`WorkflowStore`].
    pub fn purge_expired_workflows(&self, max_age: Duration) -> usize {
        self.store.as_ref().map_or(0, |store| store.purge_terminal_older_than(max_age))
    }

    /// Drives `workflow` from its current status through to `Completed`,
    /// `Failed`, or `Cancelled`. Every one of those is a successful return;
    /// only a malformed plan or an illegal internal state transition
    /// produces an `Err`.
    pub async fn run(&self, workflow: &mut Workflow) -> Result<(), ExecutorError> {
        workflow.validate_step_references()?;

        if workflow.status == WorkflowStatus::Pending {
            workflow.transition_to(WorkflowStatus::Planning)?;
        }
        workflow.transition_to(WorkflowStatus::Running)?;
        self.emit(WorkflowEvent::Started { workflow_id: workflow.id });
        self.persist(workflow);

        let deadline = tokio::time::Instant::now() + self.config.max_duration();
        let mut in_flight: JoinSet<StepTaskResult> = JoinSet::new();
        let mut pre_dispatch: HashMap<StepId, WorkflowContext> = HashMap::new();
        let mut dispatched: HashSet<StepId> = HashSet::new();
        let mut parallel_barriers: HashMap<StepId, ParallelBarrier> = HashMap::new();
        let mut loop_progress: HashMap<StepId, LoopProgress> = HashMap::new();
        let mut last_checkpoint_at_result_count: Option<usize> = None;

        loop {
            if self.cancel.is_cancelled() {
                self.handle_cancellation(workflow, &mut in_flight, &mut pre_dispatch).await;
                return Ok(());
            }

            if self.paused.load(Ordering::SeqCst) {
                if workflow.status != WorkflowStatus::Paused {
                    workflow.transition_to(WorkflowStatus::Paused)?;
                    self.emit(WorkflowEvent::Paused { workflow_id: workflow.id });
                    self.persist(workflow);
                }
                tokio::select! {
                    () = self.resume_notify.notified() => {}
                    () = self.cancel.cancelled() => {
                        self.handle_cancellation(workflow, &mut in_flight, &mut pre_dispatch).await;
                        return Ok(());
                    }
                }
                if !self.paused.load(Ordering::SeqCst) {
                    workflow.transition_to(WorkflowStatus::Running)?;
                    self.emit(WorkflowEvent::Resumed { workflow_id: workflow.id });
                    self.persist(workflow);
                }
                continue;
            }

            // spec.md §4.4: "immediately before dispatching a step, if
            // |results| > 0 and |results| mod checkpointInterval == 0".
            // Checked once per outer iteration, not per dispatched step, so a
            // single milestone doesn't re-checkpoint for every step dispatched
            // while the count holds steady.
            let result_count = workflow.results.len();
            if self.config.auto_checkpoint
                && result_count > 0
                && self.config.checkpoint_interval > 0
                && result_count % self.config.checkpoint_interval == 0
                && last_checkpoint_at_result_count != Some(result_count)
            {
                if let Some(last_step_id) = workflow.results.last().map(|r| r.step_id) {
                    if let Ok(checkpoint) = self.create_checkpoint(workflow, last_step_id).await {
                        self.emit(WorkflowEvent::CheckpointCreated { workflow_id: workflow.id, checkpoint_id: checkpoint.id });
                    }
                }
                last_checkpoint_at_result_count = Some(result_count);
            }

            while in_flight.len() < self.config.max_parallel_steps.max(1) {
                match next_dispatchable(workflow, &dispatched, &parallel_barriers, &loop_progress) {
                    Some(NextAction::Run(step_id)) => {
                        self.dispatch_step(workflow, step_id, &mut in_flight, &mut pre_dispatch);
                        dispatched.insert(step_id);
                    }
                    Some(NextAction::Checkpoint(step_id)) => {
                        self.run_checkpoint_step(workflow, step_id).await?;
                        last_checkpoint_at_result_count = Some(workflow.results.len());
                    }
                    Some(NextAction::OpenParallel(step_id, step_ids, wait_for_all)) => {
                        if let Some(step) = workflow.step_mut(step_id) {
                            step.status = StepStatus::Running;
                            step.started_at = Some(chrono::Utc::now());
                        }
                        self.emit(WorkflowEvent::StepStarted { workflow_id: workflow.id, step_id });
                        parallel_barriers.insert(
                            step_id,
                            ParallelBarrier {
                                remaining: step_ids.iter().copied().collect(),
                                member_order: step_ids,
                                wait_for_all,
                            },
                        );
                    }
                    Some(NextAction::OpenLoop(step_id, items, item_key, body_steps)) => {
                        self.open_loop(workflow, &mut loop_progress, step_id, items, item_key, body_steps);
                    }
                    None => break,
                }
            }

            if in_flight.is_empty() {
                if all_steps_terminal(workflow) && parallel_barriers.is_empty() && loop_progress.is_empty() {
                    workflow.transition_to(WorkflowStatus::Completed)?;
                    let duration = workflow
                        .started_at
                        .and_then(|started| (chrono::Utc::now() - started).to_std().ok())
                        .unwrap_or_default();
                    self.emit(WorkflowEvent::Completed { workflow_id: workflow.id, duration });
                    self.persist(workflow);
                    return Ok(());
                }
                self.fail_with(workflow, None, ErrorCode::Deadlock, "no step is ready and none are in flight").await?;
                return Ok(());
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.handle_cancellation(workflow, &mut in_flight, &mut pre_dispatch).await;
                    return Ok(());
                }
                () = tokio::time::sleep_until(deadline) => {
                    self.fail_with(workflow, None, ErrorCode::Timeout, "workflow exceeded its maximum duration").await?;
                    self.cancel_in_flight_steps(workflow, &mut in_flight, &mut pre_dispatch).await;
                    return Ok(());
                }
                joined = in_flight.join_next() => {
                    let Some(joined) = joined else { continue; };
                    let Ok((step_id, result, post_context)) = joined else {
                        tracing::error!("step execution task panicked; the step will never resolve");
                        continue;
                    };
                    if let Some(pre) = pre_dispatch.remove(&step_id) {
                        merge_context(&mut workflow.context, &pre, post_context);
                    }
                    dispatched.remove(&step_id);

                    let is_completed = result.status == StepStatus::Completed;
                    let is_ordinary_failure = result.status == StepStatus::Failed
                        && result.error.as_ref().map(|e| e.code != ErrorCode::Cancelled).unwrap_or(true);

                    workflow.record_result(result.clone());
                    if let Some(step) = workflow.step_mut(step_id) {
                        step.status = result.status;
                        step.completed_at = Some(chrono::Utc::now());
                    }
                    self.emit_step_outcome(workflow.id, step_id, &result);

                    if is_completed {
                        self.resolve_parallel_membership(workflow, &mut parallel_barriers, step_id);
                        self.advance_loop(workflow, &mut loop_progress, step_id);
                        apply_conditional_branch(workflow, step_id, &result);
                    }

                    if is_ordinary_failure {
                        self.cancel_in_flight_steps(workflow, &mut in_flight, &mut pre_dispatch).await;
                        let code = result.error.as_ref().map_or(ErrorCode::Internal, |e| e.code);
                        let message = result.error.as_ref().map_or_else(|| "step failed".to_string(), |e| e.message.clone());
                        self.fail_with(workflow, Some(step_id), code, &message).await?;
                        return Ok(());
                    }

                    self.persist(workflow);
                }
            }
        }
    }

    fn dispatch_step(
        &self,
        workflow: &mut Workflow,
        step_id: StepId,
        in_flight: &mut JoinSet<StepTaskResult>,
        pre_dispatch: &mut HashMap<StepId, WorkflowContext>,
    ) {
        let Some(step) = workflow.step_mut(step_id) else { return };
        step.status = StepStatus::Running;
        step.started_at = Some(chrono::Utc::now());
        let step_snapshot = step.clone();

        pre_dispatch.insert(step_id, workflow.context.clone());
        let mut context_clone = workflow.context.clone();
        let runner = self.runner.clone();

        self.emit(WorkflowEvent::StepStarted { workflow_id: workflow.id, step_id });
        if let StepVariant::HumanInput { prompt, input_type, choices, .. } = &step_snapshot.variant {
            self.emit(WorkflowEvent::HumanInputRequired {
                workflow_id: workflow.id,
                step_id,
                prompt: prompt.clone(),
                input_type: input_type.clone(),
                choices: choices.clone(),
            });
        }
        in_flight.spawn(async move {
            let result = runner.execute_step(&step_snapshot, &mut context_clone).await;
            (step_id, result, context_clone)
        });
    }

    fn open_loop(
        &self,
        workflow: &mut Workflow,
        loop_progress: &mut HashMap<StepId, LoopProgress>,
        step_id: StepId,
        items: Vec<Value>,
        item_key: String,
        body_steps: Vec<StepId>,
    ) {
        if items.is_empty() {
            let result = StepResult::success(step_id, serde_json::json!([]), Duration::ZERO, 0);
            workflow.record_result(result.clone());
            if let Some(step) = workflow.step_mut(step_id) {
                step.status = StepStatus::Completed;
                step.started_at = Some(chrono::Utc::now());
                step.completed_at = Some(chrono::Utc::now());
            }
            self.emit_step_outcome(workflow.id, step_id, &result);
            return;
        }

        if let Some(step) = workflow.step_mut(step_id) {
            step.status = StepStatus::Running;
            step.started_at = Some(chrono::Utc::now());
        }
        self.emit(WorkflowEvent::StepStarted { workflow_id: workflow.id, step_id });

        workflow.context.step_outputs.insert(item_key.clone(), items[0].clone());
        let clone_ids = loop_expand::expand_iteration(workflow, step_id, &body_steps, 0, step_id);
        let watch = clone_ids.last().copied().unwrap_or(step_id);
        loop_progress.insert(
            step_id,
            LoopProgress {
                items,
                item_key,
                body_steps,
                next_index: 1,
                watch,
                clone_ids: clone_ids.into_iter().collect(),
            },
        );
    }

    async fn run_checkpoint_step(&self, workflow: &mut Workflow, step_id: StepId) -> Result<(), ExecutorError> {
        if let Some(step) = workflow.step_mut(step_id) {
            step.status = StepStatus::Running;
            step.started_at = Some(chrono::Utc::now());
        }
        let checkpoint = self.create_checkpoint(workflow, step_id).await?;
        self.emit(WorkflowEvent::CheckpointCreated { workflow_id: workflow.id, checkpoint_id: checkpoint.id });
        let result = StepResult::success(step_id, serde_json::json!(checkpoint.id.to_string()), Duration::ZERO, 0);
        workflow.record_result(result.clone());
        if let Some(step) = workflow.step_mut(step_id) {
            step.status = StepStatus::Completed;
            step.completed_at = Some(chrono::Utc::now());
        }
        self.emit_step_outcome(workflow.id, step_id, &result);
        Ok(())
    }

    async fn create_checkpoint(
        &self,
        workflow: &mut Workflow,
        step_id: StepId,
    ) -> Result<agentflow_core::Checkpoint, ExecutorError> {
        let checkpoint = self
            .rollback
            .create_checkpoint(workflow.id, step_id, &workflow.context)
            .await
            .map_err(|e| ExecutorError::Persistence(e.to_string()))?;
        workflow.checkpoints.push(checkpoint.clone());
        if workflow.checkpoints.len() > self.config.max_checkpoints {
            let overflow = workflow.checkpoints.len() - self.config.max_checkpoints;
            workflow.checkpoints.drain(0..overflow);
        }
        Ok(checkpoint)
    }

    fn resolve_parallel_membership(
        &self,
        workflow: &mut Workflow,
        barriers: &mut HashMap<StepId, ParallelBarrier>,
        finished_step_id: StepId,
    ) {
        let mut finalized = Vec::new();
        for (&container_id, barrier) in barriers.iter_mut() {
            if barrier.remaining.remove(&finished_step_id) && barrier.remaining.is_empty() {
                finalized.push(container_id);
            }
        }
        for container_id in finalized {
            let barrier = barriers.remove(&container_id).expect("container was just located above");
            let completed = barrier
                .member_order
                .iter()
                .filter(|id| workflow.result_for(**id).map(|r| r.status) == Some(StepStatus::Completed))
                .count();
            let is_success = if barrier.wait_for_all {
                completed == barrier.member_order.len()
            } else {
                completed > 0
            };
            let member_names: Vec<String> = barrier.member_order.iter().map(ToString::to_string).collect();
            let result = if is_success {
                StepResult::success(container_id, serde_json::json!(member_names), Duration::ZERO, 0)
            } else {
                let error = StepError {
                    code: ErrorCode::ToolError,
                    message: "no parallel branch completed successfully".to_string(),
                    recoverable: false,
                };
                StepResult::failure(container_id, error, Duration::ZERO, 0)
            };
            workflow.record_result(result.clone());
            if let Some(step) = workflow.step_mut(container_id) {
                step.status = result.status;
                step.completed_at = Some(chrono::Utc::now());
            }
            self.emit_step_outcome(workflow.id, container_id, &result);
        }
    }

    fn advance_loop(&self, workflow: &mut Workflow, loops: &mut HashMap<StepId, LoopProgress>, finished_step_id: StepId) {
        let Some(container_id) = loops.iter().find(|(_, p)| p.watch == finished_step_id).map(|(id, _)| *id) else {
            return;
        };
        let mut progress = loops.remove(&container_id).expect("container was just located above");

        if progress.next_index < progress.items.len() {
            let item = progress.items[progress.next_index].clone();
            workflow.context.step_outputs.insert(progress.item_key.clone(), item);
            let iteration = progress.next_index;
            let new_ids = loop_expand::expand_iteration(workflow, container_id, &progress.body_steps, iteration, progress.watch);
            if let Some(&last) = new_ids.last() {
                progress.watch = last;
            }
            progress.clone_ids.extend(new_ids);
            progress.next_index += 1;
            loops.insert(container_id, progress);
        } else {
            let result = StepResult::success(container_id, serde_json::json!(progress.next_index), Duration::ZERO, 0);
            workflow.record_result(result.clone());
            if let Some(step) = workflow.step_mut(container_id) {
                step.status = StepStatus::Completed;
                step.completed_at = Some(chrono::Utc::now());
            }
            self.emit_step_outcome(workflow.id, container_id, &result);
        }
    }

    async fn cancel_in_flight_steps(
        &self,
        workflow: &mut Workflow,
        in_flight: &mut JoinSet<StepTaskResult>,
        pre_dispatch: &mut HashMap<StepId, WorkflowContext>,
    ) {
        for step in &workflow.steps {
            if step.status == StepStatus::Running {
                self.runner.cancel_step(step.id);
            }
        }
        while let Some(joined) = in_flight.join_next().await {
            let Ok((step_id, result, post_context)) = joined else { continue };
            if let Some(pre) = pre_dispatch.remove(&step_id) {
                merge_context(&mut workflow.context, &pre, post_context);
            }
            workflow.record_result(result.clone());
            if let Some(step) = workflow.step_mut(step_id) {
                step.status = result.status;
                step.completed_at = Some(chrono::Utc::now());
            }
        }
    }

    async fn handle_cancellation(
        &self,
        workflow: &mut Workflow,
        in_flight: &mut JoinSet<StepTaskResult>,
        pre_dispatch: &mut HashMap<StepId, WorkflowContext>,
    ) {
        self.cancel_in_flight_steps(workflow, in_flight, pre_dispatch).await;
        if workflow.transition_to(WorkflowStatus::Cancelled).is_ok() {
            self.emit(WorkflowEvent::Cancelled { workflow_id: workflow.id });
            self.persist(workflow);
        }
    }

    /// Attempts rollback to the most recent checkpoint (if any) before
    /// settling the workflow in `Failed`. A step failing with
    /// `ErrorCode::Cancelled` never reaches here -- cancellation is a
    /// deliberate stop, not a failure to recover from.
    async fn fail_with(
        &self,
        workflow: &mut Workflow,
        step_id: Option<StepId>,
        code: ErrorCode,
        message: &str,
    ) -> Result<(), ExecutorError> {
        let mut error = WorkflowError::new(step_id, code, message);

        if let Some(checkpoint) = workflow.checkpoints.last().cloned() {
            workflow.transition_to(WorkflowStatus::RollingBack)?;
            self.emit(WorkflowEvent::RollbackStarted { workflow_id: workflow.id, to_checkpoint: checkpoint.id });
            let outcome = self.rollback.rollback_to_checkpoint(workflow.id, &checkpoint, &mut workflow.context).await;
            error.recovery_attempted = true;
            error.recovery_succeeded = Some(outcome.is_ok());
            match outcome {
                Ok(()) => self.emit(WorkflowEvent::RollbackCompleted { workflow_id: workflow.id }),
                Err(err) => tracing::warn!(workflow_id = %workflow.id, error = %err, "checkpoint restore failed during recovery"),
            }
        }

        workflow.error = Some(error.clone());
        workflow.transition_to(WorkflowStatus::Failed)?;
        self.emit(WorkflowEvent::Failed { workflow_id: workflow.id, error });
        self.persist(workflow);
        Ok(())
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.publish(event);
        }
    }

    fn emit_step_outcome(&self, workflow_id: WorkflowId, step_id: StepId, result: &StepResult) {
        match &result.error {
            Some(error) => self.emit(WorkflowEvent::StepFailed { workflow_id, step_id, error: error.clone() }),
            None => self.emit(WorkflowEvent::StepCompleted { workflow_id, step_id, result: Box::new(result.clone()) }),
        }
    }

    fn persist(&self, workflow: &Workflow) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(workflow) {
                tracing::warn!(workflow_id = %workflow.id, error = %err, "failed to persist workflow state");
            }
        }
    }
}

fn collect_loop_template_ids(workflow: &Workflow) -> HashSet<StepId> {
    workflow
        .steps
        .iter()
        .filter_map(|s| match &s.variant {
            StepVariant::Loop { body_steps, .. } => Some(body_steps.iter().copied()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn dependency_satisfied(
    workflow: &Workflow,
    barriers: &HashMap<StepId, ParallelBarrier>,
    loops: &HashMap<StepId, LoopProgress>,
    for_step: StepId,
    dep: StepId,
) -> bool {
    if let Some(barrier) = barriers.get(&dep) {
        return barrier.member_order.contains(&for_step);
    }
    if let Some(progress) = loops.get(&dep) {
        return progress.clone_ids.contains(&for_step);
    }
    matches!(
        workflow.step(dep).map(|s| s.status),
        Some(StepStatus::Completed | StepStatus::Skipped)
    )
}

fn is_ready(
    workflow: &Workflow,
    dispatched: &HashSet<StepId>,
    loop_template_ids: &HashSet<StepId>,
    barriers: &HashMap<StepId, ParallelBarrier>,
    loops: &HashMap<StepId, LoopProgress>,
    step: &Step,
) -> bool {
    if step.status != StepStatus::Pending {
        return false;
    }
    if dispatched.contains(&step.id) || loop_template_ids.contains(&step.id) {
        return false;
    }
    step.dependencies
        .iter()
        .all(|dep| dependency_satisfied(workflow, barriers, loops, step.id, *dep))
}

fn next_dispatchable(
    workflow: &Workflow,
    dispatched: &HashSet<StepId>,
    barriers: &HashMap<StepId, ParallelBarrier>,
    loops: &HashMap<StepId, LoopProgress>,
) -> Option<NextAction> {
    let loop_template_ids = collect_loop_template_ids(workflow);
    for step in &workflow.steps {
        if !is_ready(workflow, dispatched, &loop_template_ids, barriers, loops, step) {
            continue;
        }
        return Some(match &step.variant {
            StepVariant::Checkpoint => NextAction::Checkpoint(step.id),
            StepVariant::Parallel { step_ids, wait_for_all } => {
                NextAction::OpenParallel(step.id, step_ids.clone(), *wait_for_all)
            }
            StepVariant::Loop { items_key, item_key, body_steps } => {
                let items = resolve_items(&workflow.context, items_key);
                NextAction::OpenLoop(step.id, items, item_key.clone(), body_steps.clone())
            }
            _ => NextAction::Run(step.id),
        });
    }
    None
}

fn resolve_items(context: &WorkflowContext, items_key: &str) -> Vec<Value> {
    let value = context.step_outputs.get(items_key).or_else(|| context.user_input.get(items_key));
    match value {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn all_steps_terminal(workflow: &Workflow) -> bool {
    workflow.steps.iter().all(|s| s.status.is_terminal())
}

/// Merges one step task's contribution back into the live context: only
/// the keys and list entries that changed relative to `pre` (the snapshot
/// taken when the step was dispatched) are applied, so two steps dispatched
/// concurrently from the same base never clobber each other's unrelated
/// writes.
fn merge_context(live: &mut WorkflowContext, pre: &WorkflowContext, post: WorkflowContext) {
    for (key, value) in post.step_outputs {
        if pre.step_outputs.get(&key) != Some(&value) {
            live.step_outputs.insert(key, value);
        }
    }
    if post.code_changes.len() > pre.code_changes.len() {
        live.code_changes.extend(post.code_changes[pre.code_changes.len()..].iter().cloned());
    }
    if post.git_operations.len() > pre.git_operations.len() {
        live.git_operations.extend(post.git_operations[pre.git_operations.len()..].iter().cloned());
    }
    if post.files.len() > pre.files.len() {
        live.files.extend(post.files[pre.files.len()..].iter().cloned());
    }
}

/// Marks the not-taken branch of a completed `Conditional` step `Skipped`
/// so the scheduler's dependency-satisfied check can treat it as resolved
/// without ever dispatching it.
fn apply_conditional_branch(workflow: &mut Workflow, step_id: StepId, result: &StepResult) {
    let Some(step) = workflow.step(step_id) else { return };
    let StepVariant::Conditional { then_steps, else_steps, .. } = &step.variant else { return };
    let taken = matches!(result.output, Some(Value::Bool(true)));
    let skip_ids = if taken { else_steps.clone() } else { then_steps.clone() };

    for id in skip_ids {
        let should_skip = workflow.step(id).map(|s| s.status == StepStatus::Pending).unwrap_or(false);
        if !should_skip {
            continue;
        }
        let skip_result = StepResult {
            step_id: id,
            status: StepStatus::Skipped,
            output: None,
            error: None,
            duration: Duration::ZERO,
            retry_count: 0,
            logs: Vec::new(),
        };
        workflow.record_result(skip_result);
        if let Some(step) = workflow.step_mut(id) {
            step.status = StepStatus::Skipped;
            step.completed_at = Some(chrono::Utc::now());
        }
    }
}
