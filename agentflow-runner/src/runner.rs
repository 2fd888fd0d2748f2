//! ABOUTME: DefaultStepRunner: per-variant dispatch table implementing the StepRunner trait
//! ABOUTME: State-transition idiom generalized across all seven step variants, not just tool calls

use crate::expr;
use crate::params::substitute_parameters;
use agentflow_core::context::substitute_placeholders;
use agentflow_core::{
    ErrorCode, HumanInputType, LogEntry, LogLevel, Oracle, OracleOptions, RetryConfig, Step, StepError,
    StepId, StepResult, StepRunner, StepVariant, ToolInvocationContext, ToolRegistry, WorkflowContext,
};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Used when a step declares no `retryConfig` of its own and the runner was
/// never given a configured default (spec.md §6's `defaultRetryAttempts`/
/// `defaultRetryDelayMs`): a single attempt, no retry.
const NO_RETRY: RetryConfig = RetryConfig {
    max_attempts: 1,
    delay_ms: 0,
    backoff_multiplier: 1.0,
    retryable_errors: None,
};

/// Executes one step at a time, dispatching on [`StepVariant`]. `Parallel`,
/// `Loop`, and `Checkpoint` are structural markers the executor expands or
/// acts on directly (Design Notes: "the executor performs the expansion");
/// this runner treats them as immediate no-op successes so the executor's
/// dispatch loop can call `execute_step` uniformly for every step.
pub struct DefaultStepRunner {
    tool_registry: Arc<dyn ToolRegistry>,
    oracle: Arc<dyn Oracle>,
    cancel_tokens: DashMap<StepId, CancellationToken>,
    pending_inputs: DashMap<StepId, oneshot::Sender<Value>>,
    verbose_logging: bool,
    default_retry: RetryConfig,
}

impl DefaultStepRunner {
    #[must_use]
    pub fn new(tool_registry: Arc<dyn ToolRegistry>, oracle: Arc<dyn Oracle>) -> Self {
        Self {
            tool_registry,
            oracle,
            cancel_tokens: DashMap::new(),
            pending_inputs: DashMap::new(),
            verbose_logging: false,
            default_retry: NO_RETRY,
        }
    }

    /// Matches spec.md §6's `verboseLogging`: when `false` (the default),
    /// `Debug`-level entries are stripped from a step's returned logs before
    /// the result reaches the executor.
    #[must_use]
    pub fn with_verbose_logging(mut self, enabled: bool) -> Self {
        self.verbose_logging = enabled;
        self
    }

    /// Sets the retry policy applied to a `tool`/`oracle` step that declares
    /// no `retryConfig` of its own, implementing spec.md §6's
    /// `defaultRetryAttempts`/`defaultRetryDelayMs` ("Step default").
    #[must_use]
    pub fn with_default_retry(mut self, max_attempts: u32, delay_ms: u64) -> Self {
        self.default_retry = RetryConfig { max_attempts, delay_ms, backoff_multiplier: 2.0, retryable_errors: None };
        self
    }

    fn filter_logs(&self, result: StepResult) -> StepResult {
        if self.verbose_logging {
            return result;
        }
        result.without_debug_logs()
    }

    fn cancel_token_for(&self, step_id: StepId) -> CancellationToken {
        self.cancel_tokens.entry(step_id).or_insert_with(CancellationToken::new).clone()
    }

    async fn run_tool(
        &self,
        step_id: StepId,
        name: &str,
        parameters: &std::collections::HashMap<String, Value>,
        retry: RetryConfig,
        context: &mut WorkflowContext,
    ) -> StepResult {
        let cancel = self.cancel_token_for(step_id);
        let started = Instant::now();
        let mut logs = Vec::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return cancelled_result(step_id, started, attempt - 1, logs);
            }

            let substituted = substitute_parameters(parameters, context);
            let tool_ctx = ToolInvocationContext {
                working_directory: context.working_directory.clone(),
                cancel_signal: cancel.clone(),
            };
            let result = self.tool_registry.execute(name, substituted, tool_ctx).await;

            if result.success {
                let output = result.data.unwrap_or(Value::Null);
                logs.push(LogEntry::new(LogLevel::Info, format!("tool '{name}' succeeded on attempt {attempt}")));
                context.write_output(step_id.to_string(), output.clone());
                return StepResult::success(step_id, output, started.elapsed(), attempt - 1).with_logs(logs);
            }

            let message = result.error.unwrap_or_else(|| "tool invocation failed".to_string());
            let recoverable = result.is_recoverable();
            logs.push(LogEntry::new(
                LogLevel::Warn,
                format!("tool '{name}' failed on attempt {attempt}: {message}"),
            ));

            if !recoverable || attempt >= retry.max_attempts || !retry.permits_retry(ErrorCode::ToolError) {
                let error = StepError { code: ErrorCode::ToolError, message, recoverable };
                return StepResult::failure(step_id, error, started.elapsed(), attempt - 1).with_logs(logs);
            }

            let delay = retry.delay_for_attempt(attempt);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return cancelled_result(step_id, started, attempt - 1, logs),
            }
        }
    }

    async fn run_oracle(
        &self,
        step_id: StepId,
        prompt: &str,
        system_prompt: Option<&str>,
        output_key: &str,
        retry: RetryConfig,
        context: &mut WorkflowContext,
    ) -> StepResult {
        let cancel = self.cancel_token_for(step_id);
        let started = Instant::now();
        let mut logs = Vec::new();
        let mut attempt = 0u32;
        let rendered_prompt = substitute_placeholders(prompt, context);
        let rendered_system = system_prompt.map(|s| substitute_placeholders(s, context));

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return cancelled_result(step_id, started, attempt - 1, logs);
            }

            let call = self.oracle.chat(&rendered_prompt, rendered_system.as_deref(), OracleOptions::default());
            let response = tokio::select! {
                res = call => res,
                () = cancel.cancelled() => return cancelled_result(step_id, started, attempt - 1, logs),
            };

            match response {
                Ok(reply) => {
                    logs.push(LogEntry::new(LogLevel::Info, format!("oracle call succeeded on attempt {attempt}")));
                    let value = Value::String(reply);
                    context.write_output(output_key.to_string(), value.clone());
                    context.write_output(step_id.to_string(), value.clone());
                    return StepResult::success(step_id, value, started.elapsed(), attempt - 1).with_logs(logs);
                }
                Err(err) => {
                    logs.push(LogEntry::new(LogLevel::Warn, format!("oracle call failed on attempt {attempt}: {err}")));
                    if attempt >= retry.max_attempts || !retry.permits_retry(ErrorCode::OracleError) {
                        let error = StepError {
                            code: ErrorCode::OracleError,
                            message: err.to_string(),
                            recoverable: true,
                        };
                        return StepResult::failure(step_id, error, started.elapsed(), attempt - 1).with_logs(logs);
                    }
                    let delay = retry.delay_for_attempt(attempt);
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => return cancelled_result(step_id, started, attempt - 1, logs),
                    }
                }
            }
        }
    }

    fn run_conditional(&self, step_id: StepId, expression: &str, context: &mut WorkflowContext) -> StepResult {
        let started = Instant::now();
        match expr::evaluate(expression, context) {
            Ok(result) => {
                let value = Value::Bool(result);
                context.write_output(step_id.to_string(), value.clone());
                StepResult::success(step_id, value, started.elapsed(), 0)
            }
            Err(err) => {
                let error = StepError {
                    code: ErrorCode::ExpressionError,
                    message: err.to_string(),
                    recoverable: false,
                };
                StepResult::failure(step_id, error, started.elapsed(), 0)
            }
        }
    }

    fn run_structural_marker(&self, step_id: StepId, label: &str) -> StepResult {
        let logs = vec![LogEntry::new(LogLevel::Debug, format!("{label} is a structural marker, no direct work performed"))];
        StepResult::success(step_id, Value::Null, std::time::Duration::ZERO, 0).with_logs(logs)
    }

    async fn run_human_input(
        &self,
        step_id: StepId,
        output_key: &str,
        input_type: &HumanInputType,
        choices: Option<&[String]>,
        context: &mut WorkflowContext,
    ) -> StepResult {
        let cancel = self.cancel_token_for(step_id);
        let started = Instant::now();
        let (tx, rx) = oneshot::channel();
        self.pending_inputs.insert(step_id, tx);

        let outcome = tokio::select! {
            received = rx => received,
            () = cancel.cancelled() => {
                self.pending_inputs.remove(&step_id);
                return cancelled_result(step_id, started, 0, Vec::new());
            }
        };
        self.pending_inputs.remove(&step_id);

        match outcome {
            Ok(value) => {
                if let Err(message) = validate_human_input(input_type, choices, &value) {
                    let error = StepError { code: ErrorCode::HumanInputError, message, recoverable: false };
                    return StepResult::failure(step_id, error, started.elapsed(), 0);
                }
                context.write_output(output_key.to_string(), value.clone());
                context.write_output(step_id.to_string(), value.clone());
                StepResult::success(step_id, value, started.elapsed(), 0)
            }
            Err(_) => {
                let error = StepError {
                    code: ErrorCode::HumanInputError,
                    message: "human input channel closed without a value".to_string(),
                    recoverable: false,
                };
                StepResult::failure(step_id, error, started.elapsed(), 0)
            }
        }
    }
}

/// Validates a `provide_input` value against the step's declared
/// `input_type`/`choices` before it reaches the workflow context (spec.md
/// §4.2 "Validate type/choice membership", §7 `HumanInputError`).
fn validate_human_input(input_type: &HumanInputType, choices: Option<&[String]>, value: &Value) -> Result<(), String> {
    match input_type {
        HumanInputType::Confirm => {
            if !value.is_boolean() {
                return Err(format!("confirm step requires a boolean value, got {value}"));
            }
        }
        HumanInputType::Choice => {
            let text = value.as_str().ok_or_else(|| format!("choice step requires a string value, got {value}"))?;
            let allowed = choices.unwrap_or_default();
            if !allowed.iter().any(|c| c == text) {
                return Err(format!("'{text}' is not one of the step's declared choices {allowed:?}"));
            }
        }
        HumanInputType::Text => {
            if !value.is_string() {
                return Err(format!("text step requires a string value, got {value}"));
            }
        }
    }
    Ok(())
}

fn cancelled_result(step_id: StepId, started: Instant, retry_count: u32, logs: Vec<LogEntry>) -> StepResult {
    let error = StepError {
        code: ErrorCode::Cancelled,
        message: "step was cancelled".to_string(),
        recoverable: false,
    };
    StepResult::failure(step_id, error, started.elapsed(), retry_count).with_logs(logs)
}

#[async_trait]
impl StepRunner for DefaultStepRunner {
    async fn execute_step(&self, step: &Step, context: &mut WorkflowContext) -> StepResult {
        let retry = step.retry_config.clone().unwrap_or_else(|| self.default_retry.clone());
        let result = match &step.variant {
            StepVariant::Tool { name, parameters } => {
                self.run_tool(step.id, name, parameters, retry, context).await
            }
            StepVariant::Oracle { prompt, system_prompt, output_key } => {
                self.run_oracle(step.id, prompt, system_prompt.as_deref(), output_key, retry, context).await
            }
            StepVariant::Conditional { expression, .. } => self.run_conditional(step.id, expression, context),
            StepVariant::Parallel { .. } => self.run_structural_marker(step.id, "parallel fan-out"),
            StepVariant::Loop { .. } => self.run_structural_marker(step.id, "loop"),
            StepVariant::Checkpoint => self.run_structural_marker(step.id, "checkpoint"),
            StepVariant::HumanInput { output_key, input_type, choices, .. } => {
                self.run_human_input(step.id, output_key, input_type, choices.as_deref(), context).await
            }
        };
        self.cancel_tokens.remove(&step.id);
        info!(step_id = %step.id, status = ?result.status, "step execution finished");
        self.filter_logs(result)
    }

    fn cancel_step(&self, step_id: StepId) {
        if let Some(token) = self.cancel_tokens.get(&step_id) {
            token.cancel();
        } else {
            warn!(step_id = %step_id, "cancel_step called for a step with no active cancellation token");
        }
    }

    fn provide_input(&self, step_id: StepId, value: Value) -> bool {
        match self.pending_inputs.remove(&step_id) {
            Some((_, tx)) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::{HumanInputType, RollbackAction, RollbackActionKind};
    use agentflow_testing::{MockToolRegistry, ScriptedOracle};
    use std::path::PathBuf;

    fn runner(tools: Arc<MockToolRegistry>, oracle: Arc<ScriptedOracle>) -> DefaultStepRunner {
        DefaultStepRunner::new(tools, oracle)
    }

    fn ctx() -> WorkflowContext {
        WorkflowContext::new(PathBuf::from("."))
    }

    #[tokio::test]
    async fn tool_step_retries_until_success_and_reports_retry_count() {
        let tools = Arc::new(MockToolRegistry::new());
        tools.push_response("search", agentflow_core::ToolInvocationResult::err("transient", true));
        tools.push_response("search", agentflow_core::ToolInvocationResult::ok(Value::from("found it")));
        let runner = runner(tools, Arc::new(ScriptedOracle::new()));

        let step = Step::new(StepVariant::Tool { name: "search".into(), parameters: Default::default() })
            .with_retry(RetryConfig { max_attempts: 3, delay_ms: 1, backoff_multiplier: 1.0, retryable_errors: None });
        let mut context = ctx();
        let result = runner.execute_step(&step, &mut context).await;

        assert_eq!(result.status, agentflow_core::StepStatus::Completed);
        assert_eq!(result.retry_count, 1);
        assert_eq!(context.step_outputs.get(&step.id.to_string()), Some(&Value::from("found it")));
    }

    #[tokio::test]
    async fn a_step_with_no_retry_config_uses_the_runners_configured_default() {
        let tools = Arc::new(MockToolRegistry::new());
        tools.push_response("search", agentflow_core::ToolInvocationResult::err("transient", true));
        tools.push_response("search", agentflow_core::ToolInvocationResult::ok(Value::from("found it")));
        let runner = runner(tools, Arc::new(ScriptedOracle::new())).with_default_retry(3, 1);

        let step = Step::new(StepVariant::Tool { name: "search".into(), parameters: Default::default() });
        let mut context = ctx();
        let result = runner.execute_step(&step, &mut context).await;

        assert_eq!(result.status, agentflow_core::StepStatus::Completed);
        assert_eq!(result.retry_count, 1);
    }

    #[tokio::test]
    async fn retryable_errors_negative_list_stops_retry_despite_recoverable_flag() {
        let tools = Arc::new(MockToolRegistry::new());
        tools.push_response("search", agentflow_core::ToolInvocationResult::err("transient", true));
        tools.push_response("search", agentflow_core::ToolInvocationResult::ok(Value::from("found it")));
        let runner = runner(tools.clone(), Arc::new(ScriptedOracle::new()));
        let step = Step::new(StepVariant::Tool { name: "search".into(), parameters: Default::default() }).with_retry(
            RetryConfig {
                max_attempts: 3,
                delay_ms: 1,
                backoff_multiplier: 1.0,
                retryable_errors: Some(vec![ErrorCode::ToolError]),
            },
        );
        let mut context = ctx();
        let result = runner.execute_step(&step, &mut context).await;

        assert_eq!(result.status, agentflow_core::StepStatus::Failed);
        assert_eq!(result.retry_count, 0);
        assert_eq!(tools.call_count("search"), 1);
    }

    #[tokio::test]
    async fn tool_step_gives_up_after_max_attempts() {
        let tools = Arc::new(MockToolRegistry::new());
        for _ in 0..5 {
            tools.push_response("search", agentflow_core::ToolInvocationResult::err("down", true));
        }
        let runner = runner(tools, Arc::new(ScriptedOracle::new()));
        let step = Step::new(StepVariant::Tool { name: "search".into(), parameters: Default::default() })
            .with_retry(RetryConfig { max_attempts: 2, delay_ms: 1, backoff_multiplier: 1.0, retryable_errors: None });
        let mut context = ctx();
        let result = runner.execute_step(&step, &mut context).await;
        assert_eq!(result.status, agentflow_core::StepStatus::Failed);
        assert_eq!(result.retry_count, 1);
    }

    #[tokio::test]
    async fn unrecoverable_tool_failure_does_not_retry() {
        let tools = Arc::new(MockToolRegistry::new());
        tools.push_response("danger", agentflow_core::ToolInvocationResult::err("fatal", false));
        let runner = runner(tools, Arc::new(ScriptedOracle::new()));
        let step = Step::new(StepVariant::Tool { name: "danger".into(), parameters: Default::default() })
            .with_retry(RetryConfig { max_attempts: 5, delay_ms: 1, backoff_multiplier: 1.0, retryable_errors: None });
        let mut context = ctx();
        let result = runner.execute_step(&step, &mut context).await;
        assert_eq!(result.retry_count, 0);
        assert_eq!(tools.call_count("danger"), 1);
    }

    #[tokio::test]
    async fn oracle_step_writes_both_named_and_step_id_keys() {
        let oracle = Arc::new(ScriptedOracle::new().with_reply("hello there"));
        let runner = runner(Arc::new(MockToolRegistry::new()), oracle);
        let step = Step::new(StepVariant::Oracle {
            prompt: "say hi".into(),
            system_prompt: None,
            output_key: "greeting".into(),
        });
        let mut context = ctx();
        let result = runner.execute_step(&step, &mut context).await;
        assert_eq!(result.status, agentflow_core::StepStatus::Completed);
        assert_eq!(context.step_outputs["greeting"], Value::from("hello there"));
        assert_eq!(context.step_outputs[&step.id.to_string()], Value::from("hello there"));
    }

    #[tokio::test]
    async fn conditional_step_evaluates_against_context() {
        let runner = runner(Arc::new(MockToolRegistry::new()), Arc::new(ScriptedOracle::new()));
        let mut context = ctx();
        context.step_outputs.insert("ready".into(), Value::Bool(true));
        let step = Step::new(StepVariant::Conditional {
            expression: "stepOutputs.ready".into(),
            then_steps: Vec::new(),
            else_steps: Vec::new(),
        });
        let result = runner.execute_step(&step, &mut context).await;
        assert_eq!(result.output, Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn human_input_step_suspends_until_provide_input_is_called() {
        let runner = Arc::new(runner(Arc::new(MockToolRegistry::new()), Arc::new(ScriptedOracle::new())));
        let step = Step::new(StepVariant::HumanInput {
            prompt: "confirm?".into(),
            input_type: HumanInputType::Confirm,
            choices: None,
            output_key: "confirmed".into(),
        });
        let step_id = step.id;

        let runner_clone = runner.clone();
        let handle = tokio::spawn(async move {
            let mut context = WorkflowContext::new(PathBuf::from("."));
            runner_clone.execute_step(&step, &mut context).await
        });

        tokio::task::yield_now().await;
        assert!(runner.provide_input(step_id, Value::Bool(true)));
        let result = handle.await.unwrap();
        assert_eq!(result.status, agentflow_core::StepStatus::Completed);
        assert_eq!(result.output, Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn confirm_step_rejects_a_non_boolean_value() {
        let runner = Arc::new(runner(Arc::new(MockToolRegistry::new()), Arc::new(ScriptedOracle::new())));
        let step = Step::new(StepVariant::HumanInput {
            prompt: "confirm?".into(),
            input_type: HumanInputType::Confirm,
            choices: None,
            output_key: "confirmed".into(),
        });
        let step_id = step.id;

        let runner_clone = runner.clone();
        let handle = tokio::spawn(async move {
            let mut context = WorkflowContext::new(PathBuf::from("."));
            runner_clone.execute_step(&step, &mut context).await
        });

        tokio::task::yield_now().await;
        assert!(runner.provide_input(step_id, Value::from("yes")));
        let result = handle.await.unwrap();
        assert_eq!(result.status, agentflow_core::StepStatus::Failed);
        assert_eq!(result.error.unwrap().code, ErrorCode::HumanInputError);
    }

    #[tokio::test]
    async fn choice_step_rejects_a_value_outside_the_declared_choices() {
        let runner = Arc::new(runner(Arc::new(MockToolRegistry::new()), Arc::new(ScriptedOracle::new())));
        let step = Step::new(StepVariant::HumanInput {
            prompt: "pick one".into(),
            input_type: HumanInputType::Choice,
            choices: Some(vec!["left".into(), "right".into()]),
            output_key: "picked".into(),
        });
        let step_id = step.id;

        let runner_clone = runner.clone();
        let handle = tokio::spawn(async move {
            let mut context = WorkflowContext::new(PathBuf::from("."));
            runner_clone.execute_step(&step, &mut context).await
        });

        tokio::task::yield_now().await;
        assert!(runner.provide_input(step_id, Value::from("up")));
        let result = handle.await.unwrap();
        assert_eq!(result.status, agentflow_core::StepStatus::Failed);
        assert_eq!(result.error.unwrap().code, ErrorCode::HumanInputError);
    }

    #[tokio::test]
    async fn choice_step_accepts_a_value_from_the_declared_choices() {
        let runner = Arc::new(runner(Arc::new(MockToolRegistry::new()), Arc::new(ScriptedOracle::new())));
        let step = Step::new(StepVariant::HumanInput {
            prompt: "pick one".into(),
            input_type: HumanInputType::Choice,
            choices: Some(vec!["left".into(), "right".into()]),
            output_key: "picked".into(),
        });
        let step_id = step.id;

        let runner_clone = runner.clone();
        let handle = tokio::spawn(async move {
            let mut context = WorkflowContext::new(PathBuf::from("."));
            runner_clone.execute_step(&step, &mut context).await
        });

        tokio::task::yield_now().await;
        assert!(runner.provide_input(step_id, Value::from("left")));
        let result = handle.await.unwrap();
        assert_eq!(result.status, agentflow_core::StepStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_step_interrupts_a_suspended_human_input() {
        let runner = Arc::new(runner(Arc::new(MockToolRegistry::new()), Arc::new(ScriptedOracle::new())));
        let step = Step::new(StepVariant::HumanInput {
            prompt: "confirm?".into(),
            input_type: HumanInputType::Confirm,
            choices: None,
            output_key: "confirmed".into(),
        });
        let step_id = step.id;

        let runner_clone = runner.clone();
        let handle = tokio::spawn(async move {
            let mut context = WorkflowContext::new(PathBuf::from("."));
            runner_clone.execute_step(&step, &mut context).await
        });

        tokio::task::yield_now().await;
        runner.cancel_step(step_id);
        let result = handle.await.unwrap();
        assert_eq!(result.status, agentflow_core::StepStatus::Failed);
        assert_eq!(result.error.unwrap().code, ErrorCode::Cancelled);
    }

    #[test]
    fn rollback_action_variants_construct() {
        let _ = RollbackAction { action: RollbackActionKind::Custom { handler: "undoFileCreation".into() } };
    }

    #[tokio::test]
    async fn non_verbose_runner_strips_debug_logs_from_structural_markers() {
        let runner = runner(Arc::new(MockToolRegistry::new()), Arc::new(ScriptedOracle::new()));
        let step = Step::new(StepVariant::Checkpoint);
        let mut context = ctx();
        let result = runner.execute_step(&step, &mut context).await;
        assert!(result.logs.iter().all(|l| l.level != agentflow_core::LogLevel::Debug));
    }

    #[tokio::test]
    async fn verbose_runner_keeps_debug_logs_from_structural_markers() {
        let runner = runner(Arc::new(MockToolRegistry::new()), Arc::new(ScriptedOracle::new()))
            .with_verbose_logging(true);
        let step = Step::new(StepVariant::Checkpoint);
        let mut context = ctx();
        let result = runner.execute_step(&step, &mut context).await;
        assert!(result.logs.iter().any(|l| l.level == agentflow_core::LogLevel::Debug));
    }
}
