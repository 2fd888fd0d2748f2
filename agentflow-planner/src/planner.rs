//! ABOUTME: TaskPlanner: the two-oracle-call plan synthesis algorithm, validation, and readiness gating
//! ABOUTME: Constructed with its collaborators injected, never looking them up itself

use crate::json_extract::extract_json_block;
use crate::materialize::{materialize_steps, missing_tool_names};
use crate::prompts::{planning_prompt, synthesis_prompt, PLANNING_SYSTEM_PROMPT, SYNTHESIS_SYSTEM_PROMPT};
use crate::schema::RawPlan;
use crate::PlannerError;
use agentflow_core::{looks_destructive, HumanInputType, Oracle, OracleOptions, Step, StepVariant, ToolRegistry, Workflow, WorkflowContext};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TaskPlanner {
    oracle: Arc<dyn Oracle>,
    tool_registry: Arc<dyn ToolRegistry>,
    max_checkpoints: usize,
    require_confirmation_for_destructive: bool,
    max_steps: usize,
}

impl TaskPlanner {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>, tool_registry: Arc<dyn ToolRegistry>, max_checkpoints: usize) -> Self {
        Self {
            oracle,
            tool_registry,
            max_checkpoints,
            require_confirmation_for_destructive: true,
            max_steps: usize::MAX,
        }
    }

    /// Matches spec.md §6's `maxSteps`: a plan whose synthesized step count
    /// (before checkpoint/confirmation injection) exceeds this is rejected
    /// rather than silently truncated.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Overrides the `requireConfirmationForDestructive` config flag (spec.md
    /// §6); when `false`, destructive tool steps still get a checkpoint
    /// injected ahead of them but no `humanInput` confirmation gate.
    #[must_use]
    pub fn with_require_confirmation_for_destructive(mut self, enabled: bool) -> Self {
        self.require_confirmation_for_destructive = enabled;
        self
    }

    /// Runs the planning call, the synthesis call, materialization,
    /// checkpoint injection, structural validation, and readiness gating, in
    /// that order.
    pub async fn plan(&self, original_request: &str, working_directory: PathBuf) -> Result<Workflow, PlannerError> {
        let tools = self.tool_registry.describe_all();
        let planning_response = self
            .oracle
            .chat(&planning_prompt(original_request, &tools), Some(PLANNING_SYSTEM_PROMPT), OracleOptions::default())
            .await?;

        let Some(raw_plan) = extract_json_block(&planning_response).and_then(|block| serde_json::from_str::<RawPlan>(&block).ok()) else {
            warn!("planning call produced no parseable JSON plan, falling back to a single direct-response step");
            return Ok(self.fallback_plan(original_request, working_directory));
        };

        let known_tools: HashMap<String, ()> = tools.iter().map(|t| (t.name.clone(), ())).collect();
        let missing = missing_tool_names(&raw_plan, &known_tools);

        let plan_json = serde_json::to_string(&raw_plan).unwrap_or_default();
        let synthesis_response = self
            .oracle
            .chat(&synthesis_prompt(original_request, &plan_json), Some(SYNTHESIS_SYSTEM_PROMPT), OracleOptions::default())
            .await?;
        let (name, description) = extract_name_and_description(&synthesis_response, original_request);

        let mut steps = materialize_steps(&raw_plan)?;
        if steps.len() > self.max_steps {
            return Err(PlannerError::TooManySteps { actual: steps.len(), max: self.max_steps });
        }
        inject_checkpoints(&mut steps, self.max_checkpoints, self.require_confirmation_for_destructive);

        let mut workflow = Workflow::new(name, description, original_request.to_string(), WorkflowContext::new(working_directory));
        workflow.steps = steps;
        workflow.validate_step_references()?;

        if !missing.is_empty() {
            info!(?missing, "plan blocked on missing tool requirements");
            return Err(PlannerError::Blocked { missing_tools: missing });
        }

        Ok(workflow)
    }

    fn fallback_plan(&self, original_request: &str, working_directory: PathBuf) -> Workflow {
        let step = Step::new(StepVariant::Oracle {
            prompt: original_request.to_string(),
            system_prompt: None,
            output_key: "response".to_string(),
        });
        let mut workflow = Workflow::new(
            "Direct response".to_string(),
            "Fallback plan: respond directly without a multi-step plan".to_string(),
            original_request.to_string(),
            WorkflowContext::new(working_directory),
        );
        workflow.steps = vec![step];
        workflow
    }
}

/// Injects a `Checkpoint` step immediately before every tool step whose name
/// looks destructive, bounded by `max_checkpoints`. Checkpoints beyond the
/// bound are skipped, oldest-need-first, with a warning. When
/// `require_confirmation` is set (spec.md §6's `requireConfirmationForDestructive`),
/// a `humanInput` confirm step is chained in between the checkpoint and the
/// destructive step itself, so the checkpoint is always taken but the
/// destructive operation waits on human approval.
fn inject_checkpoints(steps: &mut Vec<Step>, max_checkpoints: usize, require_confirmation: bool) {
    let mut injected = 0usize;
    let mut result = Vec::with_capacity(steps.len());
    for step in steps.drain(..) {
        let tool_name = match &step.variant {
            StepVariant::Tool { name, .. } if looks_destructive(name) => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = tool_name {
            if injected < max_checkpoints {
                let checkpoint = Step::new(StepVariant::Checkpoint).with_dependencies(step.dependencies.iter().copied());
                let checkpoint_id = checkpoint.id;
                result.push(checkpoint);
                injected += 1;

                if require_confirmation {
                    let confirm = Step::new(StepVariant::HumanInput {
                        prompt: format!("About to run destructive tool '{name}'. Proceed?"),
                        input_type: HumanInputType::Confirm,
                        choices: None,
                        output_key: format!("confirm_{}", step.id),
                    })
                    .with_dependency(checkpoint_id);
                    let confirm_id = confirm.id;
                    result.push(confirm);
                    result.push(step.with_dependency(confirm_id));
                } else {
                    result.push(step.with_dependency(checkpoint_id));
                }
                continue;
            }
            warn!(step_id = %step.id, "skipping checkpoint injection: maxCheckpoints bound reached");
        }
        result.push(step);
    }
    *steps = result;
}

fn extract_name_and_description(response: &str, original_request: &str) -> (String, String) {
    if let Some(block) = extract_json_block(response) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&block) {
            let name = value.get("name").and_then(|v| v.as_str()).map(str::to_string);
            let description = value.get("description").and_then(|v| v.as_str()).map(str::to_string);
            if let (Some(name), Some(description)) = (name, description) {
                return (name, description);
            }
        }
    }
    ("Untitled workflow".to_string(), original_request.to_string())
}
