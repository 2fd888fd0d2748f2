//! ABOUTME: Converts a string-keyed RawPlan into real Step values with deterministic StepIds
//! ABOUTME: Provisional string ids resolve to the same StepId::from_name both as a step's own id and as a dependency reference

use crate::schema::{RawPlan, RawStep};
use crate::PlannerError;
use agentflow_core::{ErrorCode, HumanInputType, RetryConfig, Step, StepId, StepVariant};
use std::collections::HashMap;

fn parse_error_code(raw: &str) -> Result<ErrorCode, PlannerError> {
    match raw {
        "ToolError" => Ok(ErrorCode::ToolError),
        "OracleError" => Ok(ErrorCode::OracleError),
        "ExpressionError" => Ok(ErrorCode::ExpressionError),
        "HumanInputError" => Ok(ErrorCode::HumanInputError),
        "Cancelled" => Ok(ErrorCode::Cancelled),
        "Timeout" => Ok(ErrorCode::Timeout),
        "Deadlock" => Ok(ErrorCode::Deadlock),
        "PlanValidation" => Ok(ErrorCode::PlanValidation),
        "PlannerBlocked" => Ok(ErrorCode::PlannerBlocked),
        "SnapshotError" => Ok(ErrorCode::SnapshotError),
        "RestoreError" => Ok(ErrorCode::RestoreError),
        "Internal" => Ok(ErrorCode::Internal),
        other => Err(PlannerError::Unparseable(format!("unknown retryableErrors code '{other}'"))),
    }
}

fn resolve(provisional_id: &str) -> StepId {
    StepId::from_name(provisional_id)
}

fn resolve_all(ids: &[String]) -> Vec<StepId> {
    ids.iter().map(|id| resolve(id)).collect()
}

fn parse_human_input_type(raw: Option<&str>) -> Result<HumanInputType, PlannerError> {
    match raw {
        Some("text") | None => Ok(HumanInputType::Text),
        Some("choice") => Ok(HumanInputType::Choice),
        Some("confirm") => Ok(HumanInputType::Confirm),
        Some(other) => Err(PlannerError::Unparseable(format!("unknown humanInput input_type '{other}'"))),
    }
}

fn to_variant(raw: &RawStep) -> Result<StepVariant, PlannerError> {
    match raw.kind.as_str() {
        "tool" => Ok(StepVariant::Tool {
            name: raw.name.clone().ok_or_else(|| PlannerError::Unparseable(format!("tool step '{}' missing name", raw.id)))?,
            parameters: raw.parameters.clone().unwrap_or_default(),
        }),
        "oracle" => Ok(StepVariant::Oracle {
            prompt: raw.prompt.clone().ok_or_else(|| PlannerError::Unparseable(format!("oracle step '{}' missing prompt", raw.id)))?,
            system_prompt: raw.system_prompt.clone(),
            output_key: raw.output_key.clone().unwrap_or_else(|| raw.id.clone()),
        }),
        "conditional" => Ok(StepVariant::Conditional {
            expression: raw.expression.clone().ok_or_else(|| PlannerError::Unparseable(format!("conditional step '{}' missing expression", raw.id)))?,
            then_steps: resolve_all(raw.then_steps.as_deref().unwrap_or_default()),
            else_steps: resolve_all(raw.else_steps.as_deref().unwrap_or_default()),
        }),
        "parallel" => Ok(StepVariant::Parallel {
            step_ids: resolve_all(raw.step_ids.as_deref().unwrap_or_default()),
            wait_for_all: raw.wait_for_all.unwrap_or(true),
        }),
        "loop" => Ok(StepVariant::Loop {
            items_key: raw.items_key.clone().ok_or_else(|| PlannerError::Unparseable(format!("loop step '{}' missing items_key", raw.id)))?,
            item_key: raw.item_key.clone().unwrap_or_else(|| "item".to_string()),
            body_steps: resolve_all(raw.body_steps.as_deref().unwrap_or_default()),
        }),
        "humanInput" => Ok(StepVariant::HumanInput {
            prompt: raw.prompt.clone().ok_or_else(|| PlannerError::Unparseable(format!("humanInput step '{}' missing prompt", raw.id)))?,
            input_type: parse_human_input_type(raw.input_type.as_deref())?,
            choices: raw.choices.clone(),
            output_key: raw.output_key.clone().unwrap_or_else(|| raw.id.clone()),
        }),
        "checkpoint" => Ok(StepVariant::Checkpoint),
        other => Err(PlannerError::Unparseable(format!("unknown step type '{other}' for step '{}'", raw.id))),
    }
}

/// Converts every raw step into a real [`Step`]. Fails the whole plan on the
/// first malformed step rather than silently dropping it -- a partially
/// materialized workflow is worse than an explicit planning failure.
/// Tolerance for prose wrapped around the oracle's JSON reply lives one
/// layer up, in the extraction step; a step that parses as JSON but has a
/// malformed shape is never tolerated.
pub fn materialize_steps(plan: &RawPlan) -> Result<Vec<Step>, PlannerError> {
    let mut steps = Vec::with_capacity(plan.steps.len());
    for raw in &plan.steps {
        let variant = to_variant(raw)?;
        let retry = match &raw.retry {
            Some(r) => {
                let retryable_errors = r
                    .retryable_errors
                    .as_ref()
                    .map(|codes| codes.iter().map(|c| parse_error_code(c)).collect::<Result<Vec<_>, _>>())
                    .transpose()?;
                Some(RetryConfig {
                    max_attempts: r.max_attempts,
                    delay_ms: r.delay_ms,
                    backoff_multiplier: r.backoff_multiplier,
                    retryable_errors,
                })
            }
            None => None,
        };
        let mut step = Step::new(variant).with_id(resolve(&raw.id)).with_dependencies(resolve_all(&raw.dependencies));
        if let Some(retry) = retry {
            step = step.with_retry(retry);
        }
        steps.push(step);
    }
    Ok(steps)
}

/// Tool names referenced by `tool`-typed steps that the registry doesn't
/// recognize -- surfaced as a blocking requirement rather than failing
/// materialization outright.
#[must_use]
pub fn missing_tool_names(plan: &RawPlan, known_tools: &HashMap<String, ()>) -> Vec<String> {
    let mut missing = Vec::new();
    for raw in &plan.steps {
        if raw.kind == "tool" {
            if let Some(name) = &raw.name {
                if !known_tools.contains_key(name) && !missing.contains(name) {
                    missing.push(name.clone());
                }
            }
        }
    }
    missing
}
