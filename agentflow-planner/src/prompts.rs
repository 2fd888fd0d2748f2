//! ABOUTME: System/user prompt templates for the two oracle calls the planner makes
//! ABOUTME: Planning call proposes a step graph; synthesis call names and describes the resulting workflow

use agentflow_core::ToolDescriptor;

pub const PLANNING_SYSTEM_PROMPT: &str = "You are a workflow planner. Respond with a single JSON object \
shaped as {\"steps\": [...]}. Each step has a unique string \"id\", a \"type\" (one of tool, oracle, \
conditional, parallel, loop, humanInput, checkpoint), a \"dependencies\" array of step ids, and the \
fields appropriate to its type. Do not include any text outside the JSON object.";

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "Given a workflow's step plan, respond with a single JSON object \
shaped as {\"name\": \"...\", \"description\": \"...\"} summarizing what the workflow accomplishes. Do not \
include any text outside the JSON object.";

#[must_use]
pub fn planning_prompt(original_request: &str, tools: &[ToolDescriptor]) -> String {
    let tool_lines: Vec<String> = tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect();
    format!(
        "Request: {original_request}\n\nAvailable tools:\n{}\n\nProduce the step plan.",
        if tool_lines.is_empty() { "(none)".to_string() } else { tool_lines.join("\n") }
    )
}

#[must_use]
pub fn synthesis_prompt(original_request: &str, raw_plan_json: &str) -> String {
    format!("Original request: {original_request}\n\nPlan:\n{raw_plan_json}\n\nSummarize this workflow.")
}
