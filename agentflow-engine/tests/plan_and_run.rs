//! ABOUTME: End-to-end tests driving the engine facade through plan -> execute without touching lower crates directly
//! ABOUTME: A linear plan, a plan blocked on a missing tool, and a plan that suspends on human input

use agentflow_config::EngineConfig;
use agentflow_core::{ToolInvocationResult, WorkflowStatus};
use agentflow_engine::EngineBuilder;
use agentflow_testing::{MockToolRegistry, ScriptedOracle};
use serde_json::Value;
use std::sync::Arc;

fn plan_reply(steps_json: &str) -> String {
    format!(r#"{{"steps": {steps_json}}}"#)
}

#[tokio::test]
async fn plan_and_run_executes_a_linear_three_step_plan() {
    let registry = MockToolRegistry::new();
    registry.register("step_tool");
    registry.push_response("step_tool", ToolInvocationResult::ok(Value::from(1)));
    registry.push_response("step_tool", ToolInvocationResult::ok(Value::from(2)));
    registry.push_response("step_tool", ToolInvocationResult::ok(Value::from(3)));

    let oracle = ScriptedOracle::new()
        .with_reply(plan_reply(
            r#"[
                {"id": "a", "type": "tool", "name": "step_tool", "parameters": {}},
                {"id": "b", "type": "tool", "name": "step_tool", "parameters": {}, "dependencies": ["a"]},
                {"id": "c", "type": "tool", "name": "step_tool", "parameters": {}, "dependencies": ["b"]}
            ]"#,
        ))
        .with_reply(r#"{"name": "Linear", "description": "three tool calls in sequence"}"#);

    let dir = tempfile::tempdir().unwrap();
    let engine = EngineBuilder::new()
        .tool_registry(Arc::new(registry))
        .oracle(Arc::new(oracle))
        .persistence_root(dir.path().to_path_buf())
        .build()
        .unwrap();

    let workflow = engine
        .plan_and_run("do three things in order", dir.path().to_path_buf())
        .await
        .unwrap();

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.steps.len(), 3);
    assert!(workflow.steps.iter().all(|s| s.status == agentflow_core::StepStatus::Completed));
}

#[tokio::test]
async fn plan_blocked_on_missing_tool_never_produces_a_workflow() {
    let oracle = ScriptedOracle::new()
        .with_reply(plan_reply(r#"[{"id": "a", "type": "tool", "name": "ghost", "parameters": {}}]"#))
        .with_reply(r#"{"name": "x", "description": "y"}"#);

    let dir = tempfile::tempdir().unwrap();
    let engine = EngineBuilder::new()
        .tool_registry(Arc::new(MockToolRegistry::new()))
        .oracle(Arc::new(oracle))
        .persistence_root(dir.path().to_path_buf())
        .build()
        .unwrap();

    let err = engine.plan("do a thing with a tool that doesn't exist", dir.path().to_path_buf()).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn human_input_step_suspends_until_provide_input_then_feeds_the_next_step() {
    let registry = MockToolRegistry::new();
    registry.register("consume");

    let oracle = ScriptedOracle::new()
        .with_reply(plan_reply(
            r#"[
                {"id": "h", "type": "humanInput", "prompt": "age?", "input_type": "text", "output_key": "age"},
                {"id": "p", "type": "tool", "name": "consume", "parameters": {"age": "{{age}}"}, "dependencies": ["h"]}
            ]"#,
        ))
        .with_reply(r#"{"name": "Ask then use", "description": "ask for age then consume it"}"#);

    let dir = tempfile::tempdir().unwrap();
    let engine = EngineBuilder::new()
        .tool_registry(Arc::new(registry))
        .oracle(Arc::new(oracle))
        .persistence_root(dir.path().to_path_buf())
        .with_events()
        .build()
        .unwrap();

    let mut events = engine.subscribe().unwrap();
    let workflow = engine.plan("ask my age then use it", dir.path().to_path_buf()).await.unwrap();
    let human_step_id = workflow
        .steps
        .iter()
        .find(|s| matches!(s.variant, agentflow_core::StepVariant::HumanInput { .. }))
        .unwrap()
        .id;

    let engine_clone = engine.clone();
    let mut workflow = workflow;
    let handle = tokio::spawn(async move {
        engine_clone.run(&mut workflow).await.unwrap();
        workflow
    });

    let mut saw_human_input_required = false;
    for _ in 0..10 {
        if let Ok(event) = tokio::time::timeout(std::time::Duration::from_millis(200), events.recv()).await {
            if matches!(event.unwrap(), agentflow_events::WorkflowEvent::HumanInputRequired { .. }) {
                saw_human_input_required = true;
                break;
            }
        }
    }
    assert!(saw_human_input_required, "expected a human-input:required event before progress resumes");

    assert!(engine.provide_input(human_step_id, Value::from(42)));
    let finished = handle.await.unwrap();
    assert_eq!(finished.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn destructive_tool_plan_gates_on_checkpoint_then_confirmation_before_running() {
    let registry = MockToolRegistry::new();
    registry.register("delete_file");
    registry.push_response("delete_file", ToolInvocationResult::ok(Value::Null));

    let oracle = ScriptedOracle::new()
        .with_reply(plan_reply(
            r#"[{"id": "d", "type": "tool", "name": "delete_file", "parameters": {"path": "a.txt"}}]"#,
        ))
        .with_reply(r#"{"name": "Delete", "description": "delete a.txt"}"#);

    let dir = tempfile::tempdir().unwrap();
    let engine = EngineBuilder::new()
        .tool_registry(Arc::new(registry))
        .oracle(Arc::new(oracle))
        .persistence_root(dir.path().to_path_buf())
        .build()
        .unwrap();

    let workflow = engine.plan("delete a.txt", dir.path().to_path_buf()).await.unwrap();
    assert_eq!(workflow.steps.len(), 3, "checkpoint + confirm + the destructive tool step");
    assert!(matches!(workflow.steps[0].variant, agentflow_core::StepVariant::Checkpoint));
    assert!(matches!(workflow.steps[1].variant, agentflow_core::StepVariant::HumanInput { .. }));

    let confirm_id = workflow.steps[1].id;
    let mut workflow = workflow;
    let engine_clone = engine.clone();
    let handle = tokio::spawn(async move {
        engine_clone.run(&mut workflow).await.unwrap();
        workflow
    });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(engine.provide_input(confirm_id, Value::Bool(true)));
    let finished = handle.await.unwrap();
    assert_eq!(finished.status, WorkflowStatus::Completed);
    assert!(finished.steps.iter().all(|s| s.status == agentflow_core::StepStatus::Completed));
}

#[tokio::test]
async fn dry_run_by_default_plans_without_executing_any_step() {
    let registry = MockToolRegistry::new();
    registry.register("step_tool");
    registry.push_response("step_tool", ToolInvocationResult::ok(Value::from(1)));

    let oracle = ScriptedOracle::new()
        .with_reply(plan_reply(r#"[{"id": "a", "type": "tool", "name": "step_tool", "parameters": {}}]"#))
        .with_reply(r#"{"name": "One step", "description": "a single tool call"}"#);

    let dir = tempfile::tempdir().unwrap();
    let engine = EngineBuilder::new()
        .tool_registry(Arc::new(registry))
        .oracle(Arc::new(oracle))
        .persistence_root(dir.path().to_path_buf())
        .config(EngineConfig { dry_run_by_default: true, ..EngineConfig::default() })
        .build()
        .unwrap();

    let workflow = engine.plan_and_run("do one thing", dir.path().to_path_buf()).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Pending);
    assert!(workflow.steps.iter().all(|s| s.status == agentflow_core::StepStatus::Pending));
}
