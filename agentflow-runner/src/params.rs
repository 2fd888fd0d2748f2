//! ABOUTME: `{{key}}` placeholder substitution over tool-call parameter trees
//! ABOUTME: Recurses into arrays/objects so a nested string value is substituted too, not just top-level ones

use agentflow_core::context::substitute_placeholders;
use agentflow_core::WorkflowContext;
use serde_json::Value;
use std::collections::HashMap;

#[must_use]
pub fn substitute_parameters(parameters: &HashMap<String, Value>, context: &WorkflowContext) -> HashMap<String, Value> {
    parameters
        .iter()
        .map(|(k, v)| (k.clone(), substitute_value(v, context)))
        .collect()
}

fn substitute_value(value: &Value, context: &WorkflowContext) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_placeholders(s, context)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, context)).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), substitute_value(v, context))).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn substitutes_nested_string_values() {
        let mut ctx = WorkflowContext::new(PathBuf::from("."));
        ctx.step_outputs.insert("name".into(), Value::from("river"));
        let mut params = HashMap::new();
        params.insert("greeting".to_string(), serde_json::json!({"text": "hi {{name}}"}));
        let out = substitute_parameters(&params, &ctx);
        assert_eq!(out["greeting"]["text"], Value::from("hi river"));
    }
}
