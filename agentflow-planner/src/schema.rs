//! ABOUTME: Wire schema for an oracle-produced plan: string-keyed steps before id resolution
//! ABOUTME: Deserialized straight from the planning call's extracted JSON block

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct RawRetry {
    pub max_attempts: u32,
    pub delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff_multiplier: f64,
    #[serde(default)]
    pub retryable_errors: Option<Vec<String>>,
}

fn default_backoff() -> f64 {
    2.0
}

#[derive(Debug, Deserialize)]
pub struct RawStep {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub output_key: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub then_steps: Option<Vec<String>>,
    #[serde(default)]
    pub else_steps: Option<Vec<String>>,
    #[serde(default)]
    pub step_ids: Option<Vec<String>>,
    #[serde(default)]
    pub wait_for_all: Option<bool>,
    #[serde(default)]
    pub items_key: Option<String>,
    #[serde(default)]
    pub item_key: Option<String>,
    #[serde(default)]
    pub body_steps: Option<Vec<String>>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub retry: Option<RawRetry>,
}

#[derive(Debug, Deserialize)]
pub struct RawPlan {
    pub steps: Vec<RawStep>,
}
