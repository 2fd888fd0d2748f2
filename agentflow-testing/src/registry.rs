//! ABOUTME: In-memory ToolRegistry test double: scripted per-tool responses plus an invocation log
//! ABOUTME: Used by the runner/executor/planner test suites in place of a real tool library

use agentflow_core::{ParameterDescriptor, ToolDescriptor, ToolInvocationContext, ToolInvocationResult, ToolRegistry};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// One call recorded by [`MockToolRegistry`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub tool: String,
    pub parameters: HashMap<String, Value>,
}

struct Entry {
    descriptor: ToolDescriptor,
    responses: VecDeque<ToolInvocationResult>,
}

/// A fake tool library: each registered tool has a name, a minimal
/// descriptor, and a queue of canned responses consumed in order. Once a
/// tool's queue is empty, further calls return `ToolInvocationResult::ok`
/// with a `null` payload -- the "nothing left to script" convention shared
/// by every scripted fixture in this crate.
#[derive(Default)]
pub struct MockToolRegistry {
    tools: Mutex<HashMap<String, Entry>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool with no scripted responses (always succeeds with
    /// `null`), convenient for tools whose output doesn't matter to the test.
    pub fn register(&self, name: impl Into<String>) -> &Self {
        let name = name.into();
        self.tools.lock().insert(
            name.clone(),
            Entry {
                descriptor: ToolDescriptor {
                    name: name.clone(),
                    description: String::new(),
                    parameters: Vec::new(),
                },
                responses: VecDeque::new(),
            },
        );
        self
    }

    /// Registers a tool with an explicit parameter list, for planner tests
    /// that check required-parameter detection.
    pub fn register_with_params(&self, name: impl Into<String>, parameters: Vec<ParameterDescriptor>) -> &Self {
        let name = name.into();
        self.tools.lock().insert(
            name.clone(),
            Entry {
                descriptor: ToolDescriptor {
                    name: name.clone(),
                    description: String::new(),
                    parameters,
                },
                responses: VecDeque::new(),
            },
        );
        self
    }

    /// Queues a response to be returned on the tool's next `execute` call.
    /// Call this registers the tool first if it doesn't already exist.
    pub fn push_response(&self, name: impl Into<String>, result: ToolInvocationResult) -> &Self {
        let name = name.into();
        let mut tools = self.tools.lock();
        let entry = tools.entry(name.clone()).or_insert_with(|| Entry {
            descriptor: ToolDescriptor {
                name: name.clone(),
                description: String::new(),
                parameters: Vec::new(),
            },
            responses: VecDeque::new(),
        });
        entry.responses.push_back(result);
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self, tool: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.tool == tool).count()
    }
}

#[async_trait]
impl ToolRegistry for MockToolRegistry {
    fn describe_all(&self) -> Vec<ToolDescriptor> {
        self.tools.lock().values().map(|e| e.descriptor.clone()).collect()
    }

    fn describe(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.lock().get(name).map(|e| e.descriptor.clone())
    }

    async fn execute(
        &self,
        name: &str,
        parameters: HashMap<String, Value>,
        _ctx: ToolInvocationContext,
    ) -> ToolInvocationResult {
        self.calls.lock().push(RecordedCall {
            tool: name.to_string(),
            parameters: parameters.clone(),
        });

        let mut tools = self.tools.lock();
        let Some(entry) = tools.get_mut(name) else {
            return ToolInvocationResult::err(format!("unknown tool: {name}"), false);
        };
        entry
            .responses
            .pop_front()
            .unwrap_or_else(|| ToolInvocationResult::ok(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ToolInvocationContext {
        ToolInvocationContext {
            working_directory: PathBuf::from("."),
            cancel_signal: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn scripted_responses_are_consumed_in_order() {
        let registry = MockToolRegistry::new();
        registry.push_response("search", ToolInvocationResult::ok(Value::from("first")));
        registry.push_response("search", ToolInvocationResult::ok(Value::from("second")));

        let first = registry.execute("search", HashMap::new(), ctx()).await;
        let second = registry.execute("search", HashMap::new(), ctx()).await;
        assert_eq!(first.data, Some(Value::from("first")));
        assert_eq!(second.data, Some(Value::from("second")));
        assert_eq!(registry.call_count("search"), 2);
    }

    #[tokio::test]
    async fn unknown_tool_returns_unrecoverable_error() {
        let registry = MockToolRegistry::new();
        let result = registry.execute("missing", HashMap::new(), ctx()).await;
        assert!(!result.success);
        assert!(!result.is_recoverable());
    }

    #[tokio::test]
    async fn exhausted_queue_falls_back_to_null_success() {
        let registry = MockToolRegistry::new();
        registry.register("noop");
        let result = registry.execute("noop", HashMap::new(), ctx()).await;
        assert!(result.success);
        assert_eq!(result.data, Some(Value::Null));
    }
}
