//! ABOUTME: Deterministic Oracle test double: a fixed queue of canned chat responses
//! ABOUTME: Stands in for a real oracle provider in planner/runner tests

use agentflow_core::{Oracle, OracleError, OracleOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
    Hang(Duration),
}

/// Replays a fixed sequence of responses regardless of prompt content.
/// Planner tests use this to control exactly what "the model said" for the
/// planning call and the step-synthesis call; runner retry tests use
/// `fail_then_reply` to exercise the backoff path deterministically.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Scripted>>,
    prompts_seen: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.script.lock().push_back(Scripted::Reply(reply.into()));
        self
    }

    #[must_use]
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.script.lock().push_back(Scripted::Fail(message.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(self, after: Duration) -> Self {
        self.script.lock().push_back(Scripted::Hang(after));
        self
    }

    #[must_use]
    pub fn prompts_seen(&self) -> Vec<String> {
        self.prompts_seen.lock().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn chat(
        &self,
        user_prompt: &str,
        _system_prompt: Option<&str>,
        _options: OracleOptions,
    ) -> Result<String, OracleError> {
        self.prompts_seen.lock().push(user_prompt.to_string());
        match self.script.lock().pop_front() {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Fail(message)) => Err(OracleError::Unavailable(message)),
            Some(Scripted::Hang(after)) => Err(OracleError::Timeout(after)),
            None => Err(OracleError::Unavailable("scripted oracle has no more responses queued".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_responses_in_insertion_order() {
        let oracle = ScriptedOracle::new().with_reply("first").with_reply("second");
        assert_eq!(oracle.chat("p", None, OracleOptions::default()).await.unwrap(), "first");
        assert_eq!(oracle.chat("p", None, OracleOptions::default()).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn failure_entries_surface_as_unavailable() {
        let oracle = ScriptedOracle::new().with_failure("rate limited");
        let err = oracle.chat("p", None, OracleOptions::default()).await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(msg) if msg == "rate limited"));
    }

    #[tokio::test]
    async fn exhausted_script_is_an_error_not_a_panic() {
        let oracle = ScriptedOracle::new();
        assert!(oracle.chat("p", None, OracleOptions::default()).await.is_err());
    }
}
