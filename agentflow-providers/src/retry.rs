//! ABOUTME: Retrying oracle wrapper: capped exponential backoff around any Oracle implementation
//! ABOUTME: SPEC_FULL.md section C -- oracle calls are themselves fallible external calls that deserve resilience

use agentflow_core::{Oracle, OracleError, OracleOptions};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

pub struct RetryingOracle<O: Oracle> {
    inner: O,
    max_attempts: u32,
    base_delay: Duration,
}

impl<O: Oracle> RetryingOracle<O> {
    #[must_use]
    pub fn new(inner: O, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

#[async_trait]
impl<O: Oracle> Oracle for RetryingOracle<O> {
    async fn chat(
        &self,
        user_prompt: &str,
        system_prompt: Option<&str>,
        options: OracleOptions,
    ) -> Result<String, OracleError> {
        let mut attempt = 1;
        loop {
            match self.inner.chat(user_prompt, system_prompt, options.clone()).await {
                Ok(text) => return Ok(text),
                Err(err) if attempt < self.max_attempts => {
                    let delay = self.base_delay * 2_u32.pow(attempt - 1);
                    warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "oracle call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyOracle {
        calls: Arc<AtomicU32>,
        fail_until: u32,
    }

    #[async_trait]
    impl Oracle for FlakyOracle {
        async fn chat(
            &self,
            _user_prompt: &str,
            _system_prompt: Option<&str>,
            _options: OracleOptions,
        ) -> Result<String, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_until {
                Err(OracleError::Unavailable("flaky".into()))
            } else {
                Ok("ok".into())
            }
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let oracle = RetryingOracle::new(
            FlakyOracle { calls: calls.clone(), fail_until: 2 },
            3,
            Duration::from_millis(1),
        );
        let result = oracle.chat("hi", None, OracleOptions::default()).await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let oracle = RetryingOracle::new(
            FlakyOracle { calls: calls.clone(), fail_until: 100 },
            2,
            Duration::from_millis(1),
        );
        let result = oracle.chat("hi", None, OracleOptions::default()).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
