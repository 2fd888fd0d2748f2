//! ABOUTME: Oracle provider configuration: endpoint, model, timeouts, retry budget
//! ABOUTME: Narrowed to the chat-only oracle surface; provider-specific tuning lives in `custom_config`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleProviderConfig {
    pub name: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub custom_config: HashMap<String, serde_json::Value>,
}

impl OracleProviderConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
            max_retries: 3,
            custom_config: HashMap::new(),
        }
    }

    /// Loads overrides from `AGENTFLOW_ORACLE_<NAME>_*` environment
    /// variables, one prefix per configured provider.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        let prefix = format!("AGENTFLOW_ORACLE_{}_", self.name.to_uppercase());
        if let Ok(v) = std::env::var(format!("{prefix}API_KEY")) {
            self.api_key = Some(v);
        }
        if let Ok(v) = std::env::var(format!("{prefix}ENDPOINT")) {
            self.endpoint = Some(v);
        }
        if let Ok(v) = std::env::var(format!("{prefix}MODEL")) {
            self.model = v;
        }
        if let Ok(v) = std::env::var(format!("{prefix}TIMEOUT_SECS")) {
            if let Ok(parsed) = v.parse() {
                self.timeout_secs = parsed;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_apply_only_matching_prefix() {
        std::env::set_var("AGENTFLOW_ORACLE_TEST_MODEL", "gpt-test");
        let config = OracleProviderConfig::new("test", "default-model").with_env_overrides();
        assert_eq!(config.model, "gpt-test");
        std::env::remove_var("AGENTFLOW_ORACLE_TEST_MODEL");
    }
}
