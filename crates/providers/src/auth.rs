//! API key resolution for the chat/embedding endpoint.
//!
//! Credentials are never read from the config file (§6) — only from the
//! environment variable named in [`memengine_domain::config::LlmConfig`].

use memengine_domain::error::{EngineError, Result};

pub struct ApiKey(String);

impl ApiKey {
    pub fn from_env(env_var: &str) -> Result<Self> {
        let value = std::env::var(env_var).map_err(|_| {
            EngineError::Configuration(format!("environment variable '{}' not set", env_var))
        })?;
        if value.trim().is_empty() {
            return Err(EngineError::Configuration(format!(
                "environment variable '{}' is empty",
                env_var
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
