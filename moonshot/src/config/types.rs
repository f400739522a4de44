// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::Duration;

use super::defaults::{default_user_agent, API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use super::error::ConfigError;

// ---------------------------------------------------------------------------
// Partial config (file or builder input)
// ---------------------------------------------------------------------------

/// Configuration with every field optional, as read from a config file or
/// collected by a builder. `resolve` fills in defaults and validates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl PartialConfig {
    /// Layer `other` over `self`; fields set in `other` win.
    pub fn merge(self, other: PartialConfig) -> PartialConfig {
        PartialConfig {
            api_key: other.api_key.or(self.api_key),
            base_url: other.base_url.or(self.base_url),
            timeout: other.timeout.or(self.timeout),
            user_agent: other.user_agent.or(self.user_agent),
        }
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ClientConfig, ConfigError> {
        self.resolve_with_env(std::env::var(API_KEY_ENV).ok())
    }

    /// Resolve with an explicit value standing in for `MOONSHOT_API_KEY`.
    pub fn resolve_with_env(self, env_api_key: Option<String>) -> Result<ClientConfig, ConfigError> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .or(env_api_key.filter(|k| !k.is_empty()))
            .ok_or(ConfigError::MissingApiKey { env: API_KEY_ENV })?;

        let base_url = validate_base_url(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ConfigError::Validation("timeout must be greater than zero".to_string()));
        }

        let user_agent = self.user_agent.unwrap_or_else(default_user_agent);
        if user_agent.is_empty() {
            return Err(ConfigError::Validation("user_agent must not be empty".to_string()));
        }

        Ok(ClientConfig {
            api_key,
            base_url,
            timeout,
            user_agent,
        })
    }
}

fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| ConfigError::Validation(format!("invalid base_url \"{raw}\": {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "base_url \"{raw}\" must use http or https"
        )));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// Validated client configuration. Read-only once built.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    /// Defaults plus `MOONSHOT_API_KEY` from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        PartialConfig::default().resolve()
    }

    /// Absolute URL for an API path such as `/chat/completions`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

// Keeps the key out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
