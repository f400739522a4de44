// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::PartialConfig;

/// Load a client config file from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Parse into raw deserialization types (an empty document is allowed)
/// 3. Resolve `${VAR}` interpolation in string fields
/// 4. Validate values that can be checked without defaults
pub fn load_config(source: &dyn ConfigSource) -> Result<PartialConfig, ConfigError> {
    let raw_yaml = source.load()?;

    let raw: raw::RawConfig = if raw_yaml.trim().is_empty() {
        raw::RawConfig::default()
    } else {
        serde_yaml::from_str(&raw_yaml)?
    };

    let timeout = match raw.timeout_ms {
        Some(0) => {
            return Err(ConfigError::Validation(
                "timeout_ms must be greater than zero".to_string(),
            ))
        }
        Some(ms) => Some(Duration::from_millis(ms)),
        None => None,
    };

    Ok(PartialConfig {
        api_key: interpolate(raw.api_key)?,
        base_url: interpolate(raw.base_url)?,
        timeout,
        user_agent: interpolate(raw.user_agent)?,
    })
}

fn interpolate(value: Option<String>) -> Result<Option<String>, ConfigError> {
    value.map(|v| resolve_variables(&v)).transpose()
}
