// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
//
// String fields are interpolated and validated before they reach
// `PartialConfig`.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}
