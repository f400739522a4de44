// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.moonshot.ai/v1";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable consulted when no API key is given explicitly.
pub const API_KEY_ENV: &str = "MOONSHOT_API_KEY";

pub fn default_user_agent() -> String {
    format!("moonshot-rs/{}", crate::VERSION)
}
