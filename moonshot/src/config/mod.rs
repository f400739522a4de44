// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Client configuration
//
// Responsibilities:
// - Defaults for endpoint, timeout and user agent
// - Resolve the API key from an explicit value or MOONSHOT_API_KEY
// - Load optional YAML config files with `${VAR}` interpolation
// - Validate everything once, before the client is built

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::{default_user_agent, API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::ConfigError;
pub use interpolation::{interpolate_with, resolve_variables};
pub use loader::load_config;
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{ClientConfig, PartialConfig};
