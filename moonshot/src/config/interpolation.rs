// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Resolves `${VAR}` and `${VAR:-fallback}` references using `lookup`.
///
/// A reference with no fallback whose variable is unset is an error. An
/// unterminated `${` is kept literally.
pub fn interpolate_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return Ok(result);
        };

        let reference = &after[..end];
        let (name, fallback) = match reference.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (reference, None),
        };

        if name.is_empty() {
            result.push_str(&rest[start..start + 3 + end]);
        } else {
            match (lookup(name), fallback) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(fallback)) => result.push_str(fallback),
                (None, None) => {
                    return Err(ConfigError::UndefinedVariable {
                        name: name.to_string(),
                    })
                }
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Resolves references from the process environment.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    interpolate_with(input, |name| std::env::var(name).ok())
}
