//! Settings validation

use crate::schema::{RawConfig, RawPaths, RawTimeouts};
use std::path::PathBuf;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Timeout '{name}' must be greater than zero")]
    ZeroTimeout { name: &'static str },

    #[error("Path '{name}' must be absolute: {path:?}")]
    RelativePath { name: &'static str, path: PathBuf },

    #[error("Prompt text '{name}' cannot be empty")]
    EmptyText { name: &'static str },

    #[error("Console sentinel list contains an empty name")]
    EmptySentinel,
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_timeouts(&config.timeouts));
    errors.extend(validate_paths(&config.paths));

    for (name, text) in [
        ("title", &config.prompt.title),
        ("login_window_heading", &config.prompt.login_window_heading),
        ("login_window_description", &config.prompt.login_window_description),
    ] {
        if matches!(text, Some(t) if t.trim().is_empty()) {
            errors.push(ValidationError::EmptyText { name });
        }
    }

    if let Some(sentinels) = &config.session.console_sentinels
        && sentinels.iter().any(|s| s.trim().is_empty())
    {
        errors.push(ValidationError::EmptySentinel);
    }

    errors
}

fn validate_timeouts(timeouts: &RawTimeouts) -> Vec<ValidationError> {
    // settle may legitimately be zero
    [
        ("check", timeouts.check),
        ("download", timeouts.download),
        ("install", timeouts.install),
        ("probe", timeouts.probe),
        ("prompt", timeouts.prompt),
    ]
    .into_iter()
    .filter(|(_, value)| *value == Some(0))
    .map(|(name, _)| ValidationError::ZeroTimeout { name })
    .collect()
}

fn validate_paths(paths: &RawPaths) -> Vec<ValidationError> {
    [
        ("update_tool", &paths.update_tool),
        ("prompt_helper", &paths.prompt_helper),
        ("icon", &paths.icon),
        ("update_index", &paths.update_index),
        ("trigger_file", &paths.trigger_file),
        ("options_file", &paths.options_file),
        ("deferral_file", &paths.deferral_file),
        ("installer_lock", &paths.installer_lock),
        ("login_window_agent", &paths.login_window_agent),
        ("data_dir", &paths.data_dir),
    ]
    .into_iter()
    .filter_map(|(name, path)| match path {
        Some(p) if !p.is_absolute() => Some(ValidationError::RelativePath {
            name,
            path: p.clone(),
        }),
        _ => None,
    })
    .collect()
}
