//! Configuration for patchgate
//!
//! Two sources feed the resolved [`Policy`]:
//! - Four required integer invocation parameters (deferral limit, quiet
//!   hours start and end, minimum battery level)
//! - An optional versioned TOML settings file for paths, timeouts and prompt
//!   wording; built-in defaults apply when it is absent

mod params;
mod policy;
mod schema;
mod validation;

pub use params::*;
pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),

    #[error("Expected 4 parameters (or 7 with the 3 reserved leading ones), got {0}")]
    WrongParameterCount(usize),

    #[error("Parameter {name} must be an integer, got '{value}'")]
    NotAnInteger { name: &'static str, value: String },

    #[error("Parameter {name} out of range: {message}")]
    OutOfRange { name: &'static str, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate the settings file
pub fn load_settings(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let content = std::fs::read_to_string(path)?;
    parse_settings(&content)
}

/// Parse and validate settings from a TOML string
pub fn parse_settings(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Settings::from_raw(raw))
}

/// Build the full policy from invocation parameters and an optional
/// settings file. A missing file is only an error if it was asked for
/// explicitly.
pub fn load_policy(
    params: &[String],
    settings_path: Option<&Path>,
    explicit: bool,
) -> ConfigResult<Policy> {
    let thresholds = parse_invocation(params)?;

    let settings = match settings_path {
        Some(path) if explicit || path.exists() => {
            let settings = load_settings(path)?;
            tracing::debug!(path = %path.display(), "Settings file loaded");
            settings
        }
        _ => Settings::default(),
    };

    Ok(Policy {
        thresholds,
        settings,
    })
}
