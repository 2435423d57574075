//! Validation of the merged configuration.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const LOG_FORMATS: &[&str] = &["pretty", "compact", "json"];
const LOG_TARGETS: &[&str] = &["stderr", "file"];

/// Validate a deserialized config.
///
/// Mode and flag names are already checked by deserialization; this covers
/// the free-form string fields.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] naming the first invalid field.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.sandbox.facility.trim().is_empty() {
        return Err(invalid("sandbox.facility", "must not be empty"));
    }
    for (field, paths) in [
        ("sandbox.read_paths", &config.sandbox.read_paths),
        ("sandbox.write_paths", &config.sandbox.write_paths),
    ] {
        if let Some(bad) = paths.iter().find(|p| !is_absolute_or_home(p)) {
            return Err(invalid(
                field,
                &format!("path '{bad}' must be absolute or start with '~/'"),
            ));
        }
    }
    if config.logging.level.trim().is_empty() {
        return Err(invalid("logging.level", "must not be empty"));
    }
    if !LOG_FORMATS.contains(&config.logging.format.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            "logging.format",
            &format!(
                "unknown format '{}' (expected pretty, compact or json)",
                config.logging.format
            ),
        ));
    }
    if !LOG_TARGETS.contains(&config.logging.target.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            "logging.target",
            &format!(
                "unknown target '{}' (expected stderr or file)",
                config.logging.target
            ),
        ));
    }
    if config.logging.logs_to_file() && !is_absolute_or_home(&config.logging.directory) {
        return Err(invalid(
            "logging.directory",
            &format!(
                "path '{}' must be absolute or start with '~/'",
                config.logging.directory
            ),
        ));
    }
    Ok(())
}

fn is_absolute_or_home(path: &str) -> bool {
    path.starts_with('/') || path == "~" || path.starts_with("~/")
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.to_owned(),
    }
}
