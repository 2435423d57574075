//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.agbox/config.toml`, or `$AGBOX_HOME/config.toml` (user)
//! 3. Merge `{workspace}/.agbox/config.toml` (workspace), tighten-only
//! 4. Apply `AGBOX_MODE`, `AGBOX_FACILITY` and `AGBOX_LOG`
//! 5. Deserialize the merged tree → `Config` and validate

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{deep_merge, restrict_workspace, set_nested};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// Environment variables that override merged fields, with their targets
/// and whether the value is case-insensitive.
const ENV_OVERRIDES: &[(&str, &[&str], bool)] = &[
    ("AGBOX_MODE", &["sandbox", "mode"], true),
    ("AGBOX_FACILITY", &["sandbox", "facility"], false),
    ("AGBOX_LOG", &["logging", "level"], false),
];

/// A loaded config plus the files it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged, validated configuration.
    pub config: Config,
    /// Config files that were found and merged, in order.
    pub loaded_files: Vec<PathBuf>,
    /// Settings that were ignored while loading, for the caller to report
    /// once logging is up.
    pub notices: Vec<String>,
}

/// The `AGBOX_*` variables of the current process.
fn collect_env_vars() -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("AGBOX_"))
        .collect()
}

/// Load the configuration with layered file precedence.
///
/// `workspace_root` is the sandboxed workspace; if `None`, the workspace
/// layer is skipped. `agbox_home_override` replaces the user config
/// directory (it is treated as the `.agbox` directory itself).
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    agbox_home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();
    let mut notices = Vec::new();
    let user_dir = match agbox_home_override {
        Some(dir) => dir.to_path_buf(),
        None => user_config_dir(&env_vars, &mut notices)?,
    };
    let mut resolved = load_with_env(workspace_root, &user_dir, &env_vars)?;
    notices.append(&mut resolved.notices);
    resolved.notices = notices;
    Ok(resolved)
}

/// [`load`] with an explicit user config directory and environment.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(
    workspace_root: Option<&Path>,
    user_dir: &Path,
    env_vars: &BTreeMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Parse embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();
    let mut notices = Vec::new();

    // 2. User config.
    let user_path = user_dir.join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, &overlay);
        info!(path = %user_path.display(), "loaded user config");
        loaded_files.push(user_path);
    }

    // 3. Workspace config, restricted against everything merged so far.
    if let Some(ws_root) = workspace_root {
        let ws_path = ws_root.join(".agbox").join("config.toml");
        if let Some(mut overlay) = try_load_file(&ws_path)? {
            notices.extend(restrict_workspace(&mut overlay, &merged));
            deep_merge(&mut merged, &overlay);
            info!(path = %ws_path.display(), "loaded workspace config");
            loaded_files.push(ws_path);
        }
    }

    // 4. Environment overrides.
    for (var, path, fold_case) in ENV_OVERRIDES {
        if let Some(value) = env_vars.get(*var).filter(|v| !v.is_empty()) {
            debug!(var, value = %value, "applying environment override");
            let value = if *fold_case {
                value.to_ascii_lowercase()
            } else {
                value.clone()
            };
            set_nested(&mut merged, path, toml::Value::String(value));
        }
    }

    // 5. Deserialize and validate.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
        notices,
    })
}

/// The user config directory: `~/.agbox`, unless that has no config file
/// and `AGBOX_HOME` names a usable directory. An unusable `AGBOX_HOME` is
/// reported through `notices`.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if the home directory is unknown.
pub fn user_config_dir(
    env_vars: &BTreeMap<String, String>,
    notices: &mut Vec<String>,
) -> ConfigResult<PathBuf> {
    let home = home_directory()?;
    let default_dir = home.join(".agbox");
    if default_dir.join("config.toml").is_file() {
        return Ok(default_dir);
    }
    if let Some(raw) = env_vars.get("AGBOX_HOME") {
        if let Some(dir) = validate_agbox_home(raw, &home) {
            return Ok(dir);
        }
        notices.push(format!(
            "AGBOX_HOME '{raw}' is not a directory owned by the current user; ignoring it"
        ));
    }
    Ok(default_dir)
}

/// Determine the user's home directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if it cannot be determined.
pub fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len(),
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Validate that an `AGBOX_HOME` path is a real directory owned by the
/// same user who owns `home_dir`. Returns the canonicalized path on success.
fn validate_agbox_home(raw_path: &str, home_dir: &Path) -> Option<PathBuf> {
    use std::os::unix::fs::MetadataExt;

    let canonical = PathBuf::from(raw_path).canonicalize().ok()?;
    if !canonical.is_dir() {
        return None;
    }
    let dir_uid = canonical.metadata().ok()?.uid();
    let home_uid = home_dir.metadata().ok()?.uid();
    (dir_uid == home_uid).then_some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agbox_policy::Mode;

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(try_load_file(&dir.path().join("absent.toml")).unwrap().is_none());
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let big = format!("# {}\n", "x".repeat(MAX_CONFIG_FILE_SIZE));
        std::fs::write(&path, big).unwrap();
        assert!(matches!(
            try_load_file(&path),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_agbox_home_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_agbox_home("/definitely/not/here", dir.path()).is_none());
        assert!(validate_agbox_home(dir.path().to_str().unwrap(), dir.path()).is_some());
    }

    #[test]
    fn test_env_override_applies() {
        let dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::from([("AGBOX_MODE".to_owned(), "strict".to_owned())]);
        let resolved = load_with_env(None, dir.path(), &env).unwrap();
        assert_eq!(resolved.config.sandbox.mode, Mode::Strict);
        assert!(resolved.loaded_files.is_empty());
        assert!(resolved.notices.is_empty());
    }

    #[test]
    fn test_env_mode_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for raw in ["Strict", "STRICT", "strict"] {
            let env = BTreeMap::from([("AGBOX_MODE".to_owned(), raw.to_owned())]);
            let resolved = load_with_env(None, dir.path(), &env).unwrap();
            assert_eq!(resolved.config.sandbox.mode, Mode::Strict, "{raw}");
        }
    }

    #[test]
    fn test_unusable_agbox_home_is_noticed() {
        let env = BTreeMap::from([("AGBOX_HOME".to_owned(), "/definitely/not/here".to_owned())]);
        let mut notices = Vec::new();
        if let Ok(dir) = user_config_dir(&env, &mut notices)
            && !dir.join("config.toml").is_file()
        {
            assert_eq!(notices.len(), 1);
            assert!(notices[0].contains("AGBOX_HOME"));
        }
    }
}
