use std::path::{Path, PathBuf};

use agbox_policy::{ExtraPath, Mode, PermissionFlag};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// The merged configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sandbox policy settings.
    pub sandbox: SandboxSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

/// `[sandbox]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    /// Security mode.
    pub mode: Mode,
    /// Enforcement facility path or bare name.
    pub facility: String,
    /// Permission flags enabled by default.
    pub flags: Vec<PermissionFlag>,
    /// Extra read-only subtrees.
    pub read_paths: Vec<String>,
    /// Extra read-write subtrees.
    pub write_paths: Vec<String>,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            facility: "/usr/bin/sandbox-exec".to_owned(),
            flags: Vec::new(),
            read_paths: Vec::new(),
            write_paths: Vec::new(),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level filter.
    pub level: String,
    /// `pretty`, `compact` or `json`.
    pub format: String,
    /// `stderr` or `file`.
    pub target: String,
    /// Directory for daily-rotated log files when `target` is `file`.
    pub directory: String,
    /// Per-target filter directives.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: "compact".to_owned(),
            target: "stderr".to_owned(),
            directory: "~/.agbox/logs".to_owned(),
            directives: Vec::new(),
        }
    }
}

impl LoggingSection {
    /// Whether logs go to files instead of stderr.
    #[must_use]
    pub fn logs_to_file(&self) -> bool {
        self.target.eq_ignore_ascii_case("file")
    }
}

impl SandboxSection {
    /// The configured extra paths, `~` expanded against `home`.
    ///
    /// Read-only entries come first, then read-write ones, each in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a path that is neither
    /// absolute nor `~`-relative.
    pub fn extra_paths(&self, home: &Path) -> ConfigResult<Vec<ExtraPath>> {
        let read = self
            .read_paths
            .iter()
            .map(|p| expand_path("sandbox.read_paths", p, home).map(ExtraPath::read_only));
        let write = self
            .write_paths
            .iter()
            .map(|p| expand_path("sandbox.write_paths", p, home).map(ExtraPath::read_write));
        read.chain(write).collect()
    }
}

/// Expand a leading `~` against `home` and require an absolute result.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] naming `field` when the path is
/// relative.
pub fn expand_path(field: &str, raw: &str, home: &Path) -> ConfigResult<PathBuf> {
    let expanded = if raw == "~" {
        home.to_path_buf()
    } else if let Some(rest) = raw.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(raw)
    };
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Err(ConfigError::ValidationError {
            field: field.to_owned(),
            message: format!("path '{raw}' must be absolute or start with '~/'"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agbox_policy::Access;

    #[test]
    fn test_expand_path() {
        let home = Path::new("/Users/u");
        assert_eq!(
            expand_path("f", "~/data", home).unwrap(),
            PathBuf::from("/Users/u/data")
        );
        assert_eq!(expand_path("f", "~", home).unwrap(), PathBuf::from("/Users/u"));
        assert_eq!(
            expand_path("f", "/opt/x", home).unwrap(),
            PathBuf::from("/opt/x")
        );
        assert!(expand_path("f", "data", home).is_err());
        assert!(expand_path("f", "~other/data", home).is_err());
    }

    #[test]
    fn test_extra_paths_order_and_access() {
        let section = SandboxSection {
            read_paths: vec!["/opt/ref".into()],
            write_paths: vec!["~/scratch".into()],
            ..SandboxSection::default()
        };
        let paths = section.extra_paths(Path::new("/Users/u")).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].access, Access::ReadOnly);
        assert_eq!(paths[1].path, PathBuf::from("/Users/u/scratch"));
        assert_eq!(paths[1].access, Access::ReadWrite);
    }

    #[test]
    fn test_config_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [sandbox]
            mode = "strict"
            flags = ["allow-ssh-keys"]
            "#,
        )
        .unwrap();
        assert_eq!(config.sandbox.mode, Mode::Strict);
        assert_eq!(config.sandbox.flags, vec![PermissionFlag::AllowSshKeys]);
        assert_eq!(config.sandbox.facility, "/usr/bin/sandbox-exec");
        assert_eq!(config.logging.level, "warn");
        assert!(!config.logging.logs_to_file());
    }

    #[test]
    fn test_file_logging_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            target = "file"
            directory = "/var/tmp/agbox"
            "#,
        )
        .unwrap();
        assert!(config.logging.logs_to_file());
        assert_eq!(config.logging.directory, "/var/tmp/agbox");
        assert_eq!(config.logging.format, "compact");
    }
}
