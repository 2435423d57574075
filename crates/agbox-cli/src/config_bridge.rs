//! Bridge from `agbox_config::Config` plus command-line arguments to the
//! types the core crates take.
//!
//! Command-line values sit on top of the merged config: a CLI mode
//! replaces the configured one, CLI flags and paths are added to the
//! configured ones.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use agbox_config::{Config, expand_path};
use agbox_policy::{AgentTag, CompilationContext, ExtraPath, Mode, PermissionFlag};
use agbox_telemetry::{LogConfig, LogFormat};
use anyhow::{Context, Result};
use tracing::warn;

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--mode`
    pub mode: Option<Mode>,
    /// `--agent`, or the agent detected from the command
    pub agent: Option<AgentTag>,
    /// `--allow-*` switches
    pub flags: Vec<PermissionFlag>,
    /// `--allow-read`
    pub read_paths: Vec<String>,
    /// `--allow-write`
    pub write_paths: Vec<String>,
    /// `--facility`
    pub facility: Option<String>,
}

/// Convert the logging section to a [`LogConfig`].
///
/// `verbose` raises the level to `info`. A `file` target logs under the
/// configured directory, `~` expanded against `home`.
///
/// # Errors
///
/// Fails if the log directory is neither absolute nor `~`-relative.
pub fn to_log_config(cfg: &Config, verbose: bool, home: &Path) -> Result<LogConfig> {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Compact);
    let level = if verbose { "info" } else { cfg.logging.level.as_str() };

    let mut log_config = LogConfig::new(level).with_format(format);
    if cfg.logging.logs_to_file() {
        let directory = expand_path("logging.directory", &cfg.logging.directory, home)?;
        log_config = log_config.with_file_logging(directory);
    }
    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }
    Ok(log_config)
}

/// The SSH agent socket from `SSH_AUTH_SOCK`, if it is usable.
///
/// An empty value is treated as unset. A relative path cannot be granted
/// and is skipped with a warning.
pub fn ssh_agent_socket(raw: Option<OsString>) -> Option<PathBuf> {
    let path = PathBuf::from(raw.filter(|value| !value.is_empty())?);
    if path.is_absolute() {
        Some(path)
    } else {
        warn!(path = %path.display(), "SSH_AUTH_SOCK is not an absolute path; not granting it");
        None
    }
}

/// The facility to launch: `--facility`, else the configured one.
pub fn facility(cfg: &Config, overrides: &CliOverrides) -> String {
    overrides
        .facility
        .clone()
        .unwrap_or_else(|| cfg.sandbox.facility.clone())
}

/// Build the compilation context for this invocation.
///
/// # Errors
///
/// Fails if a configured or command-line path cannot be made absolute.
pub fn to_compilation_context(
    cfg: &Config,
    overrides: &CliOverrides,
    work_dir: PathBuf,
    home: PathBuf,
    ssh_agent_socket: Option<PathBuf>,
) -> Result<CompilationContext> {
    let mut extra_paths = cfg.sandbox.extra_paths(&home)?;
    for raw in &overrides.read_paths {
        extra_paths.push(ExtraPath::read_only(cli_path(raw, &home)?));
    }
    for raw in &overrides.write_paths {
        extra_paths.push(ExtraPath::read_write(cli_path(raw, &home)?));
    }

    Ok(CompilationContext::new(work_dir, home)
        .with_mode(overrides.mode.unwrap_or(cfg.sandbox.mode))
        .with_agent(overrides.agent.clone())
        .with_flags(cfg.sandbox.flags.iter().copied())
        .with_flags(overrides.flags.iter().copied())
        .with_ssh_agent_socket(ssh_agent_socket)
        .with_extra_paths(extra_paths))
}

/// A path from the command line: `~` is expanded and relative paths are
/// taken from the current directory.
fn cli_path(raw: &str, home: &Path) -> Result<PathBuf> {
    if raw == "~" || raw.starts_with("~/") {
        return Ok(expand_path("--allow-read/--allow-write", raw, home)?);
    }
    std::path::absolute(raw).with_context(|| format!("cannot resolve path '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agbox_policy::Access;
    use agbox_telemetry::LogTarget;

    #[test]
    fn test_log_config_from_defaults() {
        let cfg = Config::default();
        let home = Path::new("/Users/u");
        let lc = to_log_config(&cfg, false, home).unwrap();
        assert_eq!(lc.level, "warn");
        assert_eq!(lc.format, LogFormat::Compact);
        assert_eq!(lc.target, LogTarget::Stderr);
        assert_eq!(to_log_config(&cfg, true, home).unwrap().level, "info");
    }

    #[test]
    fn test_log_config_format_and_directives() {
        let mut cfg = Config::default();
        cfg.logging.format = "json".to_owned();
        cfg.logging.directives = vec!["agbox_exec=debug".to_owned()];
        let lc = to_log_config(&cfg, false, Path::new("/Users/u")).unwrap();
        assert_eq!(lc.format, LogFormat::Json);
        assert_eq!(lc.directives, vec!["agbox_exec=debug"]);
    }

    #[test]
    fn test_log_config_file_target() {
        let mut cfg = Config::default();
        cfg.logging.target = "file".to_owned();
        let lc = to_log_config(&cfg, false, Path::new("/Users/u")).unwrap();
        assert_eq!(lc.target, LogTarget::File(PathBuf::from("/Users/u/.agbox/logs")));
        assert!(!lc.ansi);

        cfg.logging.directory = "logs".to_owned();
        assert!(to_log_config(&cfg, false, Path::new("/Users/u")).is_err());
    }

    #[test]
    fn test_ssh_agent_socket_filtering() {
        assert_eq!(ssh_agent_socket(None), None);
        assert_eq!(ssh_agent_socket(Some(OsString::new())), None);
        assert_eq!(ssh_agent_socket(Some("agent.sock".into())), None);
        assert_eq!(
            ssh_agent_socket(Some("/tmp/ssh-x/agent.1".into())),
            Some(PathBuf::from("/tmp/ssh-x/agent.1"))
        );
    }

    #[test]
    fn test_cli_mode_replaces_config_mode() {
        let cfg = Config::default();
        let overrides = CliOverrides {
            mode: Some(Mode::Strict),
            ..CliOverrides::default()
        };
        let ctx = to_compilation_context(
            &cfg,
            &overrides,
            "/Users/u/proj".into(),
            "/Users/u".into(),
            None,
        )
        .unwrap();
        assert_eq!(ctx.mode(), Mode::Strict);

        let ctx = to_compilation_context(
            &cfg,
            &CliOverrides::default(),
            "/Users/u/proj".into(),
            "/Users/u".into(),
            None,
        )
        .unwrap();
        assert_eq!(ctx.mode(), Mode::Balanced);
    }

    #[test]
    fn test_flags_and_paths_accumulate() {
        let mut cfg = Config::default();
        cfg.sandbox.flags = vec![PermissionFlag::AllowGpgKeys];
        cfg.sandbox.write_paths = vec!["~/scratch".to_owned()];
        let overrides = CliOverrides {
            flags: vec![PermissionFlag::AllowSshKeys],
            read_paths: vec!["~/data".to_owned(), "/opt/models".to_owned()],
            ..CliOverrides::default()
        };
        let ctx = to_compilation_context(
            &cfg,
            &overrides,
            "/Users/u/proj".into(),
            "/Users/u".into(),
            Some("/tmp/agent.sock".into()),
        )
        .unwrap();

        assert!(ctx.has_flag(PermissionFlag::AllowGpgKeys));
        assert!(ctx.has_flag(PermissionFlag::AllowSshKeys));
        let extra: Vec<_> = ctx
            .extra_paths()
            .iter()
            .map(|p| (p.path.to_str().unwrap(), p.access))
            .collect();
        assert_eq!(
            extra,
            vec![
                ("/Users/u/scratch", Access::ReadWrite),
                ("/Users/u/data", Access::ReadOnly),
                ("/opt/models", Access::ReadOnly),
            ]
        );
        assert_eq!(ctx.ssh_agent_socket(), Some(Path::new("/tmp/agent.sock")));
    }

    #[test]
    fn test_relative_cli_path_is_made_absolute() {
        let path = cli_path("notes", Path::new("/Users/u")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("notes"));
    }

    #[test]
    fn test_facility_override() {
        let cfg = Config::default();
        assert_eq!(facility(&cfg, &CliOverrides::default()), "/usr/bin/sandbox-exec");
        let overrides = CliOverrides {
            facility: Some("/bin/sh".to_owned()),
            ..CliOverrides::default()
        };
        assert_eq!(facility(&cfg, &overrides), "/bin/sh");
    }
}
