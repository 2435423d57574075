//! Launches a command under the enforcement facility and waits for it.

use std::io::{self, IsTerminal};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::artifact::SandboxArtifact;
use crate::error::{ExecError, ExecResult};
use crate::relay::{RelaySignal, SignalRelay};

/// The facility used when none is configured.
pub const DEFAULT_FACILITY: &str = "/usr/bin/sandbox-exec";

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Enforcement facility: an absolute path, or a bare name looked up on
    /// `PATH`. Invoked as `<facility> -f <profile> <command> <args...>`.
    pub facility: String,
    /// Directory for the profile artifact. System temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
    /// Whether to forward `SIGINT` and `SIGQUIT`. When `None`, they are
    /// forwarded only if stdin is not a terminal.
    pub forward_keyboard_signals: Option<bool>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            facility: DEFAULT_FACILITY.to_owned(),
            temp_dir: None,
            forward_keyboard_signals: None,
        }
    }
}

impl SupervisorConfig {
    /// Settings using `facility`.
    #[must_use]
    pub fn new(facility: impl Into<String>) -> Self {
        Self {
            facility: facility.into(),
            ..Self::default()
        }
    }

    /// Place the artifact in `dir`.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Force keyboard signal forwarding on or off.
    #[must_use]
    pub fn with_keyboard_forwarding(mut self, forward: bool) -> Self {
        self.forward_keyboard_signals = Some(forward);
        self
    }
}

/// How the sandboxed child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    code: i32,
}

impl ChildExit {
    /// Exit code, or `128 + n` when the child was killed by signal `n`.
    #[must_use]
    pub fn code(self) -> i32 {
        self.code
    }

    /// Whether the child exited with status zero.
    #[must_use]
    pub fn success(self) -> bool {
        self.code == 0
    }

    /// Convert a wait status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        let code = status
            .code()
            .or_else(|| status.signal().map(|sig| 128_i32.saturating_add(sig)))
            .unwrap_or(1);
        Self { code }
    }
}

/// Runs one command under one profile.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    /// Create a supervisor.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// The supervisor's settings.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run `command` with `args` under `profile`, relaying process signals.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::run_with_relay`]. Also fails with
    /// [`ExecError::SignalSetup`] if signal listeners cannot be installed.
    pub async fn run(&self, profile: &str, command: &str, args: &[String]) -> ExecResult<ChildExit> {
        let relay = SignalRelay::install().map_err(ExecError::SignalSetup)?;
        self.run_with_relay(profile, command, args, relay).await
    }

    /// Run `command` with `args` under `profile`, forwarding whatever
    /// `relay` yields to the child.
    ///
    /// The artifact is removed before this returns, whatever the outcome.
    /// The relay is cancelled once the child has exited, so signals that
    /// arrive afterwards get their default action.
    ///
    /// # Errors
    ///
    /// - [`ExecError::EnforcementUnavailable`] if the facility cannot be
    ///   found or executed; no artifact is created when it is missing
    /// - [`ExecError::Artifact`] if the profile cannot be written
    /// - [`ExecError::Spawn`] or [`ExecError::Wait`] on other process failures
    pub async fn run_with_relay(
        &self,
        profile: &str,
        command: &str,
        args: &[String],
        mut relay: SignalRelay,
    ) -> ExecResult<ChildExit> {
        let facility = resolve_facility(&self.config.facility)?;
        let mut artifact = SandboxArtifact::create(profile, self.config.temp_dir.as_deref())?;
        let Some(artifact_path) = artifact.path().map(ToOwned::to_owned) else {
            return Err(ExecError::Artifact(io::Error::new(
                io::ErrorKind::NotFound,
                "sandbox profile vanished before launch",
            )));
        };

        info!(
            facility = %facility.display(),
            profile = %artifact_path.display(),
            command,
            "Launching sandboxed command"
        );

        let mut child = Command::new(&facility)
            .arg("-f")
            .arg(&artifact_path)
            .arg(command)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    ExecError::EnforcementUnavailable {
                        facility: self.config.facility.clone(),
                        reason: e.to_string(),
                    }
                },
                _ => ExecError::Spawn {
                    command: command.to_owned(),
                    source: e,
                },
            })?;

        let forward_keyboard = self
            .config
            .forward_keyboard_signals
            .unwrap_or_else(|| !io::stdin().is_terminal());
        let pid = child.id().and_then(|id| i32::try_from(id).ok());

        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                Some(signal) = relay.recv() => {
                    forward(pid, signal, forward_keyboard);
                }
            }
        };
        relay.cancel();
        artifact.remove();

        let exit = ChildExit::from_status(status.map_err(ExecError::Wait)?);
        debug!(code = exit.code(), "Sandboxed command exited");
        Ok(exit)
    }
}

/// Locate the facility binary.
///
/// # Errors
///
/// Returns [`ExecError::EnforcementUnavailable`] if it cannot be found.
pub fn resolve_facility(facility: &str) -> ExecResult<PathBuf> {
    if facility.is_empty() {
        return Err(ExecError::EnforcementUnavailable {
            facility: String::new(),
            reason: "no facility configured".to_owned(),
        });
    }
    which::which(facility).map_err(|e| ExecError::EnforcementUnavailable {
        facility: facility.to_owned(),
        reason: e.to_string(),
    })
}

fn forward(pid: Option<i32>, signal: RelaySignal, forward_keyboard: bool) {
    if signal.is_keyboard() && !forward_keyboard {
        debug!(?signal, "Child shares the terminal, not forwarding");
        return;
    }
    let Some(pid) = pid else {
        return;
    };
    match kill(Pid::from_raw(pid), signal.as_signal()) {
        Ok(()) => debug!(?signal, pid, "Forwarded signal to child"),
        Err(e) => warn!(?signal, pid, error = %e, "Failed to forward signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_from_code() {
        let exit = ChildExit::from_status(ExitStatus::from_raw(0x0300));
        assert_eq!(exit.code(), 3);
        assert!(!exit.success());
        assert!(ChildExit::from_status(ExitStatus::from_raw(0)).success());
    }

    #[test]
    fn test_exit_from_signal() {
        let exit = ChildExit::from_status(ExitStatus::from_raw(15));
        assert_eq!(exit.code(), 143);
    }

    #[test]
    fn test_resolve_facility() {
        assert!(resolve_facility("/bin/sh").is_ok());
        assert!(resolve_facility("sh").is_ok());
        assert!(matches!(
            resolve_facility("/no/such/sandbox-exec"),
            Err(ExecError::EnforcementUnavailable { .. })
        ));
        assert!(matches!(
            resolve_facility(""),
            Err(ExecError::EnforcementUnavailable { .. })
        ));
    }

    #[test]
    fn test_config_builders() {
        let config = SupervisorConfig::new("/bin/sh")
            .with_temp_dir("/tmp")
            .with_keyboard_forwarding(false);
        assert_eq!(config.facility, "/bin/sh");
        assert_eq!(config.forward_keyboard_signals, Some(false));
        assert_eq!(SupervisorConfig::default().facility, DEFAULT_FACILITY);
    }
}
