//! Execution error types.

use std::fmt;
use std::io;

use agbox_policy::PolicyError;
use thiserror::Error;

/// Errors raised while launching or supervising the sandboxed child.
///
/// A child that exits non-zero is not an error; see [`crate::ChildExit`].
#[derive(Debug, Error)]
pub enum ExecError {
    /// The enforcement facility is missing or cannot be executed.
    #[error("enforcement facility '{facility}' is unavailable: {reason}")]
    EnforcementUnavailable {
        /// The facility as configured.
        facility: String,
        /// What went wrong.
        reason: String,
    },

    /// The policy artifact could not be created or written.
    #[error("failed to write sandbox profile: {0}")]
    Artifact(#[source] io::Error),

    /// The child could not be spawned for a reason other than the facility.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// The command being launched.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Signal listeners could not be installed.
    #[error("failed to install signal handlers: {0}")]
    SignalSetup(#[source] io::Error),

    /// Waiting on the child failed.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// The stage of a sandboxed run that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Building the policy from the context.
    Compile,
    /// Turning the policy into profile text.
    Render,
    /// Writing the artifact, spawning and supervising the child.
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compile => "compile",
            Self::Render => "render",
            Self::Execute => "execute",
        })
    }
}

/// Underlying cause of a [`RunError`].
#[derive(Debug, Error)]
pub enum RunFailure {
    /// Compilation or rendering failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// Execution failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// A failed sandboxed run, tagged with the phase that failed.
#[derive(Debug, Error)]
#[error("{phase} failed: {source}")]
pub struct RunError {
    /// Where the run stopped.
    pub phase: Phase,
    /// Why.
    #[source]
    pub source: RunFailure,
}

impl RunError {
    /// Wrap `source` as a failure of `phase`.
    pub fn new(phase: Phase, source: impl Into<RunFailure>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }
}
