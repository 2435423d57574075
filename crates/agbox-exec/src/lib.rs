//! agbox exec - runs a command under a compiled sandbox profile.
//!
//! The supervisor writes the rendered profile to a private temporary file,
//! launches `<facility> -f <profile> <command> <args...>` with inherited
//! stdio, relays termination signals to the child and reports its exit
//! status unchanged. The profile file is removed on every exit path.
//!
//! [`run_sandboxed`] chains compilation, rendering and execution and tags
//! any failure with the [`Phase`] it happened in.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod artifact;
mod error;
mod relay;
mod supervisor;

use agbox_policy::{CompilationContext, LayerRegistry};
use tracing::debug;

pub use artifact::SandboxArtifact;
pub use error::{ExecError, ExecResult, Phase, RunError, RunFailure};
pub use relay::{RelaySignal, SignalRelay};
pub use supervisor::{ChildExit, DEFAULT_FACILITY, Supervisor, SupervisorConfig, resolve_facility};

/// Compile `ctx`, render it and run `command` under the result.
///
/// # Errors
///
/// Returns a [`RunError`] whose phase says whether compilation, rendering
/// or execution failed. A non-zero child exit is not an error.
pub async fn run_sandboxed(
    ctx: &CompilationContext,
    registry: &LayerRegistry,
    config: &SupervisorConfig,
    command: &str,
    args: &[String],
) -> Result<ChildExit, RunError> {
    let policy =
        agbox_policy::compile(ctx, registry).map_err(|e| RunError::new(Phase::Compile, e))?;
    let profile = agbox_policy::render(&policy).map_err(|e| RunError::new(Phase::Render, e))?;
    debug!(rules = policy.rules().len(), bytes = profile.len(), "Profile ready");

    Supervisor::new(config.clone())
        .run(&profile, command, args)
        .await
        .map_err(|e| RunError::new(Phase::Execute, e))
}
