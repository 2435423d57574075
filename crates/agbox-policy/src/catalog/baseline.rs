//! Baseline layer: what any program needs to start and talk to a terminal.
//!
//! The profile header denies everything by default. This layer opens the
//! process-level operations without a path filter and the system directories
//! read-only; home stays closed.

use crate::catalog::{LayerBuilder, READ_ONLY, READ_WRITE, WRITE_ONLY};
use crate::context::CompilationContext;
use crate::error::PolicyResult;
use crate::rule::{LayerId, Matcher, Operation, Rule};

/// Operations granted without a path filter.
const PROCESS_OPERATIONS: &[Operation] = &[
    Operation::ProcessExec,
    Operation::ProcessFork,
    Operation::ProcessInfo,
    Operation::Signal,
    Operation::SysctlRead,
    Operation::MachLookup,
    Operation::IpcPosix,
    Operation::IokitOpen,
    Operation::PseudoTty,
    Operation::SystemSocket,
    Operation::UserPreferenceRead,
    Operation::FileIoctl,
    Operation::FileMapExecutable,
    // Coarse gate only: exfiltration over the network is out of scope.
    Operation::Network,
    // stat() on any path, needed to resolve and traverse directories.
    Operation::FileReadMetadata,
];

/// System directories every toolchain reads from.
const SYSTEM_READ_DIRS: &[&str] = &[
    "/bin",
    "/sbin",
    "/usr",
    "/System",
    "/Library",
    "/Applications",
    "/opt",
    "/etc",
    "/private/etc",
    "/dev",
    "/var",
    "/private/var",
];

/// Device nodes a program may write to.
const WRITABLE_DEVICES: &[&str] = &[
    "/dev/null",
    "/dev/zero",
    "/dev/tty",
    "/dev/ptmx",
    "/dev/dtracehelper",
];

/// Baseline rules.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if the SSH agent socket path
/// is not representable.
pub fn rules(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    let mut layer = LayerBuilder::new(LayerId::Baseline);

    for op in PROCESS_OPERATIONS {
        layer.allow(&[*op], Matcher::Global)?;
    }

    layer.allow_each(READ_ONLY, SYSTEM_READ_DIRS.iter().map(|d| Matcher::subpath(*d)))?;
    layer.allow_each(
        WRITE_ONLY,
        WRITABLE_DEVICES.iter().map(|d| Matcher::literal(*d)),
    )?;
    layer.allow(WRITE_ONLY, Matcher::pattern(r"^/dev/ttys[0-9]+$")?)?;
    layer.allow(WRITE_ONLY, Matcher::pattern(r"^/dev/fd/[0-9]+$")?)?;

    // Keeps `git push` over the SSH agent working without exposing keys.
    if let Some(socket) = ctx.ssh_agent_socket() {
        layer.allow(READ_WRITE, Matcher::literal(socket))?;
    }

    Ok(layer.finish())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::rule::Effect;

    #[test]
    fn test_baseline_is_allow_only() {
        let ctx = CompilationContext::new("/home/u/proj", "/home/u");
        let rules = rules(&ctx).unwrap();
        assert!(rules.iter().all(|r| r.effect() == Effect::Allow));
        assert!(
            rules
                .iter()
                .any(|r| r.applies_to(Operation::ProcessFork, Path::new("/")))
        );
    }

    #[test]
    fn test_baseline_does_not_open_home() {
        let ctx = CompilationContext::new("/Users/u/proj", "/Users/u");
        let rules = rules(&ctx).unwrap();
        assert!(
            !rules
                .iter()
                .any(|r| r.applies_to(Operation::FileRead, Path::new("/Users/u/notes.txt")))
        );
        assert!(
            rules
                .iter()
                .any(|r| r.applies_to(Operation::FileRead, Path::new("/usr/bin/git")))
        );
    }

    #[test]
    fn test_ssh_agent_socket_granted() {
        let socket = "/private/tmp/com.apple.launchd.abc/Listeners";
        let ctx = CompilationContext::new("/w", "/Users/u")
            .with_ssh_agent_socket(Some(socket.into()));
        let rules = rules(&ctx).unwrap();
        assert!(
            rules
                .iter()
                .any(|r| r.applies_to(Operation::FileWrite, Path::new(socket)))
        );
    }
}
