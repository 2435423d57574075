//! Turning the user's command line into what actually gets launched.

use std::fmt;
use std::path::Path;

use agbox_policy::{AgentTag, CompilationContext, LayerRegistry};

/// Shell used for commands that are not on `PATH` when `$SHELL` is unset.
pub(crate) const FALLBACK_SHELL: &str = "/bin/bash";

/// Argument that turns off claude's own permission prompts; the sandbox
/// is the boundary instead.
const CLAUDE_SKIP_PERMISSIONS: &str = "--dangerously-skip-permissions";

/// The agent whose name matches the command's file name, if registered.
pub(crate) fn detect_agent(command: &str, registry: &LayerRegistry) -> Option<AgentTag> {
    let name = Path::new(command).file_name()?.to_str()?;
    registry.knows_agent(name).then(|| AgentTag::new(name))
}

/// Arguments to pass to `command`.
///
/// A bare `claude` gets [`CLAUDE_SKIP_PERMISSIONS`]; anything else is
/// passed through.
pub(crate) fn agent_args(command: &str, args: Vec<String>) -> Vec<String> {
    let is_claude = Path::new(command)
        .file_name()
        .is_some_and(|name| name == "claude");
    if is_claude && args.is_empty() {
        vec![CLAUDE_SKIP_PERMISSIONS.to_owned()]
    } else {
        args
    }
}

/// Whether `command` names an executable directly or via `PATH`.
pub(crate) fn is_on_path(command: &str) -> bool {
    command.contains('/') || which::which(command).is_ok()
}

/// Run `command` through an interactive shell so aliases and functions
/// resolve.
pub(crate) fn through_shell(shell: &str, command: &str, args: &[String]) -> (String, Vec<String>) {
    let line = std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ");
    (
        shell.to_owned(),
        vec!["-i".to_owned(), "-c".to_owned(), line],
    )
}

/// POSIX single-quoting. Words made only of safe characters are left bare.
pub(crate) fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if safe {
        word.to_owned()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Human-readable description of `ctx` for `--dry-run`.
pub(crate) fn summary(ctx: &CompilationContext) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_summary(&mut out, ctx)?;
    Ok(out)
}

fn write_summary(out: &mut impl fmt::Write, ctx: &CompilationContext) -> fmt::Result {
    writeln!(out, ";; work_dir: {}", ctx.work_dir().display())?;
    writeln!(out, ";; home: {}", ctx.home_dir().display())?;
    writeln!(out, ";; mode: {}", ctx.mode())?;
    writeln!(
        out,
        ";; agent: {}",
        ctx.agent().map_or("none", AgentTag::as_str)
    )?;
    let flags: Vec<&str> = ctx.flags().iter().map(|f| f.as_str()).collect();
    if flags.is_empty() {
        writeln!(out, ";; flags: none")?;
    } else {
        writeln!(out, ";; flags: {}", flags.join(", "))?;
    }
    for extra in ctx.extra_paths() {
        writeln!(out, ";; {:?}: {}", extra.access, extra.path.display())?;
    }
    if let Some(socket) = ctx.ssh_agent_socket() {
        writeln!(out, ";; ssh agent: {}", socket.display())?;
    }
    Ok(())
}
