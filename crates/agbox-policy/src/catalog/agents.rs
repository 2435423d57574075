//! Built-in agent layers.
//!
//! Each agent gets read/write on its own configuration under home and
//! nothing else.

use crate::catalog::{LayerBuilder, READ_WRITE, home_pattern};
use crate::context::CompilationContext;
use crate::error::PolicyResult;
use crate::rule::{LayerId, Matcher, Rule};

/// Signature of a built-in agent layer.
type AgentLayer = fn(&CompilationContext) -> PolicyResult<Vec<Rule>>;

/// The built-in agents, by tag.
#[must_use]
pub fn builtin() -> [(&'static str, AgentLayer); 3] {
    [("claude", claude), ("codex", codex), ("gemini", gemini)]
}

/// Claude Code: `~/.claude`, `~/.claude.json*` and `~/.config/claude-code`.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if home is unrepresentable.
pub fn claude(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    let home = ctx.home_dir();
    let mut layer = LayerBuilder::new(LayerId::Agent);
    layer
        .allow(READ_WRITE, Matcher::subpath(home.join(".claude")))?
        // Config plus its backups and lock files.
        .allow(READ_WRITE, home_pattern(home, r"/\.claude\.json.*$")?)?
        .allow(READ_WRITE, Matcher::subpath(home.join(".config/claude-code")))?
        .allow(
            READ_WRITE,
            Matcher::subpath(home.join("Library/Caches/claude-cli-nodejs")),
        )?;
    Ok(layer.finish())
}

/// Codex CLI: `~/.codex`.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if home is unrepresentable.
pub fn codex(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    single_dir(ctx, ".codex")
}

/// Gemini CLI: `~/.gemini`.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if home is unrepresentable.
pub fn gemini(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    single_dir(ctx, ".gemini")
}

fn single_dir(ctx: &CompilationContext, dir: &str) -> PolicyResult<Vec<Rule>> {
    let mut layer = LayerBuilder::new(LayerId::Agent);
    layer.allow(READ_WRITE, Matcher::subpath(ctx.home_dir().join(dir)))?;
    Ok(layer.finish())
}
