//! Dotfile denial and the read-only allowlist that follows it.

use crate::catalog::{LayerBuilder, READ_ONLY, READ_WRITE, home_pattern};
use crate::context::CompilationContext;
use crate::error::PolicyResult;
use crate::rule::{LayerId, Matcher, Rule};

/// Shell startup files, relative to home.
const SHELL_RC_FILES: &[&str] = &[
    ".bashrc",
    ".bash_profile",
    ".bash_login",
    ".profile",
    ".zshrc",
    ".zshenv",
    ".zprofile",
    ".zlogin",
    ".tcshrc",
    ".cshrc",
    ".inputrc",
];

/// Git configuration files, relative to home.
const GIT_CONFIG_FILES: &[&str] = &[".gitconfig", ".gitignore_global"];

/// Directories under home readable by every agent.
const READABLE_DIRS: &[&str] = &[".config/git", ".local", ".oh-my-zsh"];

/// Deny every dot-entry directly under home and everything beneath it.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if the home directory is not
/// representable as a pattern.
pub fn denial(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    let mut layer = LayerBuilder::new(LayerId::DotfileDenial);
    layer.deny(READ_WRITE, home_pattern(ctx.home_dir(), r"/\.[^/]+(/.*)?$")?)?;
    Ok(layer.finish())
}

/// Re-allow reading the dotfiles shells and git need.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if a path under home is invalid.
pub fn allowlist(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    let home = ctx.home_dir();
    let mut layer = LayerBuilder::new(LayerId::DotfileAllowlist);
    layer.allow_each(
        READ_ONLY,
        SHELL_RC_FILES
            .iter()
            .chain(GIT_CONFIG_FILES)
            .map(|f| Matcher::literal(home.join(f))),
    )?;
    layer.allow_each(
        READ_ONLY,
        READABLE_DIRS.iter().map(|d| Matcher::subpath(home.join(d))),
    )?;
    Ok(layer.finish())
}
