//! Mode relaxation tiers.
//!
//! Tiers are cumulative: a mode emits its own tier after every tier of the
//! modes below it, so `Strict ⊆ Balanced ⊆ Permissive` holds by construction.

use crate::catalog::{LayerBuilder, READ_ONLY, READ_WRITE, WRITE_ONLY, home_pattern};
use crate::context::{CompilationContext, Mode};
use crate::error::PolicyResult;
use crate::rule::{LayerId, Matcher, Rule};

/// System temp directories.
const TEMP_DIRS: &[&str] = &[
    "/tmp",
    "/private/tmp",
    "/var/tmp",
    "/private/var/tmp",
    "/var/folders",
    "/private/var/folders",
];

/// Language toolchains under home, read-only from `Balanced` up.
const TOOLCHAIN_DIRS: &[&str] = &[
    ".cargo",
    ".rustup",
    ".nvm",
    ".pyenv",
    ".rbenv",
    ".sdkman",
    ".bun",
    ".deno",
    ".volta",
    ".asdf",
    "miniforge3",
    "miniconda3",
    "anaconda3",
    "go",
];

/// Bytecode caches written by Python under the toolchain trees.
const PYCACHE_SUFFIXES: &[&str] = &[
    r"/\.local/.*/__pycache__/.*$",
    r"/\.pyenv/.*/__pycache__/.*$",
    r"/miniforge3/.*/__pycache__/.*$",
    r"/miniconda3/.*/__pycache__/.*$",
    r"/anaconda3/.*/__pycache__/.*$",
];

/// Cache and config locations under home, writable in `Permissive`.
const WRITABLE_CACHE_DIRS: &[&str] = &[
    ".cache",
    ".config",
    ".npm",
    ".cargo/registry",
    ".cargo/git",
    "go/pkg",
    ".bun/install",
    ".gradle",
    ".m2",
    "Library/Caches",
];

/// Rules for `ctx.mode()` and every mode below it.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if home is unrepresentable.
pub fn rules(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    let mut layer = LayerBuilder::new(LayerId::ModeRelaxation);
    for tier in Mode::ALL.into_iter().filter(|tier| *tier <= ctx.mode()) {
        match tier {
            Mode::Strict => strict(&mut layer)?,
            Mode::Balanced => balanced(ctx, &mut layer)?,
            Mode::Permissive => permissive(ctx, &mut layer)?,
        }
    }
    Ok(layer.finish())
}

fn strict(layer: &mut LayerBuilder) -> PolicyResult<()> {
    layer.allow_each(READ_WRITE, TEMP_DIRS.iter().map(|d| Matcher::subpath(*d)))?;
    Ok(())
}

fn balanced(ctx: &CompilationContext, layer: &mut LayerBuilder) -> PolicyResult<()> {
    let home = ctx.home_dir();
    layer.allow_each(
        READ_ONLY,
        TOOLCHAIN_DIRS.iter().map(|d| Matcher::subpath(home.join(d))),
    )?;
    for suffix in PYCACHE_SUFFIXES {
        layer.allow(WRITE_ONLY, home_pattern(home, suffix)?)?;
    }
    Ok(())
}

fn permissive(ctx: &CompilationContext, layer: &mut LayerBuilder) -> PolicyResult<()> {
    let home = ctx.home_dir();
    layer.allow_each(
        READ_WRITE,
        WRITABLE_CACHE_DIRS
            .iter()
            .map(|d| Matcher::subpath(home.join(d))),
    )?;
    layer.allow(READ_WRITE, home_pattern(home, r"/\.zcompdump.*$")?)?;
    Ok(())
}
