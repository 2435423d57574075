//! agbox policy - layered sandbox policy compilation for AI coding agents.
//!
//! This crate provides:
//! - A typed rule model over macOS Seatbelt operations and path matchers
//! - The layer catalog (baseline, sensitive paths, dotfiles, workspace,
//!   agents, modes, user grants, flag grants) behind a [`LayerRegistry`]
//! - A compiler producing an ordered [`Policy`] with last-match-wins
//!   evaluation
//! - A pure renderer to SBPL text
//!
//! Nothing here touches the filesystem or spawns processes.
//!
//! # Example
//!
//! ```rust
//! use agbox_policy::{CompilationContext, LayerRegistry, Mode, Operation, compile};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), agbox_policy::PolicyError> {
//! let ctx = CompilationContext::new("/Users/dev/project", "/Users/dev").with_mode(Mode::Strict);
//! let policy = compile(&ctx, &LayerRegistry::builtin())?;
//!
//! assert!(policy.allows(Operation::FileWrite, Path::new("/Users/dev/project/src/lib.rs")));
//! assert!(!policy.allows(Operation::FileRead, Path::new("/Users/dev/.ssh/id_ed25519")));
//!
//! let profile = agbox_policy::render(&policy)?;
//! assert!(profile.starts_with("(version 1)"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod catalog;
pub mod prelude;

mod compiler;
mod context;
mod error;
mod render;
mod rule;

pub use catalog::{LayerBuilder, LayerFn, LayerRegistry};
pub use compiler::{Policy, PolicyCompiler, compile};
pub use context::{Access, AgentTag, CompilationContext, ExtraPath, Mode, PermissionFlag};
pub use error::{PolicyError, PolicyResult};
pub use render::{HEADER, quote_string, render};
pub use rule::{Effect, LayerId, Matcher, Operation, Pattern, Rule, escape_pattern_literal};

/// Compile `ctx` against `registry` and render the result.
///
/// This is the whole pure half of a sandboxed run, used for previews and
/// `--dry-run`.
///
/// # Errors
///
/// Any [`PolicyError`] from compilation or rendering.
pub fn compile_and_render(ctx: &CompilationContext, registry: &LayerRegistry) -> PolicyResult<String> {
    render(&compile(ctx, registry)?)
}
