//! Workspace and user-supplied path grants.

use crate::catalog::{LayerBuilder, READ_ONLY, READ_WRITE};
use crate::context::{Access, CompilationContext};
use crate::error::PolicyResult;
use crate::rule::{LayerId, Matcher, Rule};

/// Allow read/write recursively under the workspace.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if the workspace path is
/// relative or unrepresentable.
pub fn workspace(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    let mut layer = LayerBuilder::new(LayerId::Workspace);
    layer.allow(READ_WRITE, Matcher::subpath(ctx.work_dir()))?;
    Ok(layer.finish())
}

/// Grant the context's extra paths, in the order given.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] for the first relative or
/// unrepresentable path.
pub fn user(ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    let mut layer = LayerBuilder::new(LayerId::UserGrant);
    for extra in ctx.extra_paths() {
        let operations = match extra.access {
            Access::ReadOnly => READ_ONLY,
            Access::ReadWrite => READ_WRITE,
        };
        layer.allow(operations, Matcher::subpath(&extra.path))?;
    }
    Ok(layer.finish())
}
