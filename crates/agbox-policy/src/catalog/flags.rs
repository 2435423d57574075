//! Flag grants: the only way past a sensitive-path denial.
//!
//! Every grant is read-only. Write access to credentials is never given.

use crate::catalog::{LayerBuilder, READ_ONLY, home_pattern};
use crate::context::{CompilationContext, PermissionFlag};
use crate::error::PolicyResult;
use crate::rule::{LayerId, Matcher, Rule};

/// Read-only grant for `flag`.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if home is unrepresentable.
pub fn rules(flag: PermissionFlag, ctx: &CompilationContext) -> PolicyResult<Vec<Rule>> {
    let home = ctx.home_dir();
    let mut layer = LayerBuilder::new(LayerId::FlagGrant(flag));
    match flag {
        PermissionFlag::AllowSshKeys => {
            layer.allow(READ_ONLY, Matcher::subpath(home.join(".ssh")))?;
        }
        PermissionFlag::AllowEnvRead => {
            layer
                .allow_each(
                    READ_ONLY,
                    [".env", ".envrc"].map(|f| Matcher::literal(home.join(f))),
                )?
                .allow(READ_ONLY, home_pattern(home, r"/\.env\..*$")?)?;
        }
        PermissionFlag::AllowAwsConfig => {
            layer.allow(READ_ONLY, Matcher::subpath(home.join(".aws")))?;
        }
        PermissionFlag::AllowCloudConfig => {
            layer.allow_each(
                READ_ONLY,
                [".azure", ".gcloud", ".config/gcloud", ".kube"]
                    .map(|d| Matcher::subpath(home.join(d))),
            )?;
        }
        PermissionFlag::AllowGpgKeys => {
            layer.allow(READ_ONLY, Matcher::subpath(home.join(".gnupg")))?;
        }
        PermissionFlag::AllowGitCredentials => {
            layer.allow_each(
                READ_ONLY,
                [".git-credentials", ".netrc"].map(|f| Matcher::literal(home.join(f))),
            )?;
        }
    }
    Ok(layer.finish())
}
