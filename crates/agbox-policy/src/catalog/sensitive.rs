//! Sensitive-path denial: keys, cloud credentials and secrets under home.
//!
//! The same rules are emitted twice by the compiler: once as
//! [`LayerId::SensitiveDenial`] and once as [`LayerId::SensitiveSeal`] after
//! every widening layer, so only a flag grant can lift them.

use crate::catalog::{LayerBuilder, READ_ONLY, READ_WRITE, home_pattern};
use crate::context::CompilationContext;
use crate::error::PolicyResult;
use crate::rule::{LayerId, Matcher, Rule};

/// Credential directories, relative to home.
pub const SENSITIVE_DIRS: &[&str] = &[
    ".ssh",
    ".aws",
    ".azure",
    ".gcloud",
    ".config/gcloud",
    ".kube",
    ".gnupg",
];

/// Credential files, relative to home.
pub const SENSITIVE_FILES: &[&str] = &[".git-credentials", ".netrc", ".env", ".envrc"];

/// Patterns appended to the escaped home directory.
const SENSITIVE_PATTERNS: &[&str] = &[
    // Environment files.
    r"/\.env\..*$",
    // Private keys and certificates at the top of home.
    r"/[^/]*\.pem$",
    r"/[^/]*\.key$",
    r"/[^/]*\.p12$",
    r"/[^/]*\.pfx$",
    // SSH private keys anywhere under home.
    r"/.*_rsa$",
    r"/.*_dsa$",
    r"/.*_ecdsa$",
    r"/.*_ed25519$",
    // Credential, password, token and secret files.
    r"/[^/]*credentials$",
    r"/[^/]*password[^/]*$",
    r"/\..*credentials$",
    r"/\..*token$",
    r"/\..*secret$",
];

/// Non-secret SSH files ssh and git read on every connection.
const SSH_PUBLIC_FILES: &[&str] = &["config", "known_hosts", "known_hosts.old"];

/// Sensitive-path rules tagged with `layer`.
///
/// # Errors
///
/// Returns [`crate::PolicyError::InvalidRule`] if the home directory cannot
/// be turned into valid matchers.
pub fn rules(ctx: &CompilationContext, layer_id: LayerId) -> PolicyResult<Vec<Rule>> {
    let home = ctx.home_dir();
    let mut layer = LayerBuilder::new(layer_id);

    layer.deny_each(
        READ_WRITE,
        SENSITIVE_DIRS.iter().map(|d| Matcher::subpath(home.join(d))),
    )?;
    layer.deny_each(
        READ_WRITE,
        SENSITIVE_FILES.iter().map(|f| Matcher::literal(home.join(f))),
    )?;
    for suffix in SENSITIVE_PATTERNS {
        layer.deny(READ_WRITE, home_pattern(home, suffix)?)?;
    }

    // The directory itself and every private key stay denied.
    let ssh = home.join(".ssh");
    layer.allow_each(
        READ_ONLY,
        SSH_PUBLIC_FILES.iter().map(|f| Matcher::literal(ssh.join(f))),
    )?;
    layer.allow(READ_ONLY, home_pattern(home, r"/\.ssh/[^/]*\.pub$")?)?;

    Ok(layer.finish())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::rule::{Effect, Operation};

    fn last_effect(rules: &[Rule], op: Operation, path: &str) -> Option<Effect> {
        rules
            .iter()
            .rev()
            .find(|r| r.applies_to(op, Path::new(path)))
            .map(Rule::effect)
    }

    #[test]
    fn test_sensitive_paths_denied() {
        let ctx = CompilationContext::new("/home/u/proj", "/home/u");
        let rules = rules(&ctx, LayerId::SensitiveDenial).unwrap();
        for path in [
            "/home/u/.ssh",
            "/home/u/.ssh/id_ed25519",
            "/home/u/.aws/credentials",
            "/home/u/.config/gcloud/application_default_credentials.json",
            "/home/u/.gnupg/private-keys-v1.d/x.key",
            "/home/u/.env",
            "/home/u/.env.local",
            "/home/u/server.pem",
            "/home/u/backup/id_rsa",
            "/home/u/.npm-token",
            "/home/u/.git-credentials",
        ] {
            assert_eq!(
                last_effect(&rules, Operation::FileRead, path),
                Some(Effect::Deny),
                "{path}"
            );
        }
    }

    #[test]
    fn test_ssh_public_files_readable_not_writable() {
        let ctx = CompilationContext::new("/home/u/proj", "/home/u");
        let rules = rules(&ctx, LayerId::SensitiveDenial).unwrap();
        for path in ["/home/u/.ssh/known_hosts", "/home/u/.ssh/id_ed25519.pub"] {
            assert_eq!(
                last_effect(&rules, Operation::FileRead, path),
                Some(Effect::Allow),
                "{path}"
            );
            assert_eq!(
                last_effect(&rules, Operation::FileWrite, path),
                Some(Effect::Deny),
                "{path}"
            );
        }
    }

    #[test]
    fn test_rules_carry_requested_layer() {
        let ctx = CompilationContext::new("/w", "/home/u");
        let rules = rules(&ctx, LayerId::SensitiveSeal).unwrap();
        assert!(rules.iter().all(|r| r.layer() == LayerId::SensitiveSeal));
    }
}
