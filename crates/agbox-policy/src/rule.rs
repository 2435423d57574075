//! Typed access-control rules.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::PermissionFlag;
use crate::error::{PolicyError, PolicyResult};

/// Whether a rule grants or refuses the operations it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant the operations.
    Allow,
    /// Refuse the operations.
    Deny,
}

impl Effect {
    /// The SBPL keyword for this effect.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

/// A capability axis the enforcement facility can gate.
///
/// Variants are declared in rendering order so that an operation set always
/// renders the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// `file-read*`: every read, including metadata.
    FileRead,
    /// `file-read-metadata`: stat and path traversal only.
    FileReadMetadata,
    /// `file-write*`: create, modify, unlink, rename.
    FileWrite,
    /// `file-ioctl`.
    FileIoctl,
    /// `file-map-executable`: mapping libraries and binaries.
    FileMapExecutable,
    /// `process-exec`.
    ProcessExec,
    /// `process-fork`.
    ProcessFork,
    /// `process-info*`.
    ProcessInfo,
    /// `signal`.
    Signal,
    /// `network*`.
    Network,
    /// `sysctl-read`.
    SysctlRead,
    /// `mach-lookup`.
    MachLookup,
    /// `ipc-posix*`.
    IpcPosix,
    /// `iokit-open`.
    IokitOpen,
    /// `pseudo-tty`.
    PseudoTty,
    /// `system-socket`.
    SystemSocket,
    /// `user-preference-read`.
    UserPreferenceRead,
}

impl Operation {
    /// The SBPL operation name.
    #[must_use]
    pub fn sbpl_name(self) -> &'static str {
        match self {
            Self::FileRead => "file-read*",
            Self::FileReadMetadata => "file-read-metadata",
            Self::FileWrite => "file-write*",
            Self::FileIoctl => "file-ioctl",
            Self::FileMapExecutable => "file-map-executable",
            Self::ProcessExec => "process-exec",
            Self::ProcessFork => "process-fork",
            Self::ProcessInfo => "process-info*",
            Self::Signal => "signal",
            Self::Network => "network*",
            Self::SysctlRead => "sysctl-read",
            Self::MachLookup => "mach-lookup",
            Self::IpcPosix => "ipc-posix*",
            Self::IokitOpen => "iokit-open",
            Self::PseudoTty => "pseudo-tty",
            Self::SystemSocket => "system-socket",
            Self::UserPreferenceRead => "user-preference-read",
        }
    }

    /// Whether a rule for this operation may carry a path filter.
    #[must_use]
    pub fn accepts_path_filter(self) -> bool {
        matches!(
            self,
            Self::FileRead
                | Self::FileReadMetadata
                | Self::FileWrite
                | Self::FileIoctl
                | Self::FileMapExecutable
                | Self::ProcessExec
        )
    }

    /// Whether granting or denying `self` also decides `other`.
    ///
    /// `file-read*` is a wildcard over every read operation, metadata included.
    #[must_use]
    pub fn covers(self, other: Self) -> bool {
        self == other || (self == Self::FileRead && other == Self::FileReadMetadata)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sbpl_name())
    }
}

/// A regular expression over absolute path strings.
///
/// Only constructible through [`Pattern::new`], which rejects anything that
/// cannot be embedded in a `#"..."` literal.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile and validate a path pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRule`] if the pattern is empty, contains a
    /// double quote or a control character, or does not compile.
    pub fn new(pattern: &str) -> PolicyResult<Self> {
        if pattern.is_empty() {
            return Err(PolicyError::invalid("empty path pattern"));
        }
        if pattern.contains('"') {
            return Err(PolicyError::invalid(format!(
                "path pattern {pattern:?} contains a double quote"
            )));
        }
        if pattern.chars().any(char::is_control) {
            return Err(PolicyError::invalid(format!(
                "path pattern {pattern:?} contains a control character"
            )));
        }
        Regex::new(pattern)
            .map(Self)
            .map_err(|e| PolicyError::invalid(format!("path pattern {pattern:?}: {e}")))
    }

    /// The pattern source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether `path` satisfies the pattern.
    #[must_use]
    pub fn is_match(&self, path: &Path) -> bool {
        path.to_str().is_some_and(|p| self.0.is_match(p))
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

/// Which paths a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Exactly one path.
    Literal(PathBuf),
    /// A path and everything beneath it.
    Subpath(PathBuf),
    /// Any path whose string form matches the pattern.
    Pattern(Pattern),
    /// No path filter: the rule applies to the operation as a whole.
    Global,
}

impl Matcher {
    /// Match exactly `path`.
    #[must_use]
    pub fn literal(path: impl Into<PathBuf>) -> Self {
        Self::Literal(path.into())
    }

    /// Match `path` and its descendants.
    #[must_use]
    pub fn subpath(path: impl Into<PathBuf>) -> Self {
        Self::Subpath(path.into())
    }

    /// Match paths against a regular expression.
    ///
    /// # Errors
    ///
    /// See [`Pattern::new`].
    pub fn pattern(pattern: &str) -> PolicyResult<Self> {
        Pattern::new(pattern).map(Self::Pattern)
    }

    /// Whether this matcher selects `path`.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Literal(p) => path == p,
            Self::Subpath(p) => path.starts_with(p),
            Self::Pattern(pattern) => pattern.is_match(path),
            Self::Global => true,
        }
    }

    /// Whether the matcher filters on a path at all.
    #[must_use]
    pub fn is_path_filter(&self) -> bool {
        !matches!(self, Self::Global)
    }

    fn validate(&self) -> PolicyResult<()> {
        match self {
            Self::Literal(path) | Self::Subpath(path) => validate_path(path),
            Self::Pattern(_) | Self::Global => Ok(()),
        }
    }
}

fn validate_path(path: &Path) -> PolicyResult<()> {
    let Some(text) = path.to_str() else {
        return Err(PolicyError::invalid(format!(
            "path {} is not valid UTF-8",
            path.display()
        )));
    };
    if !path.is_absolute() {
        return Err(PolicyError::invalid(format!("path {text:?} is not absolute")));
    }
    if text.chars().any(char::is_control) {
        return Err(PolicyError::invalid(format!(
            "path {text:?} contains a control character"
        )));
    }
    Ok(())
}

/// Escape a literal string so it can be spliced into a path pattern.
///
/// Only the POSIX extended-regex metacharacters are escaped, since the
/// enforcement facility's dialect has no meaning for escapes like `\-`.
/// A `"` is left as is and later rejected by [`Pattern::new`]; there is no
/// way to escape it inside a `#"..."` literal.
#[must_use]
pub fn escape_pattern_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '.' | '[' | ']' | '(' | ')' | '*' | '+' | '?' | '{' | '}' | '|' | '^' | '$' | '\\'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Identifies the catalog layer that produced a rule.
///
/// The declaration order is the compiler's precedence order: rules from a
/// later layer override equally specific rules from an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerId {
    /// Process and system operations every program needs.
    Baseline,
    /// Credentials, keys and secrets.
    SensitiveDenial,
    /// Every dot-entry directly under home.
    DotfileDenial,
    /// Known-benign dotfiles, read-only.
    DotfileAllowlist,
    /// The project workspace.
    Workspace,
    /// The detected agent's own configuration.
    Agent,
    /// Widening driven by the security mode.
    ModeRelaxation,
    /// Extra paths the user granted explicitly.
    UserGrant,
    /// The sensitive denials again, after every widening layer.
    SensitiveSeal,
    /// An opt-in permission flag.
    FlagGrant(PermissionFlag),
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => f.write_str("baseline"),
            Self::SensitiveDenial => f.write_str("sensitive-path denial"),
            Self::DotfileDenial => f.write_str("dotfile denial"),
            Self::DotfileAllowlist => f.write_str("dotfile allowlist"),
            Self::Workspace => f.write_str("workspace grant"),
            Self::Agent => f.write_str("agent grant"),
            Self::ModeRelaxation => f.write_str("mode relaxation"),
            Self::UserGrant => f.write_str("user grant"),
            Self::SensitiveSeal => f.write_str("sensitive-path seal"),
            Self::FlagGrant(flag) => write!(f, "flag grant: {flag}"),
        }
    }
}

/// One validated access-control rule.
///
/// Immutable after construction; fields are only exposed through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    effect: Effect,
    operations: BTreeSet<Operation>,
    matcher: Matcher,
    layer: LayerId,
}

impl Rule {
    /// Build and validate a rule.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRule`] if `operations` is empty, if a path
    /// is relative, non-UTF-8 or contains control characters, or if a path
    /// filter is combined with an operation that cannot take one.
    pub fn new(
        effect: Effect,
        operations: impl IntoIterator<Item = Operation>,
        matcher: Matcher,
        layer: LayerId,
    ) -> PolicyResult<Self> {
        let operations: BTreeSet<Operation> = operations.into_iter().collect();
        if operations.is_empty() {
            return Err(PolicyError::invalid("rule has no operations"));
        }
        matcher.validate()?;
        if matcher.is_path_filter() {
            if let Some(op) = operations.iter().find(|op| !op.accepts_path_filter()) {
                return Err(PolicyError::invalid(format!(
                    "operation {op} cannot be filtered by path"
                )));
            }
        }
        Ok(Self {
            effect,
            operations,
            matcher,
            layer,
        })
    }

    /// Allow or deny.
    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// The covered operations, in rendering order.
    #[must_use]
    pub fn operations(&self) -> &BTreeSet<Operation> {
        &self.operations
    }

    /// The path matcher.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The producing layer.
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Whether this rule decides `operation` on `path`.
    #[must_use]
    pub fn applies_to(&self, operation: Operation, path: &Path) -> bool {
        self.operations.iter().any(|op| op.covers(operation)) && self.matcher.matches(path)
    }
}
