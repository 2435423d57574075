//! Policy error types.

use thiserror::Error;

use crate::context::PermissionFlag;

/// Errors raised while building rules, compiling or rendering a policy.
///
/// All of these are raised before any file is written, so a failed
/// compilation never leaves a partial profile behind.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A rule or matcher is structurally invalid.
    #[error("invalid rule: {reason}")]
    InvalidRule {
        /// Why the rule was rejected.
        reason: String,
    },

    /// An agent was explicitly requested but has no registered layer.
    #[error("unknown agent: {agent}")]
    UnknownAgent {
        /// The requested agent tag.
        agent: String,
    },

    /// A permission flag was requested but the registry has no layer for it.
    #[error("no grant layer registered for flag {flag}")]
    UnmappedFlag {
        /// The unmapped flag.
        flag: PermissionFlag,
    },

    /// A rule cannot be expressed in the enforcement facility's syntax.
    #[error("cannot render rule: {reason}")]
    Unrenderable {
        /// Why rendering failed.
        reason: String,
    },
}

impl PolicyError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            reason: reason.into(),
        }
    }
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
