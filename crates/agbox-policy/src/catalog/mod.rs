//! The rule layer catalog.
//!
//! Every layer is a function from a [`CompilationContext`] to an ordered
//! list of [`Rule`]s. The fixed layers (baseline, sensitive paths, dotfiles,
//! workspace, modes, user grants) are plain functions in the submodules.
//! Agent and flag layers are looked up in a [`LayerRegistry`] value so that
//! callers can add agents or replace grants without touching the compiler.

pub mod agents;
pub mod baseline;
pub mod dotfiles;
pub mod flags;
pub mod grants;
pub mod modes;
pub mod sensitive;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::context::{AgentTag, CompilationContext, PermissionFlag};
use crate::error::{PolicyError, PolicyResult};
use crate::rule::{Effect, LayerId, Matcher, Operation, Rule, escape_pattern_literal};

/// Read and write: the pair almost every path grant or denial uses.
pub const READ_WRITE: &[Operation] = &[Operation::FileRead, Operation::FileWrite];

/// Read only.
pub const READ_ONLY: &[Operation] = &[Operation::FileRead];

/// Write only.
pub const WRITE_ONLY: &[Operation] = &[Operation::FileWrite];

/// Signature shared by every registered layer.
pub type LayerFn = Arc<dyn Fn(&CompilationContext) -> PolicyResult<Vec<Rule>> + Send + Sync>;

/// Accumulates the rules of one layer, stamping each with the layer id.
#[derive(Debug)]
pub struct LayerBuilder {
    layer: LayerId,
    rules: Vec<Rule>,
}

impl LayerBuilder {
    /// Start an empty layer.
    #[must_use]
    pub fn new(layer: LayerId) -> Self {
        Self {
            layer,
            rules: Vec::new(),
        }
    }

    /// Append an allow rule.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRule`] if the rule does not validate.
    pub fn allow(&mut self, operations: &[Operation], matcher: Matcher) -> PolicyResult<&mut Self> {
        self.push(Effect::Allow, operations, matcher)
    }

    /// Append a deny rule.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRule`] if the rule does not validate.
    pub fn deny(&mut self, operations: &[Operation], matcher: Matcher) -> PolicyResult<&mut Self> {
        self.push(Effect::Deny, operations, matcher)
    }

    /// Append one allow rule per matcher.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRule`] on the first rule that does not validate.
    pub fn allow_each(
        &mut self,
        operations: &[Operation],
        matchers: impl IntoIterator<Item = Matcher>,
    ) -> PolicyResult<&mut Self> {
        for matcher in matchers {
            self.allow(operations, matcher)?;
        }
        Ok(self)
    }

    /// Append one deny rule per matcher.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRule`] on the first rule that does not validate.
    pub fn deny_each(
        &mut self,
        operations: &[Operation],
        matchers: impl IntoIterator<Item = Matcher>,
    ) -> PolicyResult<&mut Self> {
        for matcher in matchers {
            self.deny(operations, matcher)?;
        }
        Ok(self)
    }

    /// The finished rule list.
    #[must_use]
    pub fn finish(self) -> Vec<Rule> {
        self.rules
    }

    fn push(
        &mut self,
        effect: Effect,
        operations: &[Operation],
        matcher: Matcher,
    ) -> PolicyResult<&mut Self> {
        self.rules.push(Rule::new(
            effect,
            operations.iter().copied(),
            matcher,
            self.layer,
        )?);
        Ok(self)
    }
}

/// Build a pattern anchored at `home`, followed by the raw regex `suffix`.
///
/// Patterns are rendered as `#"..."` literals, which have no escape for a
/// double quote, so a home directory containing `"` cannot be expressed.
/// Literal subpaths do not have this limit.
///
/// # Errors
///
/// Returns [`PolicyError::InvalidRule`] if `home` is not UTF-8, contains a
/// double quote, or the resulting pattern is otherwise invalid.
pub fn home_pattern(home: &Path, suffix: &str) -> PolicyResult<Matcher> {
    let home = home.to_str().ok_or_else(|| {
        PolicyError::invalid(format!("home directory {} is not valid UTF-8", home.display()))
    })?;
    if home.contains('"') {
        return Err(PolicyError::invalid(format!(
            "home directory {home:?} contains a double quote, which path patterns cannot express"
        )));
    }
    Matcher::pattern(&format!(
        "^{}{suffix}",
        escape_pattern_literal(home.trim_end_matches('/'))
    ))
}

/// Registered agent and flag layers.
///
/// [`LayerRegistry::builtin`] holds the stock catalog. Tests and embedders
/// start from it (or from [`LayerRegistry::empty`]) and register their own
/// layers by value; nothing here is process-wide.
#[derive(Clone)]
pub struct LayerRegistry {
    agents: BTreeMap<AgentTag, LayerFn>,
    flags: BTreeMap<PermissionFlag, LayerFn>,
}

impl LayerRegistry {
    /// A registry with no agent or flag layers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            agents: BTreeMap::new(),
            flags: BTreeMap::new(),
        }
    }

    /// The stock catalog: every built-in agent and every flag.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (name, layer) in agents::builtin() {
            registry = registry.with_agent(name, layer);
        }
        for flag in PermissionFlag::ALL {
            registry = registry.with_flag(flag, move |ctx| flags::rules(flag, ctx));
        }
        registry
    }

    /// Register (or replace) an agent layer.
    #[must_use]
    pub fn with_agent<F>(mut self, tag: impl Into<String>, layer: F) -> Self
    where
        F: Fn(&CompilationContext) -> PolicyResult<Vec<Rule>> + Send + Sync + 'static,
    {
        self.agents.insert(AgentTag::new(tag), Arc::new(layer));
        self
    }

    /// Register (or replace) the grant layer for a flag.
    #[must_use]
    pub fn with_flag<F>(mut self, flag: PermissionFlag, layer: F) -> Self
    where
        F: Fn(&CompilationContext) -> PolicyResult<Vec<Rule>> + Send + Sync + 'static,
    {
        self.flags.insert(flag, Arc::new(layer));
        self
    }

    /// The layer registered for `agent`.
    #[must_use]
    pub fn agent(&self, agent: &AgentTag) -> Option<&LayerFn> {
        self.agents.get(agent)
    }

    /// The layer registered for `flag`.
    #[must_use]
    pub fn flag(&self, flag: PermissionFlag) -> Option<&LayerFn> {
        self.flags.get(&flag)
    }

    /// Whether `name` is a registered agent.
    #[must_use]
    pub fn knows_agent(&self, name: &str) -> bool {
        self.agents.contains_key(&AgentTag::new(name))
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .field("flags", &self.flags.keys().collect::<Vec<_>>())
            .finish()
    }
}
