//! Policy compiler: concatenates catalog layers in precedence order.

use std::path::Path;

use tracing::{debug, warn};

use crate::catalog::{LayerRegistry, baseline, dotfiles, grants, modes, sensitive};
use crate::context::CompilationContext;
use crate::error::{PolicyError, PolicyResult};
use crate::rule::{Effect, LayerId, Operation, Rule};

/// The ordered rule list compiled for one context.
///
/// Evaluation is last-match-wins with a default of deny, the same way the
/// enforcement facility evaluates the rendered profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    rules: Vec<Rule>,
}

impl Policy {
    /// Wrap an already ordered rule list.
    #[must_use]
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The rules, in declared order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The last rule deciding `operation` on `path`, if any.
    #[must_use]
    pub fn deciding_rule(&self, operation: Operation, path: &Path) -> Option<&Rule> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.applies_to(operation, path))
    }

    /// The effective decision for `operation` on `path`.
    #[must_use]
    pub fn decide(&self, operation: Operation, path: &Path) -> Effect {
        self.deciding_rule(operation, path)
            .map_or(Effect::Deny, Rule::effect)
    }

    /// Shorthand for `decide(..) == Effect::Allow`.
    #[must_use]
    pub fn allows(&self, operation: Operation, path: &Path) -> bool {
        self.decide(operation, path) == Effect::Allow
    }
}

/// Compiles contexts against one layer registry.
#[derive(Debug, Clone, Copy)]
pub struct PolicyCompiler<'a> {
    registry: &'a LayerRegistry,
}

impl<'a> PolicyCompiler<'a> {
    /// Create a compiler over `registry`.
    #[must_use]
    pub fn new(registry: &'a LayerRegistry) -> Self {
        Self { registry }
    }

    /// Compile `ctx` into a policy.
    ///
    /// The agent and every flag are resolved before any layer runs, so an
    /// unknown agent or unmapped flag fails without partial output.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::UnknownAgent`] if the context names an agent the
    ///   registry does not know.
    /// - [`PolicyError::UnmappedFlag`] if a requested flag has no layer.
    /// - [`PolicyError::InvalidRule`] if any layer produces an invalid rule or
    ///   stamps a rule with another layer's id.
    pub fn compile(&self, ctx: &CompilationContext) -> PolicyResult<Policy> {
        let agent_layer = ctx
            .agent()
            .map(|agent| {
                self.registry
                    .agent(agent)
                    .ok_or_else(|| PolicyError::UnknownAgent {
                        agent: agent.to_string(),
                    })
            })
            .transpose()?;
        let flag_layers = ctx
            .flags()
            .iter()
            .map(|&flag| {
                self.registry
                    .flag(flag)
                    .map(|layer| (flag, layer))
                    .ok_or(PolicyError::UnmappedFlag { flag })
            })
            .collect::<PolicyResult<Vec<_>>>()?;

        if ctx.home_dir().starts_with(ctx.work_dir()) {
            warn!(
                work_dir = %ctx.work_dir().display(),
                "Workspace contains the home directory; only sensitive paths stay protected"
            );
        }

        let mut rules = Vec::new();
        append(&mut rules, LayerId::Baseline, baseline::rules(ctx)?)?;
        append(
            &mut rules,
            LayerId::SensitiveDenial,
            sensitive::rules(ctx, LayerId::SensitiveDenial)?,
        )?;
        append(&mut rules, LayerId::DotfileDenial, dotfiles::denial(ctx)?)?;
        append(&mut rules, LayerId::DotfileAllowlist, dotfiles::allowlist(ctx)?)?;
        append(&mut rules, LayerId::Workspace, grants::workspace(ctx)?)?;
        if let Some(layer) = agent_layer {
            append(&mut rules, LayerId::Agent, layer(ctx)?)?;
        }
        append(&mut rules, LayerId::ModeRelaxation, modes::rules(ctx)?)?;
        append(&mut rules, LayerId::UserGrant, grants::user(ctx)?)?;
        append(
            &mut rules,
            LayerId::SensitiveSeal,
            sensitive::rules(ctx, LayerId::SensitiveSeal)?,
        )?;
        for (flag, layer) in flag_layers {
            append(&mut rules, LayerId::FlagGrant(flag), layer(ctx)?)?;
        }

        debug!(
            mode = %ctx.mode(),
            agent = ?ctx.agent().map(|a| a.as_str()),
            rules = rules.len(),
            "Compiled sandbox policy"
        );
        Ok(Policy { rules })
    }
}

/// Compile `ctx` against `registry`.
///
/// # Errors
///
/// See [`PolicyCompiler::compile`].
pub fn compile(ctx: &CompilationContext, registry: &LayerRegistry) -> PolicyResult<Policy> {
    PolicyCompiler::new(registry).compile(ctx)
}

fn append(rules: &mut Vec<Rule>, expected: LayerId, layer: Vec<Rule>) -> PolicyResult<()> {
    if let Some(rule) = layer.iter().find(|rule| rule.layer() != expected) {
        return Err(PolicyError::invalid(format!(
            "rule tagged '{}' emitted by the {expected} layer",
            rule.layer()
        )));
    }
    debug!(layer = %expected, rules = layer.len(), "Appending policy layer");
    rules.extend(layer);
    Ok(())
}
