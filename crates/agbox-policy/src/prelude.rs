//! Prelude module - commonly used types for convenient import.
//!
//! Use `use agbox_policy::prelude::*;` to import all essential types.

// Errors
pub use crate::{PolicyError, PolicyResult};

// Context
pub use crate::{Access, AgentTag, CompilationContext, ExtraPath, Mode, PermissionFlag};

// Rules and policies
pub use crate::{Effect, LayerId, Matcher, Operation, Policy, Rule};

// Catalog
pub use crate::{LayerBuilder, LayerRegistry};

// Compilation and rendering
pub use crate::{compile, compile_and_render, render};
