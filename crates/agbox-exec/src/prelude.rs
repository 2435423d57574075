//! Prelude module - commonly used types for convenient import.
//!
//! Use `use agbox_exec::prelude::*;` to import all essential types.

pub use crate::{ChildExit, ExecError, ExecResult, Phase, RunError, RunFailure};
pub use crate::{RelaySignal, SignalRelay, Supervisor, SupervisorConfig};
pub use crate::run_sandboxed;
