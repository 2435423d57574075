//! Prelude module - commonly used types for convenient import.
//!
//! Use `use agbox_telemetry::prelude::*;` to import all essential types.

// Errors
pub use crate::{TelemetryError, TelemetryResult};

// Logging configuration
pub use crate::{LogConfig, LogFormat, LogTarget};

// Setup
pub use crate::setup_logging;
