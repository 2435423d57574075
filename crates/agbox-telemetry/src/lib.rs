//! agbox telemetry - logging setup for the agbox sandbox launcher.
//!
//! # Example
//!
//! ```rust,no_run
//! use agbox_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), agbox_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("agbox_exec=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("Sandbox starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
