//! Layered configuration for agbox.
//!
//! # Usage
//!
//! ```rust,no_run
//! use agbox_config::Config;
//!
//! # fn main() -> Result<(), agbox_config::ConfigError> {
//! let resolved = Config::load(Some(std::path::Path::new(".")))?;
//! println!("Mode: {}", resolved.config.sandbox.mode);
//! for notice in &resolved.notices {
//!     eprintln!("{notice}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Command line** (applied by the binary)
//! 2. **Environment variables** (`AGBOX_MODE`, `AGBOX_FACILITY`, `AGBOX_LOG`)
//! 3. **Workspace** (`{workspace}/.agbox/config.toml`), which can only *tighten*
//! 4. **User** (`~/.agbox/config.toml` or `$AGBOX_HOME/config.toml`)
//! 5. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! The workspace file sits inside the directory the sandboxed agent can
//! write to, so it may lower the mode but settings that would widen the
//! policy or redirect the log directory are ignored.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

mod merge;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use types::*;

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the merged
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None)
    }
}
