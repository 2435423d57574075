//! Per-invocation compilation context.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse widening dial for ambient tooling access.
///
/// Ordered from tightest to widest; every mode grants a superset of the
/// rules granted by the modes before it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Workspace, temp directories and the minimum to run.
    Strict,
    /// Strict plus read-only language toolchains.
    #[default]
    Balanced,
    /// Balanced plus writable caches and config.
    Permissive,
}

impl Mode {
    /// Every mode, tightest first.
    pub const ALL: [Self; 3] = [Self::Strict, Self::Balanced, Self::Permissive];

    /// The lowercase name used on the command line and in config files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Balanced => "balanced",
            Self::Permissive => "permissive",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid mode '{s}' (expected strict, balanced or permissive)"))
    }
}

/// Explicit opt-in that lifts one sensitive-path denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionFlag {
    /// Read `~/.ssh`, private keys included.
    AllowSshKeys,
    /// Read `~/.env`, `~/.envrc` and `~/.env.*`.
    AllowEnvRead,
    /// Read `~/.aws`.
    AllowAwsConfig,
    /// Read Azure, Google Cloud and Kubernetes credentials.
    AllowCloudConfig,
    /// Read `~/.gnupg`.
    AllowGpgKeys,
    /// Read `~/.git-credentials` and `~/.netrc`.
    AllowGitCredentials,
}

impl PermissionFlag {
    /// Every flag.
    pub const ALL: [Self; 6] = [
        Self::AllowSshKeys,
        Self::AllowEnvRead,
        Self::AllowAwsConfig,
        Self::AllowCloudConfig,
        Self::AllowGpgKeys,
        Self::AllowGitCredentials,
    ];

    /// The kebab-case name, matching the CLI switch without its dashes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllowSshKeys => "allow-ssh-keys",
            Self::AllowEnvRead => "allow-env-read",
            Self::AllowAwsConfig => "allow-aws-config",
            Self::AllowCloudConfig => "allow-cloud-config",
            Self::AllowGpgKeys => "allow-gpg-keys",
            Self::AllowGitCredentials => "allow-git-credentials",
        }
    }
}

impl fmt::Display for PermissionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| format!("unknown permission flag '{s}'"))
    }
}

/// Name of an agent whose configuration directories get a grant layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentTag(String);

impl AgentTag {
    /// Create a tag.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The tag as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access level for a user-granted extra path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    /// `file-read*` only.
    ReadOnly,
    /// `file-read*` and `file-write*`.
    ReadWrite,
}

/// A path the user granted beyond the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtraPath {
    /// The granted subtree.
    pub path: PathBuf,
    /// What the agent may do under it.
    pub access: Access,
}

impl ExtraPath {
    /// A read-only grant.
    #[must_use]
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            access: Access::ReadOnly,
        }
    }

    /// A read-write grant.
    #[must_use]
    pub fn read_write(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            access: Access::ReadWrite,
        }
    }
}

/// Everything the compiler needs to build one policy.
///
/// Built once per invocation with the `with_*` methods and never mutated
/// afterwards. Paths are not checked here; the layers that turn them into
/// rules reject relative or unrepresentable paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationContext {
    work_dir: PathBuf,
    home_dir: PathBuf,
    agent: Option<AgentTag>,
    mode: Mode,
    flags: BTreeSet<PermissionFlag>,
    ssh_agent_socket: Option<PathBuf>,
    extra_paths: Vec<ExtraPath>,
}

impl CompilationContext {
    /// Create a context with the default mode, no agent and no flags.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            home_dir: home_dir.into(),
            agent: None,
            mode: Mode::default(),
            flags: BTreeSet::new(),
            ssh_agent_socket: None,
            extra_paths: Vec::new(),
        }
    }

    /// Set the agent.
    #[must_use]
    pub fn with_agent(mut self, agent: Option<AgentTag>) -> Self {
        self.agent = agent;
        self
    }

    /// Set the security mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Add one permission flag.
    #[must_use]
    pub fn with_flag(mut self, flag: PermissionFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    /// Add several permission flags.
    #[must_use]
    pub fn with_flags(mut self, flags: impl IntoIterator<Item = PermissionFlag>) -> Self {
        self.flags.extend(flags);
        self
    }

    /// Set the SSH agent socket to keep reachable.
    #[must_use]
    pub fn with_ssh_agent_socket(mut self, socket: Option<PathBuf>) -> Self {
        self.ssh_agent_socket = socket;
        self
    }

    /// Add user-granted extra paths.
    #[must_use]
    pub fn with_extra_paths(mut self, paths: impl IntoIterator<Item = ExtraPath>) -> Self {
        self.extra_paths.extend(paths);
        self
    }

    /// The project workspace.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The user's home directory.
    #[must_use]
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// The agent, if one was requested or detected.
    #[must_use]
    pub fn agent(&self) -> Option<&AgentTag> {
        self.agent.as_ref()
    }

    /// The security mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The requested flags, in a stable order.
    #[must_use]
    pub fn flags(&self) -> &BTreeSet<PermissionFlag> {
        &self.flags
    }

    /// Whether `flag` was requested.
    #[must_use]
    pub fn has_flag(&self, flag: PermissionFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// The SSH agent socket, if any.
    #[must_use]
    pub fn ssh_agent_socket(&self) -> Option<&Path> {
        self.ssh_agent_socket.as_deref()
    }

    /// User-granted extra paths.
    #[must_use]
    pub fn extra_paths(&self) -> &[ExtraPath] {
        &self.extra_paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_and_order() {
        assert_eq!("strict".parse::<Mode>().unwrap(), Mode::Strict);
        assert_eq!("Permissive".parse::<Mode>().unwrap(), Mode::Permissive);
        assert!("lenient".parse::<Mode>().is_err());
        assert!(Mode::Strict < Mode::Balanced && Mode::Balanced < Mode::Permissive);
        assert_eq!(Mode::default(), Mode::Balanced);
    }

    #[test]
    fn test_flag_names_round_trip() {
        for flag in PermissionFlag::ALL {
            assert_eq!(flag.as_str().parse::<PermissionFlag>().unwrap(), flag);
        }
        let json = serde_json::to_string(&PermissionFlag::AllowSshKeys).unwrap();
        assert_eq!(json, "\"allow-ssh-keys\"");
    }

    #[test]
    fn test_context_builder() {
        let ctx = CompilationContext::new("/home/u/proj", "/home/u")
            .with_agent(Some(AgentTag::new("claude")))
            .with_mode(Mode::Strict)
            .with_flag(PermissionFlag::AllowEnvRead)
            .with_flags([PermissionFlag::AllowSshKeys, PermissionFlag::AllowEnvRead])
            .with_extra_paths([ExtraPath::read_only("/opt/data")]);

        assert_eq!(ctx.work_dir(), Path::new("/home/u/proj"));
        assert_eq!(ctx.agent().map(AgentTag::as_str), Some("claude"));
        assert_eq!(ctx.mode(), Mode::Strict);
        assert_eq!(ctx.flags().len(), 2);
        assert!(ctx.has_flag(PermissionFlag::AllowSshKeys));
        assert_eq!(ctx.extra_paths()[0].access, Access::ReadOnly);
    }
}
