//! Policy-level properties checked through `Policy::decide`.

use std::path::Path;

use agbox_policy::prelude::*;

const HOME: &str = "/home/u";
const WORK: &str = "/home/u/proj";

/// Sensitive sample paths and the flag that unlocks each.
const SENSITIVE: &[(&str, PermissionFlag)] = &[
    ("/home/u/.ssh/id_ed25519", PermissionFlag::AllowSshKeys),
    ("/home/u/.ssh/id_rsa", PermissionFlag::AllowSshKeys),
    ("/home/u/.env", PermissionFlag::AllowEnvRead),
    ("/home/u/.envrc", PermissionFlag::AllowEnvRead),
    ("/home/u/.env.production", PermissionFlag::AllowEnvRead),
    ("/home/u/.aws/credentials", PermissionFlag::AllowAwsConfig),
    ("/home/u/.azure/accessTokens.json", PermissionFlag::AllowCloudConfig),
    ("/home/u/.gcloud/key.json", PermissionFlag::AllowCloudConfig),
    ("/home/u/.config/gcloud/credentials.db", PermissionFlag::AllowCloudConfig),
    ("/home/u/.kube/config", PermissionFlag::AllowCloudConfig),
    ("/home/u/.gnupg/pubring.kbx", PermissionFlag::AllowGpgKeys),
    ("/home/u/.git-credentials", PermissionFlag::AllowGitCredentials),
    ("/home/u/.netrc", PermissionFlag::AllowGitCredentials),
];

fn base() -> CompilationContext {
    CompilationContext::new(WORK, HOME)
}

fn policy(ctx: &CompilationContext) -> Policy {
    compile(ctx, &LayerRegistry::builtin()).unwrap()
}

fn allows(policy: &Policy, op: Operation, path: &str) -> bool {
    policy.allows(op, Path::new(path))
}

#[test]
fn test_sensitive_paths_denied_without_flag() {
    for mode in Mode::ALL {
        for agent in [None, Some("claude"), Some("codex"), Some("gemini")] {
            let ctx = base()
                .with_mode(mode)
                .with_agent(agent.map(AgentTag::new))
                .with_extra_paths([ExtraPath::read_write(HOME)]);
            let policy = policy(&ctx);
            for (path, _) in SENSITIVE {
                assert!(
                    !allows(&policy, Operation::FileRead, path),
                    "{path} readable in {mode} with {agent:?}"
                );
                assert!(
                    !allows(&policy, Operation::FileWrite, path),
                    "{path} writable in {mode} with {agent:?}"
                );
            }
        }
    }
}

#[test]
fn test_flag_grants_exactly_its_paths() {
    for flag in PermissionFlag::ALL {
        let policy = policy(&base().with_flag(flag));
        for (path, owner) in SENSITIVE {
            assert_eq!(
                allows(&policy, Operation::FileRead, path),
                *owner == flag,
                "{path} with {flag}"
            );
            assert!(
                !allows(&policy, Operation::FileWrite, path),
                "{path} writable with {flag}"
            );
        }
    }
}

#[test]
fn test_flag_grant_follows_denial() {
    let policy = policy(&base().with_flag(PermissionFlag::AllowSshKeys));
    let key = Path::new("/home/u/.ssh/id_ed25519");
    let last_deny = policy
        .rules()
        .iter()
        .rposition(|r| r.effect() == Effect::Deny && r.applies_to(Operation::FileRead, key))
        .unwrap();
    let grant = policy
        .rules()
        .iter()
        .position(|r| r.layer() == LayerId::FlagGrant(PermissionFlag::AllowSshKeys))
        .unwrap();
    assert!(grant > last_deny);
    assert_eq!(
        policy.deciding_rule(Operation::FileRead, key).map(Rule::layer),
        Some(LayerId::FlagGrant(PermissionFlag::AllowSshKeys))
    );
}

#[test]
fn test_modes_are_monotonic() {
    let samples = [
        "/home/u/proj/src/main.rs",
        "/tmp/build.log",
        "/private/var/folders/x/T/tmp.1",
        "/home/u/.cargo/bin/cargo",
        "/home/u/.cargo/registry/index/x",
        "/home/u/.pyenv/versions/3.12/lib/__pycache__/os.pyc",
        "/home/u/.cache/pip/wheels/a",
        "/home/u/.config/gh/hosts.yml",
        "/home/u/.npm/_cacache/x",
        "/home/u/Library/Caches/Homebrew/x",
        "/home/u/.zcompdump",
        "/home/u/Documents/taxes.pdf",
        "/home/u/.ssh/id_rsa",
    ];
    let policies: Vec<Policy> = Mode::ALL
        .into_iter()
        .map(|mode| policy(&base().with_mode(mode)))
        .collect();
    for pair in policies.windows(2) {
        for path in samples {
            for op in [Operation::FileRead, Operation::FileWrite] {
                if allows(&pair[0], op, path) {
                    assert!(allows(&pair[1], op, path), "{op} {path} lost when widening");
                }
            }
        }
    }
    // And the widening is real.
    assert!(!allows(&policies[0], Operation::FileRead, "/home/u/.cargo/bin/cargo"));
    assert!(allows(&policies[1], Operation::FileRead, "/home/u/.cargo/bin/cargo"));
    assert!(!allows(&policies[1], Operation::FileWrite, "/home/u/.cache/pip/wheels/a"));
    assert!(allows(&policies[2], Operation::FileWrite, "/home/u/.cache/pip/wheels/a"));
}

#[test]
fn test_compile_and_render_is_deterministic() {
    let registry = LayerRegistry::builtin();
    let a = base()
        .with_agent(Some(AgentTag::new("claude")))
        .with_flags([PermissionFlag::AllowGpgKeys, PermissionFlag::AllowAwsConfig]);
    let b = base()
        .with_agent(Some(AgentTag::new("claude")))
        .with_flags([PermissionFlag::AllowAwsConfig, PermissionFlag::AllowGpgKeys]);
    assert_eq!(compile(&a, &registry).unwrap(), compile(&b, &registry).unwrap());
    assert_eq!(
        compile_and_render(&a, &registry).unwrap(),
        compile_and_render(&a, &registry).unwrap()
    );
    assert_eq!(
        compile_and_render(&a, &registry).unwrap(),
        compile_and_render(&b, &registry).unwrap()
    );
}

#[test]
fn test_claude_balanced_scenario() {
    let ctx = base()
        .with_agent(Some(AgentTag::new("claude")))
        .with_mode(Mode::Balanced);
    let policy = policy(&ctx);

    assert!(allows(&policy, Operation::FileWrite, "/home/u/proj/README.md"));
    assert!(allows(&policy, Operation::FileRead, "/home/u/proj/.env"));
    assert!(allows(&policy, Operation::FileWrite, "/home/u/.claude/settings.json"));
    assert!(allows(&policy, Operation::FileWrite, "/home/u/.claude.json"));
    assert!(allows(&policy, Operation::FileRead, "/home/u/.zshrc"));
    assert!(!allows(&policy, Operation::FileWrite, "/home/u/.zshrc"));
    assert!(allows(&policy, Operation::FileRead, "/home/u/.ssh/known_hosts"));
    assert!(allows(&policy, Operation::FileRead, "/home/u/.ssh/id_ed25519.pub"));
    assert!(allows(&policy, Operation::FileRead, "/usr/bin/git"));
    assert!(allows(&policy, Operation::FileWrite, "/tmp/claude-1/x"));
    assert!(allows(&policy, Operation::FileRead, "/home/u/.cargo/bin/cargo"));
    assert!(allows(&policy, Operation::FileReadMetadata, "/home/u/Documents"));

    assert!(!allows(&policy, Operation::FileRead, "/home/u/.ssh/id_ed25519"));
    assert!(!allows(&policy, Operation::FileRead, "/home/u/.ssh"));
    assert!(!allows(&policy, Operation::FileRead, "/home/u/.docker/config.json"));
    assert!(!allows(&policy, Operation::FileRead, "/home/u/.codex/auth.json"));
    assert!(!allows(&policy, Operation::FileRead, "/home/u/Documents/taxes.pdf"));
    assert!(!allows(&policy, Operation::FileWrite, "/home/u/proj2/x"));
    assert!(!allows(&policy, Operation::FileWrite, "/usr/local/bin/x"));

    let with_keys = self::policy(&ctx.with_flag(PermissionFlag::AllowSshKeys));
    assert!(allows(&with_keys, Operation::FileRead, "/home/u/.ssh/id_ed25519"));
    assert!(!allows(&with_keys, Operation::FileWrite, "/home/u/.ssh/id_ed25519"));
    assert!(!allows(&with_keys, Operation::FileRead, "/home/u/.aws/credentials"));
}

#[test]
fn test_workspace_equal_to_home_keeps_secrets() {
    for mode in Mode::ALL {
        let policy = policy(&CompilationContext::new(HOME, HOME).with_mode(mode));
        assert!(allows(&policy, Operation::FileWrite, "/home/u/notes.txt"));
        assert!(allows(&policy, Operation::FileRead, "/home/u/.docker/config.json"));
        assert!(!allows(&policy, Operation::FileRead, "/home/u/.ssh/id_ed25519"));
        assert!(!allows(&policy, Operation::FileRead, "/home/u/.aws/credentials"));
        assert!(!allows(&policy, Operation::FileWrite, "/home/u/.env"));
    }
}

#[test]
fn test_registry_substitution_and_unknown_agent() {
    let registry = LayerRegistry::builtin().with_agent("aider", |ctx| {
        let mut layer = LayerBuilder::new(LayerId::Agent);
        layer.allow(
            &[Operation::FileRead, Operation::FileWrite],
            Matcher::literal(ctx.home_dir().join(".aider.conf.yml")),
        )?;
        Ok(layer.finish())
    });
    let ctx = base().with_agent(Some(AgentTag::new("aider")));
    let policy = compile(&ctx, &registry).unwrap();
    assert!(allows(&policy, Operation::FileWrite, "/home/u/.aider.conf.yml"));

    let err = compile(&ctx, &LayerRegistry::builtin()).unwrap_err();
    assert!(matches!(err, PolicyError::UnknownAgent { .. }));
}

#[test]
fn test_rendered_profile_order() {
    let ctx = base()
        .with_agent(Some(AgentTag::new("claude")))
        .with_flag(PermissionFlag::AllowSshKeys)
        .with_ssh_agent_socket(Some("/private/tmp/com.apple.launchd.x/Listeners".into()));
    let text = compile_and_render(&ctx, &LayerRegistry::builtin()).unwrap();

    assert!(text.starts_with("(version 1)\n(deny default)\n"));
    let position = |needle: &str| text.find(needle).unwrap();
    assert!(position(";; baseline") < position(";; sensitive-path denial"));
    assert!(position(";; sensitive-path denial") < position(";; dotfile denial"));
    assert!(position(";; workspace grant") < position(";; agent grant"));
    assert!(position(";; mode relaxation") < position(";; sensitive-path seal"));
    assert!(position(";; sensitive-path seal") < position(";; flag grant: allow-ssh-keys"));
    assert!(text.contains("(literal \"/private/tmp/com.apple.launchd.x/Listeners\")"));
    assert!(text.contains("(subpath \"/home/u/proj\")"));
}
