//! SBPL renderer.
//!
//! Turns a [`Policy`] into the text `sandbox-exec -f` reads. Pure and
//! order-preserving: rules come out in declared order, and only
//! consecutive rules of one layer with the same effect and operations are
//! folded into a single form.

use crate::compiler::Policy;
use crate::error::{PolicyError, PolicyResult};
use crate::rule::{LayerId, Matcher, Pattern, Rule};

/// Profile preamble: dialect version and the default decision.
pub const HEADER: &str = "(version 1)\n(deny default)\n";

const FILTER_INDENT: &str = "    ";

/// Render `policy` as an SBPL profile.
///
/// # Errors
///
/// Returns [`PolicyError::Unrenderable`] if a pattern uses regex syntax the
/// facility does not understand.
pub fn render(policy: &Policy) -> PolicyResult<String> {
    let mut out = String::from(HEADER);
    let mut current_layer: Option<LayerId> = None;

    for group in groups(policy.rules()) {
        let Some(first) = group.first() else {
            continue;
        };
        if current_layer != Some(first.layer()) {
            out.push_str(&format!("\n;; {}\n", first.layer()));
            current_layer = Some(first.layer());
        }
        render_group(&mut out, group)?;
    }
    Ok(out)
}

/// Split rules into maximal runs sharing layer, effect and operations.
fn groups(rules: &[Rule]) -> Vec<&[Rule]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (index, pair) in rules.windows(2).enumerate() {
        if !same_form(&pair[0], &pair[1]) {
            let end = index.saturating_add(1);
            groups.push(&rules[start..end]);
            start = end;
        }
    }
    if start < rules.len() {
        groups.push(&rules[start..]);
    }
    groups
}

fn same_form(a: &Rule, b: &Rule) -> bool {
    a.layer() == b.layer()
        && a.effect() == b.effect()
        && a.operations() == b.operations()
        && a.matcher().is_path_filter()
        && b.matcher().is_path_filter()
}

fn render_group(out: &mut String, group: &[Rule]) -> PolicyResult<()> {
    let Some(first) = group.first() else {
        return Ok(());
    };
    out.push('(');
    out.push_str(first.effect().keyword());
    for op in first.operations() {
        out.push(' ');
        out.push_str(op.sbpl_name());
    }
    for rule in group {
        if let Some(filter) = render_filter(rule.matcher())? {
            out.push('\n');
            out.push_str(FILTER_INDENT);
            out.push_str(&filter);
        }
    }
    out.push_str(")\n");
    Ok(())
}

fn render_filter(matcher: &Matcher) -> PolicyResult<Option<String>> {
    let filter = match matcher {
        Matcher::Literal(path) => format!("(literal {})", quote_path(path)?),
        Matcher::Subpath(path) => format!("(subpath {})", quote_path(path)?),
        Matcher::Pattern(pattern) => {
            check_dialect(pattern)?;
            format!("(regex #\"{}\")", pattern.as_str())
        }
        Matcher::Global => return Ok(None),
    };
    Ok(Some(filter))
}

fn quote_path(path: &std::path::Path) -> PolicyResult<String> {
    path.to_str().map(quote_string).ok_or_else(|| PolicyError::Unrenderable {
        reason: format!("path {} is not valid UTF-8", path.display()),
    })
}

/// Quote `text` as an SBPL string literal.
#[must_use]
pub fn quote_string(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len().saturating_add(2));
    quoted.push('"');
    for c in text.chars() {
        if matches!(c, '\\' | '"') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Reject regex syntax the facility's POSIX-style dialect lacks.
fn check_dialect(pattern: &Pattern) -> PolicyResult<()> {
    let mut chars = pattern.as_str().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next()
                    && matches!(
                        escaped,
                        'd' | 'D' | 'w' | 'W' | 's' | 'S' | 'b' | 'B' | 'p' | 'P' | 'A' | 'z'
                    )
                {
                    return Err(PolicyError::Unrenderable {
                        reason: format!(
                            "pattern {:?} uses the unsupported escape \\{escaped}",
                            pattern.as_str()
                        ),
                    });
                }
            }
            '(' if chars.peek() == Some(&'?') => {
                return Err(PolicyError::Unrenderable {
                    reason: format!(
                        "pattern {:?} uses an unsupported group modifier",
                        pattern.as_str()
                    ),
                });
            }
            _ => {}
        }
    }
    Ok(())
}
