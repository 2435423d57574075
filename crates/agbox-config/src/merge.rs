//! Layer merging and workspace restriction.

use agbox_policy::Mode;

/// Workspace fields that are dropped outright: each would widen the policy
/// or make the unsandboxed launcher write somewhere the agent chose.
const WORKSPACE_BLOCKED: &[&[&str]] = &[
    &["sandbox", "flags"],
    &["sandbox", "read_paths"],
    &["sandbox", "write_paths"],
    &["sandbox", "facility"],
    &["logging", "directory"],
];

/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
pub(crate) fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Strip everything from a workspace overlay that could loosen the policy.
///
/// `baseline` is the merged config before the workspace layer. The overlay
/// may lower the mode; a wider mode is reverted to the baseline mode.
///
/// Returns one message per ignored setting. Loading happens before logging
/// is configured, so reporting them is left to the caller.
pub(crate) fn restrict_workspace(
    overlay: &mut toml::Value,
    baseline: &toml::Value,
) -> Vec<String> {
    let mut notices = Vec::new();
    for path in WORKSPACE_BLOCKED {
        if remove_nested(overlay, path).is_some() {
            notices.push(format!(
                "workspace config cannot set {}; ignoring it",
                path.join(".")
            ));
        }
    }

    let path = ["sandbox", "mode"];
    let base_mode = get_nested(baseline, &path)
        .and_then(toml::Value::as_str)
        .and_then(|s| s.parse::<Mode>().ok());
    let ws_raw = get_nested(overlay, &path)
        .and_then(toml::Value::as_str)
        .map(str::to_owned);
    if let (Some(base), Some(raw)) = (base_mode, ws_raw)
        && let Ok(ws) = raw.parse::<Mode>()
        && ws > base
    {
        notices.push(format!(
            "workspace config cannot widen sandbox.mode from \"{base}\" to \"{ws}\"; \
             keeping \"{base}\""
        ));
        set_nested(overlay, &path, toml::Value::String(base.as_str().to_owned()));
    }
    notices
}

/// Get a value at a nested path.
pub(crate) fn get_nested<'a>(val: &'a toml::Value, path: &[&str]) -> Option<&'a toml::Value> {
    let mut current = val;
    for segment in path {
        current = current.as_table()?.get(*segment)?;
    }
    Some(current)
}

/// Set a value at a nested path, creating intermediate tables as needed.
pub(crate) fn set_nested(val: &mut toml::Value, path: &[&str], new_val: toml::Value) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };
    let mut current = val;
    for segment in parents {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry((*segment).to_owned())
            .or_insert(toml::Value::Table(toml::Table::new()));
    }
    if let Some(table) = current.as_table_mut() {
        table.insert((*leaf).to_owned(), new_val);
    }
}

/// Remove and return the value at a nested path.
fn remove_nested(val: &mut toml::Value, path: &[&str]) -> Option<toml::Value> {
    let (leaf, parents) = path.split_last()?;
    let mut current = val;
    for segment in parents {
        current = current.as_table_mut()?.get_mut(*segment)?;
    }
    current.as_table_mut()?.remove(*leaf)
}
