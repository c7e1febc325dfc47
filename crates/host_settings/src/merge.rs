use std::path::Path;

use tracing::debug;

use crate::errors::{SettingsError, SettingsResult};
use crate::resolve;
use crate::tree::SettingsTree;

/// Upgrade `current` onto the shape of `template`.
///
/// Every `(group, key)` of the template keeps the user's value when `current`
/// has one and the template's value otherwise. Groups and keys that only exist
/// in `current` are dropped; this is how deprecated settings disappear on
/// upgrade. Order follows the template.
pub fn merge(template: &SettingsTree, current: &SettingsTree) -> SettingsTree {
    let mut merged = SettingsTree::new();
    for (name, group) in template.groups() {
        let values = group.iter().map(|(key, default)| {
            let value = current.get(name, key).unwrap_or(default.as_str());
            (key.as_str(), value)
        });
        merged.set_bulk(name, values);
    }

    let dropped = current
        .entries()
        .filter(|(g, k, _)| !template.contains(g, k))
        .count();
    if dropped > 0 {
        debug!(dropped, "settings absent from template pruned during merge");
    }
    merged
}

/// [`merge`] with the template read from `template_path`.
///
/// A template that is only a guard file is followed to the real file it
/// points at.
pub fn merge_from_file(template_path: &Path, current: &SettingsTree) -> SettingsResult<SettingsTree> {
    if !template_path.exists() {
        return Err(SettingsError::NotFound(template_path.to_path_buf()));
    }
    let template = resolve::read_resolved(template_path)?;
    Ok(merge(&template, current))
}
