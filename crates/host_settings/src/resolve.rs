use std::path::{Path, PathBuf};

use paths::{ConfigFormat, host_config_file_name};
use tracing::debug;

use crate::codec;
use crate::errors::{SettingsError, SettingsResult};
use crate::tree::SettingsTree;

/// Load the settings that apply to `host`.
///
/// Reads `<host>[.<discriminator>].conf.php`, or the legacy `.conf.ini` when only
/// that one exists. A guard file is followed once to the canonical host's file.
pub fn resolve_host_config(
    directory: &Path,
    host: &str,
    discriminator: Option<&str>,
) -> SettingsResult<SettingsTree> {
    let path = existing_host_file(directory, host, discriminator).ok_or_else(|| {
        SettingsError::NotFound(primary_path(directory, host, discriminator))
    })?;
    let tree = codec::read_file(&path)?;
    follow_guard(&path, tree, &[discriminator])
}

/// Host file for `host` that is on disk, preferring the primary format.
pub fn existing_host_file(
    directory: &Path,
    host: &str,
    discriminator: Option<&str>,
) -> Option<PathBuf> {
    [ConfigFormat::Primary, ConfigFormat::Legacy]
        .into_iter()
        .map(|format| directory.join(host_config_file_name(host, discriminator, format)))
        .find(|path| path.exists())
}

/// Like [`resolve_host_config`] for an arbitrary config file whose host and
/// discriminator are unknown.
pub(crate) fn read_resolved(path: &Path) -> SettingsResult<SettingsTree> {
    let tree = codec::read_file(path)?;
    if tree.real_config().is_none() {
        return Ok(tree);
    }
    let candidates = discriminator_candidates(path);
    let candidates: Vec<Option<&str>> = candidates.iter().map(|d| d.as_deref()).collect();
    follow_guard(path, tree, &candidates)
}

/// Replace a guard tree read from `path` with the real tree it points at,
/// trying each discriminator in turn. Anything that is not a guard tree is
/// returned unchanged.
fn follow_guard(
    path: &Path,
    tree: SettingsTree,
    discriminators: &[Option<&str>],
) -> SettingsResult<SettingsTree> {
    let Some(canonical) = tree.real_config() else {
        return Ok(tree);
    };
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let real_path = discriminators
        .iter()
        .find_map(|d| existing_host_file(directory, canonical, *d))
        .ok_or_else(|| {
            let d = discriminators.first().copied().flatten();
            SettingsError::NotFound(primary_path(directory, canonical, d))
        })?;
    debug!(guard = %path.display(), real = %real_path.display(), "following guard file");

    let real = codec::read_file(&real_path)?;
    if real.real_config().is_some() {
        return Err(SettingsError::parse(
            real_path.display().to_string(),
            "guard file points at another guard file",
        ));
    }
    Ok(real)
}

fn primary_path(directory: &Path, host: &str, discriminator: Option<&str>) -> PathBuf {
    directory.join(host_config_file_name(host, discriminator, ConfigFormat::Primary))
}

/// Possible discriminators of a host file name, longest first.
///
/// Host names may contain dots themselves, so `a.b.c.conf.php` could be host
/// `a` with discriminator `b.c`, host `a.b` with `c`, or host `a.b.c` alone.
fn discriminator_candidates(path: &Path) -> Vec<Option<String>> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return vec![None];
    };
    let stem = name
        .strip_suffix(ConfigFormat::from_file_name(name).suffix())
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(name);

    let mut candidates: Vec<Option<String>> = stem
        .match_indices('.')
        .map(|(i, _)| &stem[i + 1..])
        .filter(|d| !d.is_empty())
        .map(|d| Some(d.to_string()))
        .collect();
    candidates.push(None);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real_tree() -> SettingsTree {
        let mut t = SettingsTree::new();
        t.set("foo", "one", "bar");
        t
    }

    #[test]
    fn discriminator_candidates_longest_first() {
        let c = discriminator_candidates(Path::new("/x/a.b.c.conf.php"));
        assert_eq!(
            c,
            vec![Some("b.c".to_string()), Some("c".to_string()), None]
        );
        assert_eq!(discriminator_candidates(Path::new("host.conf.ini")), vec![None]);
    }

    #[test]
    fn resolve_follows_guard_once() {
        let dir = tempfile::tempdir().unwrap();
        codec::write_file(&dir.path().join("admin.t.conf.php"), &SettingsTree::guard("real")).unwrap();
        codec::write_file(&dir.path().join("real.t.conf.php"), &real_tree()).unwrap();

        let tree = resolve_host_config(dir.path(), "admin", Some("t")).unwrap();
        assert_eq!(tree, real_tree());
        let tree = read_resolved(&dir.path().join("admin.t.conf.php")).unwrap();
        assert_eq!(tree, real_tree());
    }

    #[test]
    fn resolve_rejects_guard_chains() {
        let dir = tempfile::tempdir().unwrap();
        codec::write_file(&dir.path().join("a.conf.php"), &SettingsTree::guard("b")).unwrap();
        codec::write_file(&dir.path().join("b.conf.php"), &SettingsTree::guard("c")).unwrap();
        let err = resolve_host_config(dir.path(), "a", None).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn resolve_falls_back_to_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        codec::write_file(&dir.path().join("old.conf.ini"), &real_tree()).unwrap();
        assert_eq!(resolve_host_config(dir.path(), "old", None).unwrap(), real_tree());
    }

    #[test]
    fn resolve_missing_host() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_host_config(dir.path(), "nobody", None).unwrap_err();
        assert!(matches!(err, SettingsError::NotFound(_)));
    }
}
