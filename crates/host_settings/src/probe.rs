use std::path::{Path, PathBuf};

/// Whether a config file could be written at `path`.
///
/// For an existing path this asks whether the process may write to it. For a
/// path that does not exist yet, the nearest existing ancestor directory has to
/// be writable, however many intermediate directories are still missing.
pub fn is_config_writable(path: &Path) -> bool {
    writable_with(path, can_write)
}

/// [`is_config_writable`] with the permission question answered by `can_write`.
fn writable_with(path: &Path, can_write: impl Fn(&Path) -> bool) -> bool {
    if path.exists() {
        return can_write(path);
    }
    match nearest_existing_ancestor(path) {
        Some(dir) if dir.is_dir() => can_write(&dir),
        _ => false,
    }
}

/// Closest ancestor of `path` that exists. Relative paths are resolved against
/// the current directory, so the walk always ends at the filesystem root.
pub fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    absolute
        .ancestors()
        .skip(1)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

#[cfg(unix)]
fn can_write(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn can_write(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}
