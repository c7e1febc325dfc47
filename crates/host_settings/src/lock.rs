use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::errors::SettingsResult;

/// Exclusive advisory lock on a config directory, released on drop.
///
/// Distribution itself never locks; callers that may run concurrently hold
/// one of these for the duration of a run.
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    pub const FILE_NAME: &'static str = ".settings.lock";

    /// Block until the lock is held.
    pub fn acquire(directory: &Path) -> SettingsResult<Self> {
        let (file, path) = open_lock_file(directory)?;
        FileExt::lock_exclusive(&file)?;
        debug!(path = %path.display(), "directory lock acquired");
        Ok(Self { file, path })
    }

    /// `None` when another holder has the lock.
    pub fn try_acquire(directory: &Path) -> SettingsResult<Option<Self>> {
        let (file, path) = open_lock_file(directory)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "directory lock released");
    }
}

fn open_lock_file(directory: &Path) -> SettingsResult<(File, PathBuf)> {
    let path = directory.join(DirectoryLock::FILE_NAME);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_is_contended_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let held = DirectoryLock::acquire(dir.path()).unwrap();
        assert!(held.path().ends_with(DirectoryLock::FILE_NAME));
        assert!(DirectoryLock::try_acquire(dir.path()).unwrap().is_none());
        drop(held);
        assert!(DirectoryLock::try_acquire(dir.path()).unwrap().is_some());
    }
}
