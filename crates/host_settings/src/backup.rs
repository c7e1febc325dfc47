use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use paths::ConfigFormat;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::errors::{SettingsError, SettingsResult};

/// Entire content of a legacy-format backup. Requested over the web, the file
/// stops executing before anything is emitted.
pub const LEGACY_BACKUP_STUB: &str = ";<?php exit; ?>\r\n";

/// Backs config files up before they are overwritten.
#[derive(Debug, Clone, Default)]
pub struct BackupManager<C = SystemClock> {
    clock: C,
}

impl BackupManager<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> BackupManager<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// First unused backup name for `path` in its own directory.
    ///
    /// `<YYYYMMDD>_old.<name>`, then `<YYYYMMDD>_0_old.<name>`,
    /// `<YYYYMMDD>_1_old.<name>`, ...; legacy `.ini` names get `.php` appended.
    /// Only probes the directory, never writes.
    pub fn backup_filename(&self, path: &Path) -> SettingsResult<String> {
        let base = file_name(path)?;
        let dir = parent_dir(path);
        Ok(paths::next_backup_name(base, self.clock.today(), |candidate| {
            dir.join(candidate).exists()
        }))
    }

    /// Back up `path` and return the backup's location.
    ///
    /// Primary-format files are copied byte for byte next to the original.
    /// Legacy files are never copied: the backup is a new file holding only
    /// [`LEGACY_BACKUP_STUB`], whatever the original contained. Either way the
    /// original stays in place until the caller overwrites it.
    pub fn backup(&self, path: &Path) -> SettingsResult<PathBuf> {
        if !path.exists() {
            return Err(SettingsError::NotFound(path.to_path_buf()));
        }
        let target = parent_dir(path).join(self.backup_filename(path)?);
        let failure = |source| SettingsError::BackupFailure {
            path: path.to_path_buf(),
            source,
        };

        match ConfigFormat::from_path(path) {
            ConfigFormat::Primary => {
                copy_new(path, &target).map_err(failure)?;
                info!(from = %path.display(), to = %target.display(), "config file backed up");
            }
            ConfigFormat::Legacy => {
                write_stub(&target).map_err(failure)?;
                info!(
                    original = %path.display(),
                    backup = %target.display(),
                    "legacy config backed up as guard stub"
                );
            }
        }
        Ok(target)
    }
}

// Never clobbers: the target is created with `create_new`.
fn copy_new(source: &Path, target: &Path) -> io::Result<()> {
    let mut from = File::open(source)?;
    let mut to = OpenOptions::new().write(true).create_new(true).open(target)?;
    io::copy(&mut from, &mut to)?;
    to.set_permissions(from.metadata()?.permissions())?;
    to.sync_all()
}

fn write_stub(target: &Path) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).create_new(true).open(target)?;
    f.write_all(LEGACY_BACKUP_STUB.as_bytes())?;
    f.sync_all()?;
    debug!(path = %target.display(), "guard stub written");
    Ok(())
}

fn file_name(path: &Path) -> SettingsResult<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SettingsError::InvalidPath(path.to_path_buf()))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
