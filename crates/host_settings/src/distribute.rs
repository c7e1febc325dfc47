//! Fan a settings tree out to one file per distinct webpath host.
//!
//! The delivery host gets the real file holding the whole tree; every other
//! distinct host gets a guard file pointing at it. Writes are independent of
//! each other: one failing target does not stop the rest, and nothing already
//! written is rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use paths::{ConfigFormat, host_config_file_name};
use tracing::{debug, info, warn};

use crate::backup::BackupManager;
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::errors::{SettingsError, SettingsResult, TargetFailure};
use crate::orphans::find_other_config_files;
use crate::probe::is_config_writable;
use crate::tree::SettingsTree;
use crate::webpath::WebpathHosts;

#[derive(Debug, Clone)]
pub struct DistributionOptions {
    discriminator: Option<String>,
    backup_existing: bool,
    check_writable: bool,
}

impl Default for DistributionOptions {
    fn default() -> Self {
        Self {
            discriminator: None,
            backup_existing: true,
            check_writable: true,
        }
    }
}

impl DistributionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep this tree's files apart from other trees in the same directory.
    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    pub fn with_backup(mut self, backup_existing: bool) -> Self {
        self.backup_existing = backup_existing;
        self
    }

    /// Skip the per-target [`is_config_writable`] check when `false`.
    pub fn with_writability_check(mut self, check_writable: bool) -> Self {
        self.check_writable = check_writable;
        self
    }

    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    pub fn backup_existing(&self) -> bool {
        self.backup_existing
    }

    pub fn check_writable(&self) -> bool {
        self.check_writable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// Holds the full tree.
    Real,
    /// Holds only `realConfig = <canonical host>`.
    Guard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub host: String,
    pub path: PathBuf,
    pub role: FileRole,
}

/// What a successful distribution run did on disk.
#[derive(Debug, Clone, Default)]
pub struct DistributionReport {
    pub written: Vec<WrittenFile>,
    pub backups: Vec<PathBuf>,
    pub removed_orphans: Vec<PathBuf>,
    /// Orphans that were found but could not be deleted.
    pub orphans_left: Vec<PathBuf>,
}

impl DistributionReport {
    pub fn real_file(&self) -> Option<&WrittenFile> {
        self.written.iter().find(|f| f.role == FileRole::Real)
    }
}

#[derive(Debug)]
struct Target {
    host: String,
    path: PathBuf,
    role: FileRole,
}

#[derive(Debug, Clone, Default)]
pub struct HostFileDistributor<C = SystemClock> {
    backups: BackupManager<C>,
}

impl HostFileDistributor<SystemClock> {
    pub fn new() -> Self {
        Self {
            backups: BackupManager::new(),
        }
    }
}

impl<C: Clock> HostFileDistributor<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            backups: BackupManager::with_clock(clock),
        }
    }

    pub fn backups(&self) -> &BackupManager<C> {
        &self.backups
    }

    /// Write `tree` into `directory`, one file per distinct webpath host, then
    /// delete files of hosts that are no longer assigned.
    ///
    /// Fails with [`SettingsError::PartialDistributionFailure`] listing every
    /// target that could not be written; orphan cleanup only runs when all
    /// targets were written.
    pub fn distribute(
        &self,
        tree: &SettingsTree,
        directory: &Path,
        options: &DistributionOptions,
    ) -> SettingsResult<DistributionReport> {
        let hosts = WebpathHosts::from_tree(tree)?;
        let guard = SettingsTree::guard(hosts.canonical());
        let targets = plan_targets(&hosts, directory, options.discriminator());

        let mut report = DistributionReport::default();
        let mut failures = Vec::new();
        for target in targets {
            let content = match target.role {
                FileRole::Real => tree,
                FileRole::Guard => &guard,
            };
            match self.write_target(&target, content, options, &mut report) {
                Ok(()) => {
                    debug!(host = %target.host, path = %target.path.display(), role = ?target.role, "host file written");
                    report.written.push(WrittenFile {
                        host: target.host,
                        path: target.path,
                        role: target.role,
                    });
                }
                Err(error) => {
                    warn!(host = %target.host, path = %target.path.display(), %error, "host file not written");
                    failures.push(TargetFailure {
                        host: target.host,
                        path: target.path,
                        error,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(SettingsError::PartialDistributionFailure { failures });
        }

        self.retire_orphans(directory, options.discriminator(), &hosts, &mut report);
        info!(
            directory = %directory.display(),
            canonical = hosts.canonical(),
            files = report.written.len(),
            orphans_removed = report.removed_orphans.len(),
            "settings distributed"
        );
        Ok(report)
    }

    fn write_target(
        &self,
        target: &Target,
        content: &SettingsTree,
        options: &DistributionOptions,
        report: &mut DistributionReport,
    ) -> SettingsResult<()> {
        if options.check_writable() && !is_config_writable(&target.path) {
            return Err(SettingsError::NotWritable(target.path.clone()));
        }
        if options.backup_existing() && target.path.exists() {
            report.backups.push(self.backups.backup(&target.path)?);
        }
        codec::write_file(&target.path, content)
    }

    fn retire_orphans(
        &self,
        directory: &Path,
        discriminator: Option<&str>,
        hosts: &WebpathHosts,
        report: &mut DistributionReport,
    ) {
        let orphans = match find_other_config_files(directory, discriminator, hosts) {
            Ok(orphans) => orphans,
            Err(error) => {
                warn!(directory = %directory.display(), %error, "orphan scan failed");
                return;
            }
        };
        for name in orphans {
            let path = directory.join(&name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "orphaned host file removed");
                    report.removed_orphans.push(path);
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "orphaned host file could not be removed");
                    report.orphans_left.push(path);
                }
            }
        }
    }
}

/// One target per distinct host. A host whose only existing file is in the
/// legacy format keeps that file name. A legacy file next to a primary one is
/// never touched here or by orphan cleanup, so it is only reported.
fn plan_targets(hosts: &WebpathHosts, directory: &Path, discriminator: Option<&str>) -> Vec<Target> {
    hosts
        .distinct()
        .into_iter()
        .map(|host| {
            let primary =
                directory.join(host_config_file_name(host, discriminator, ConfigFormat::Primary));
            let legacy =
                directory.join(host_config_file_name(host, discriminator, ConfigFormat::Legacy));
            let path = match (primary.exists(), legacy.exists()) {
                (false, true) => legacy,
                (true, true) => {
                    warn!(
                        host,
                        legacy = %legacy.display(),
                        "stale legacy host file left next to the primary one"
                    );
                    primary
                }
                _ => primary,
            };
            let role = if host == hosts.canonical() {
                FileRole::Real
            } else {
                FileRole::Guard
            };
            Target {
                host: host.to_string(),
                path,
                role,
            }
        })
        .collect()
}

/// [`HostFileDistributor::distribute`] with the system clock.
pub fn distribute(
    tree: &SettingsTree,
    directory: &Path,
    options: &DistributionOptions,
) -> SettingsResult<DistributionReport> {
    HostFileDistributor::new().distribute(tree, directory, options)
}
