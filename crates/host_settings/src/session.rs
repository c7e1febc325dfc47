use std::path::Path;

use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::distribute::{DistributionOptions, DistributionReport, HostFileDistributor};
use crate::errors::SettingsResult;
use crate::lock::DirectoryLock;
use crate::merge::merge_from_file;
use crate::tree::SettingsTree;

/// One round of edits: load or build a tree, stage changes, optionally
/// upgrade against a template, then write it out.
#[derive(Debug, Clone, Default)]
pub struct SettingsSession<C = SystemClock> {
    tree: SettingsTree,
    dirty: bool,
    distributor: HostFileDistributor<C>,
}

impl SettingsSession<SystemClock> {
    /// Session over an empty tree.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Session over the tree stored at `path`.
    pub fn load(path: &Path) -> SettingsResult<Self> {
        Ok(Self::from_tree(codec::read_file(path)?))
    }

    pub fn from_tree(tree: SettingsTree) -> Self {
        Self::from_tree_with_clock(tree, SystemClock)
    }
}

impl<C: Clock> SettingsSession<C> {
    pub fn with_clock(clock: C) -> Self {
        Self::from_tree_with_clock(SettingsTree::new(), clock)
    }

    pub fn from_tree_with_clock(tree: SettingsTree, clock: C) -> Self {
        Self {
            tree,
            dirty: false,
            distributor: HostFileDistributor::with_clock(clock),
        }
    }

    pub fn tree(&self) -> &SettingsTree {
        &self.tree
    }

    pub fn into_tree(self) -> SettingsTree {
        self.tree
    }

    /// Staged edits not yet written.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set(&mut self, group: &str, key: &str, value: impl Into<String>) {
        self.tree.set(group, key, value);
        self.dirty = true;
    }

    pub fn set_bulk<K, V>(&mut self, group: &str, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tree.set_bulk(group, values);
        self.dirty = true;
    }

    /// Reshape the tree onto the template at `template_path`. On error the
    /// tree is left as it was.
    pub fn upgrade_from(&mut self, template_path: &Path) -> SettingsResult<()> {
        let merged = merge_from_file(template_path, &self.tree)?;
        if merged != self.tree {
            self.tree = merged;
            self.dirty = true;
        }
        info!(template = %template_path.display(), "settings upgraded from template");
        Ok(())
    }

    /// Distribute the tree. Staged edits count as written only when every
    /// host file was.
    pub fn write(
        &mut self,
        directory: &Path,
        options: &DistributionOptions,
    ) -> SettingsResult<DistributionReport> {
        let report = self.distributor.distribute(&self.tree, directory, options)?;
        self.dirty = false;
        Ok(report)
    }

    /// [`Self::write`] into [`paths::default_config_dir`].
    pub fn write_default(&mut self, options: &DistributionOptions) -> SettingsResult<DistributionReport> {
        let directory = paths::default_config_dir();
        self.write(&directory, options)
    }

    /// [`Self::write`] while holding the directory's [`DirectoryLock`].
    pub fn write_locked(
        &mut self,
        directory: &Path,
        options: &DistributionOptions,
    ) -> SettingsResult<DistributionReport> {
        let _lock = DirectoryLock::acquire(directory)?;
        self.write(directory, options)
    }
}
