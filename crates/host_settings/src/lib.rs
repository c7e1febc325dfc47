//! Settings reconciliation and multi-host distribution.
//!
//! A [`SettingsTree`] is merged against upgraded templates ([`merge`]) and
//! written out as one real file for the delivery host plus guard files for the
//! other endpoint hosts ([`HostFileDistributor`]). Existing files are backed up
//! first ([`BackupManager`]) and files of hosts that are no longer assigned are
//! retired ([`find_other_config_files`]).

pub mod backup;
pub mod clock;
pub mod codec;
pub mod distribute;
pub mod errors;
pub mod lock;
pub mod merge;
pub mod orphans;
pub mod probe;
pub mod resolve;
pub mod session;
pub mod tree;
pub mod webpath;

pub use backup::{BackupManager, LEGACY_BACKUP_STUB};
pub use clock::{Clock, FixedClock, SystemClock};
pub use distribute::{
    DistributionOptions, DistributionReport, FileRole, HostFileDistributor, WrittenFile, distribute,
};
pub use errors::{SettingsError, SettingsResult, TargetFailure};
pub use lock::DirectoryLock;
pub use merge::{merge, merge_from_file};
pub use orphans::find_other_config_files;
pub use probe::is_config_writable;
pub use resolve::resolve_host_config;
pub use session::SettingsSession;
pub use tree::{Group, REAL_CONFIG_KEY, ROOT_GROUP, SettingsTree};
pub use webpath::WebpathHosts;
