use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use paths::ConfigFilePattern;

use crate::errors::{SettingsError, SettingsResult};
use crate::webpath::WebpathHosts;

/// Config files in `directory` that belong to none of the current hosts.
///
/// Only primary-format files for `discriminator` are considered
/// (`*.<discriminator>.conf.php`, or `*.conf.php` without one). A file is
/// recognised when its host prefix is one of the three webpath hosts; all other
/// matches are returned. Backup files never match. Nothing is deleted here.
pub fn find_other_config_files(
    directory: &Path,
    discriminator: Option<&str>,
    hosts: &WebpathHosts,
) -> SettingsResult<BTreeSet<String>> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SettingsError::NotFound(directory.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let pattern = ConfigFilePattern::new(discriminator);
    let mut unrecognised = BTreeSet::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let Some(host) = pattern.host_prefix(&name) else {
            continue;
        };
        if host != hosts.canonical() && !hosts.contains(host) {
            unrecognised.insert(name);
        }
    }
    Ok(unrecognised)
}
