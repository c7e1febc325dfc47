//! File naming for host config files and their backups.
//!
//! Everything here is pure string/path computation. Callers that need to know
//! whether a name is already taken pass an existence predicate in.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

/// Suffix of config files in the primary format.
pub const PRIMARY_SUFFIX: &str = "conf.php";
/// Suffix of config files in the legacy ini-style format.
pub const LEGACY_SUFFIX: &str = "conf.ini";
/// Appended to backup names of legacy files so a web server never serves them as text.
pub const LEGACY_BACKUP_SUFFIX: &str = ".php";
/// Environment variable overriding [`default_config_dir`].
pub const CONFIG_DIR_ENV: &str = "HOST_SETTINGS_DIR";

const APP_DIR: &str = "host_settings";

/// On-disk format of a config file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFormat {
    /// `*.conf.php`, and anything that is not recognisably legacy.
    Primary,
    /// `*.ini`
    Legacy,
}

impl ConfigFormat {
    pub fn from_file_name(name: &str) -> Self {
        let is_ini = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ini"));
        if is_ini {
            ConfigFormat::Legacy
        } else {
            ConfigFormat::Primary
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(Self::from_file_name)
            .unwrap_or(ConfigFormat::Primary)
    }

    /// The `conf.<ext>` suffix used for host config files of this format.
    pub fn suffix(self) -> &'static str {
        match self {
            ConfigFormat::Primary => PRIMARY_SUFFIX,
            ConfigFormat::Legacy => LEGACY_SUFFIX,
        }
    }
}

/// `<host>[.<discriminator>].conf.php` (or `.conf.ini` for the legacy format).
pub fn host_config_file_name(host: &str, discriminator: Option<&str>, format: ConfigFormat) -> String {
    match discriminator {
        Some(d) => format!("{host}.{d}.{}", format.suffix()),
        None => format!("{host}.{}", format.suffix()),
    }
}

/// Backup name for `base` on `date`. `attempt == None` is the first candidate
/// (`<date>_old.<base>`), `Some(n)` the n-th collision fallback (`<date>_<n>_old.<base>`).
pub fn backup_file_name(base: &str, date: NaiveDate, attempt: Option<u64>) -> String {
    let date = date.format("%Y%m%d");
    let tail = match ConfigFormat::from_file_name(base) {
        ConfigFormat::Legacy => LEGACY_BACKUP_SUFFIX,
        ConfigFormat::Primary => "",
    };
    match attempt {
        None => format!("{date}_old.{base}{tail}"),
        Some(n) => format!("{date}_{n}_old.{base}{tail}"),
    }
}

/// All backup candidates for `base` on `date`, in probing order.
pub fn backup_candidates(base: &str, date: NaiveDate) -> impl Iterator<Item = String> + '_ {
    std::iter::once(None)
        .chain((0u64..).map(Some))
        .map(move |attempt| backup_file_name(base, date, attempt))
}

/// First backup candidate for which `taken` returns false.
pub fn next_backup_name(base: &str, date: NaiveDate, mut taken: impl FnMut(&str) -> bool) -> String {
    backup_candidates(base, date)
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| backup_file_name(base, date, Some(u64::MAX)))
}

fn backup_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{8}(_\d+)?_old\.").expect("static backup regex"))
}

/// True for names produced by [`backup_file_name`].
pub fn is_backup_file_name(name: &str) -> bool {
    backup_name_regex().is_match(name)
}

/// Matches host config files written for one discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFilePattern {
    suffix: String,
}

impl ConfigFilePattern {
    pub fn new(discriminator: Option<&str>) -> Self {
        let suffix = match discriminator {
            Some(d) => format!(".{d}.{PRIMARY_SUFFIX}"),
            None => format!(".{PRIMARY_SUFFIX}"),
        };
        Self { suffix }
    }

    /// Host part of `file_name` if it is a primary-format config file for this
    /// discriminator. Backup files never match.
    pub fn host_prefix<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        if is_backup_file_name(file_name) {
            return None;
        }
        file_name
            .strip_suffix(self.suffix.as_str())
            .filter(|host| !host.is_empty())
    }
}

/// Identifies where the process is running from. This decides where host
/// files go when no directory is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Started through cargo, e.g. `cargo run` or `cargo test`. Host files live
    /// in the checkout.
    Development,
    /// Installed binary. Host files live in the user's local data directory.
    Production,
}

impl RuntimeEnvironment {
    /// Guess the environment from the executable location and cargo's
    /// environment variables.
    pub fn detect() -> Self {
        // Binaries built by cargo run out of `target/debug` or `target/release`.
        let in_target_dir = std::env::current_exe()
            .map(|exe| exe.components().any(|c| c.as_os_str() == "target"))
            .unwrap_or(false);
        if in_target_dir {
            return RuntimeEnvironment::Development;
        }

        // `cargo run` exports these even when the binary lives elsewhere.
        let under_cargo = ["CARGO", "CARGO_MANIFEST_DIR"]
            .iter()
            .any(|var| std::env::var_os(var).is_some());
        if under_cargo {
            RuntimeEnvironment::Development
        } else {
            RuntimeEnvironment::Production
        }
    }
}

/// Directory holding the distributed host files when the caller does not name one.
///
/// `HOST_SETTINGS_DIR` wins; otherwise `<manifest dir>/var` in development and
/// `<local data dir>/host_settings/var` in production.
pub fn default_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    config_dir_for(RuntimeEnvironment::detect())
}

/// Default directory for `environment`, ignoring [`CONFIG_DIR_ENV`].
pub fn config_dir_for(environment: RuntimeEnvironment) -> PathBuf {
    match environment {
        // manifest dir of the running crate, else the working directory
        RuntimeEnvironment::Development => std::env::var("CARGO_MANIFEST_DIR")
            .map(PathBuf::from)
            .or_else(|_| std::env::current_dir())
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("var"),
        // e.g. ~/.local/share/host_settings/var on Linux
        RuntimeEnvironment::Production => dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("var"),
    }
}
