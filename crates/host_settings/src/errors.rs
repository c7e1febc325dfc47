use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not writable: {}", .0.display())]
    NotWritable(PathBuf),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid config path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("parse error in {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("root key `{0}` has the same name as a section")]
    KeyConflict(String),

    #[error("webpath.{0} is missing or empty")]
    MissingWebpath(&'static str),

    #[error("backup of {} failed: {source}", .path.display())]
    BackupFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("distribution failed for {} target(s): {}", .failures.len(), join_failures(.failures))]
    PartialDistributionFailure { failures: Vec<TargetFailure> },
}

impl SettingsError {
    pub(crate) fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        SettingsError::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

/// One host file that could not be written during a distribution run.
#[derive(Debug)]
pub struct TargetFailure {
    pub host: String,
    pub path: PathBuf,
    pub error: SettingsError,
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.host, self.path.display(), self.error)
    }
}

fn join_failures(failures: &[TargetFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
