//! Error types for mzcld
//!
//! Every failure carries the action that was being attempted so the
//! message printed to the terminal stands on its own.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::duration::format_duration;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error while performing a named action
    #[error("{action}: {source}")]
    Backend {
        action: String,
        #[source]
        source: kube::Error,
    },

    /// Invalid flag combination or missing configuration
    #[error("{0}")]
    ConfigError(String),

    /// Label selector failed to parse
    #[error("invalid label selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Active sync operations did not clear before the deadline
    #[error(
        "timeout waiting for active sync operations to complete (timeout: {})",
        format_duration(*.timeout)
    )]
    Timeout { timeout: Duration },

    /// Refusing to clobber an existing recovery point
    #[error("state file {} already exists (use --force to overwrite)", .path.display())]
    SnapshotExists { path: PathBuf },

    /// Snapshot file could not be parsed
    #[error("snapshot {} is malformed: {source}", .path.display())]
    SnapshotCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A captured syncPolicy blob could not be decoded
    #[error("unmarshal syncPolicy for {app}: {source}")]
    PolicyCorrupt {
        app: String,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem error with the path involved
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure writing user-facing output
    #[error("failed writing to stdout: {0}")]
    Output(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML (Argo CD config) serialization error
    #[error("Config serialization error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Argo CD API returned a non-success status
    #[error("Argo CD API returned {status}: {message}")]
    ArgoApi { status: u16, message: String },

    /// IAP discovery, impersonation or SSO failure
    #[error("{0}")]
    AuthError(String),

    /// External command failed to run or exited non-zero
    #[error("{command}: {message}")]
    Command { command: String, message: String },
}

impl Error {
    /// Wrap a Kubernetes error with the action that was being attempted
    pub fn backend(action: impl Into<String>, source: kube::Error) -> Self {
        Error::Backend {
            action: action.into(),
            source,
        }
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
