use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("portal authentication failed: {0}")]
    Authentication(String),
    #[error("invalid month range: {0}")]
    InvalidRange(String),
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("remote store error: {0}")]
    RemoteStore(String),
    #[error("upload of {} failed: {reason}", path.display())]
    Upload { path: PathBuf, reason: String },
    #[error("navigation to {url} failed after {attempts} attempt(s): {reason}")]
    NavigationTimeout {
        url: String,
        attempts: usize,
        reason: String,
    },
    #[error("rendering {url} failed: {reason}")]
    Render { url: String, reason: String },
    #[error("config invalid: {0}")]
    InvalidConfig(String),
}

impl HarvestError {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication(_) => ErrorCode::Auth,
            Self::InvalidRange(_) => ErrorCode::Range,
            Self::Filesystem { .. } => ErrorCode::Filesystem,
            Self::RemoteStore(_) => ErrorCode::RemoteStore,
            Self::Upload { .. } => ErrorCode::Upload,
            Self::NavigationTimeout { .. } => ErrorCode::Navigation,
            Self::Render { .. } => ErrorCode::Render,
            Self::InvalidConfig(_) => ErrorCode::Config,
        }
    }

    /// Only these abort a run; everything else is skipped per item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::InvalidRange(_) | Self::InvalidConfig(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Auth,
    Range,
    Filesystem,
    RemoteStore,
    Upload,
    Navigation,
    Render,
    Config,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "E_AUTH",
            Self::Range => "E_RANGE",
            Self::Filesystem => "E_FILESYSTEM",
            Self::RemoteStore => "E_REMOTE_STORE",
            Self::Upload => "E_UPLOAD",
            Self::Navigation => "E_NAVIGATION",
            Self::Render => "E_RENDER",
            Self::Config => "E_CONFIG",
        }
    }
}
