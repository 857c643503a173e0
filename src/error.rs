//! Unified error handling
//!
//! Provides the `HarvestError` enum used by every core operation, replacing
//! ad-hoc string errors. Callers branch on the variant, not on message text.

use std::path::{Path, PathBuf};

/// Unified deployment error type
#[derive(Debug)]
pub enum HarvestError {
    /// Missing or invalid application/rollback configuration
    Configuration(String),
    /// An external command failed; carries the command text and exit code
    /// (`None` when the process was killed or never started)
    Process {
        command: String,
        code: Option<i32>,
        detail: String,
    },
    /// Unexpected on-disk state: broken invariant, unparseable release name,
    /// dangling current pointer, or a plain I/O failure with its path
    Filesystem { path: PathBuf, detail: String },
    /// Rollback precondition unmet: too few releases, unknown target,
    /// target equals current, no predecessor
    Validation(String),
}

impl HarvestError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a process failure
    pub fn process(
        command: impl Into<String>,
        code: Option<i32>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Process {
            command: command.into(),
            code,
            detail: detail.into(),
        }
    }

    /// Create a filesystem error
    pub fn filesystem(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Filesystem {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create a filesystem error from an I/O error
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl std::fmt::Display for HarvestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarvestError::Configuration(m) => write!(f, "Configuration error: {}", m),
            HarvestError::Process {
                command,
                code,
                detail,
            } => match code {
                Some(code) => write!(
                    f,
                    "Command `{}` failed with exit code {}: {}",
                    command, code, detail
                ),
                None => write!(f, "Command `{}` failed: {}", command, detail),
            },
            HarvestError::Filesystem { path, detail } => {
                write!(f, "Filesystem error at {}: {}", path.display(), detail)
            }
            HarvestError::Validation(m) => write!(f, "Validation error: {}", m),
        }
    }
}

impl std::error::Error for HarvestError {}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, HarvestError>;
