//! Release domain model
//!
//! A release is an immutable directory under `{app}/releases`, named by a
//! second-granularity timestamp. The name sorts the same way
//! lexicographically and chronologically, so release ordering never needs
//! the directory mtime.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::error::{HarvestError, Result};

/// Release directory name format (`date('YmdHis')` in the classic layout)
pub const RELEASE_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Subdirectory holding all releases
pub const RELEASES_DIR: &str = "releases";
/// Subdirectory holding shared dirs/files
pub const SHARED_DIR: &str = "shared";
/// Symlink pointing at the active release
pub const CURRENT_LINK: &str = "current";
/// Transient symlink used only during activation
pub const TEMP_LINK: &str = "release-temp";
/// Per-release directory of one-shot deployment scripts
pub const SCRIPTS_DIR: &str = "deploy-scripts";
/// Subdirectory scripts are moved into after running once
pub const EXECUTED_DIR: &str = "executed";

/// Identifier of a single release: a `YYYYMMDDHHMMSS` timestamp string
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Identifier for the current wall-clock second
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Identifier for an explicit instant
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        ReleaseId(at.format(RELEASE_ID_FORMAT).to_string())
    }

    /// Parse a directory name as a release identifier
    ///
    /// An entry in the releases directory that does not parse is a broken
    /// invariant, so this returns a `Filesystem` error rather than skipping.
    pub fn parse(name: &str) -> Result<Self> {
        NaiveDateTime::parse_from_str(name, RELEASE_ID_FORMAT).map_err(|_| {
            HarvestError::filesystem(
                name,
                format!("`{}` is not a valid release identifier", name),
            )
        })?;
        Ok(ReleaseId(name.to_string()))
    }

    /// The instant this identifier encodes
    pub fn timestamp(&self) -> DateTime<Utc> {
        // Identifiers only exist after a successful parse/format, so this
        // round-trip cannot fail.
        let naive = NaiveDateTime::parse_from_str(&self.0, RELEASE_ID_FORMAT)
            .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC.naive_utc());
        naive.and_utc()
    }

    /// The identifier one second later, used to resolve same-second
    /// allocation collisions
    pub fn successor(&self) -> Self {
        Self::from_datetime(self.timestamp() + Duration::seconds(1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One release on disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Release {
    pub id: ReleaseId,
    pub path: PathBuf,
}

impl Release {
    pub fn new(id: ReleaseId, releases_dir: &Path) -> Self {
        let path = releases_dir.join(id.as_str());
        Release { id, path }
    }

    /// Creation time, derived from the identifier
    pub fn created_at(&self) -> DateTime<Utc> {
        self.id.timestamp()
    }
}

/// Resolved on-disk layout for one application
///
/// Built once from the configured base path and passed by reference into the
/// services, so one process can operate on several applications.
#[derive(Clone, Debug)]
pub struct AppPaths {
    pub root: PathBuf,
    pub releases: PathBuf,
    pub shared: PathBuf,
    pub current: PathBuf,
    pub temp_link: PathBuf,
}

impl AppPaths {
    pub fn new(base: &Path) -> Self {
        AppPaths {
            root: base.to_path_buf(),
            releases: base.join(RELEASES_DIR),
            shared: base.join(SHARED_DIR),
            current: base.join(CURRENT_LINK),
            temp_link: base.join(TEMP_LINK),
        }
    }

    /// Path of the release with the given identifier
    pub fn release_path(&self, id: &ReleaseId) -> PathBuf {
        self.releases.join(id.as_str())
    }

    /// Path of a shared directory or file
    pub fn shared_path(&self, name: &str) -> PathBuf {
        self.shared.join(name)
    }
}
