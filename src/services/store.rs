//! Release store
//!
//! Enumerates, names and orders the releases of one application. The store
//! owns no cache: every query re-reads the releases directory, so it always
//! reflects what is actually on disk.

use std::fs;

use crate::domain::release::{AppPaths, Release, ReleaseId};
use crate::error::{HarvestError, Result};
use crate::infra::fs::{classify, read_link, EntryKind};

/// Read-side view of the releases directory
pub struct ReleaseStore<'a> {
    paths: &'a AppPaths,
}

impl<'a> ReleaseStore<'a> {
    pub fn new(paths: &'a AppPaths) -> Self {
        ReleaseStore { paths }
    }

    /// Allocate an identifier for a new release
    ///
    /// The identifier is taken from the current time, but never less than or
    /// equal to the newest existing one: when two deploys start within the
    /// same second the second allocation moves one second forward instead of
    /// colliding with an in-progress release.
    pub fn allocate_release_id(&self) -> Result<ReleaseId> {
        let candidate = ReleaseId::now();
        match self.list_releases()?.first() {
            Some(newest) if candidate <= newest.id => Ok(newest.id.successor()),
            _ => Ok(candidate),
        }
    }

    /// List all releases, newest first
    ///
    /// An entry that does not parse as a release identifier (or is not a
    /// directory) is a fatal inconsistency: skipping it silently would
    /// corrupt retention and rollback accounting.
    pub fn list_releases(&self) -> Result<Vec<Release>> {
        if classify(&self.paths.releases)? != Some(EntryKind::Directory) {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.paths.releases)
            .map_err(|err| HarvestError::io(&self.paths.releases, err))?;

        let mut releases = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| HarvestError::io(&self.paths.releases, err))?;
            let path = entry.path();

            let name = entry.file_name();
            let name = name.to_string_lossy();
            let id = ReleaseId::parse(&name).map_err(|_| {
                HarvestError::filesystem(
                    &path,
                    format!("`{}` is not a valid release directory name", name),
                )
            })?;

            if classify(&path)? != Some(EntryKind::Directory) {
                return Err(HarvestError::filesystem(&path, "release entry is not a directory"));
            }

            releases.push(Release { id, path });
        }

        releases.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(releases)
    }

    /// Resolve the release the `current` pointer refers to
    ///
    /// `None` when the pointer is absent or not a symlink. A pointer naming
    /// a release that no longer exists in the store is a broken invariant.
    pub fn resolve_current_release(&self) -> Result<Option<Release>> {
        let Some(target) = read_link(&self.paths.current)? else {
            return Ok(None);
        };

        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                HarvestError::filesystem(&self.paths.current, "current pointer has no target name")
            })?;

        let id = ReleaseId::parse(&name).map_err(|_| {
            HarvestError::filesystem(
                &self.paths.current,
                format!("current pointer targets `{}`, not a release", name),
            )
        })?;

        self.list_releases()?
            .into_iter()
            .find(|release| release.id == id)
            .map(Some)
            .ok_or_else(|| {
                HarvestError::filesystem(
                    &self.paths.current,
                    format!("current pointer targets missing release {}", id),
                )
            })
    }
}
