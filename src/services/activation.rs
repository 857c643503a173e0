//! Release activation
//!
//! The atomic pointer swap shared by deploy and rollback: a temporary
//! symlink is created next to `current` and renamed over it in one step, so
//! a concurrent reader resolves either the old release or the new one,
//! never a missing link.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::domain::release::AppPaths;
use crate::error::{HarvestError, Result};
use crate::infra::fs::{classify, symlink};

/// Atomically point `current` at the target release path
pub fn activate(paths: &AppPaths, target: &Path) -> Result<()> {
    info!(target = %target.display(), "Activating release");

    // A stale temp link means a prior activation died between symlink and
    // rename; it is safe to discard.
    if classify(&paths.temp_link)?.is_some() {
        debug!(link = %paths.temp_link.display(), "Removing stale temporary link");
        fs::remove_file(&paths.temp_link)
            .map_err(|err| HarvestError::io(&paths.temp_link, err))?;
    }

    symlink(target, &paths.temp_link)?;

    fs::rename(&paths.temp_link, &paths.current)
        .map_err(|err| HarvestError::io(&paths.current, err))
}
