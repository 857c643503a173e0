//! Release retention
//!
//! Bounds how many past releases stay on disk. The currently active release
//! is never deleted, even when it has fallen past the cutoff through manual
//! tampering; that case is reported as an inconsistency instead.

use tracing::{info, warn};

use crate::domain::release::{Release, ReleaseId};
use crate::error::Result;
use crate::infra::fs::remove_tree;

/// Delete every release past the first `keep` entries
///
/// `releases` must be sorted newest first, as `ReleaseStore::list_releases`
/// returns them. Returns the releases actually removed.
pub fn prune(
    releases: &[Release],
    keep: usize,
    current: Option<&ReleaseId>,
) -> Result<Vec<Release>> {
    let mut removed = Vec::new();

    for release in releases.iter().skip(keep) {
        if Some(&release.id) == current {
            warn!(
                release = %release.id,
                "Active release is older than the retention cutoff, refusing to delete it"
            );
            continue;
        }

        info!(release = %release.id, "Removing old release");
        remove_tree(&release.path)?;
        removed.push(release.clone());
    }

    Ok(removed)
}
