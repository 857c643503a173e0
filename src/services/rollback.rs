//! Rollback
//!
//! Reactivates a previously deployed release: either a named one or the
//! immediate predecessor of the current one. Rollback is a pure pointer swap
//! plus validation; it never touches the build pipeline, shared-resource
//! linking, or retention.

use tracing::info;

use crate::domain::release::{AppPaths, Release};
use crate::error::{HarvestError, Result};
use crate::services::activation;
use crate::services::store::ReleaseStore;

/// Selects and activates a rollback target
pub struct RollbackService<'a> {
    paths: &'a AppPaths,
}

impl<'a> RollbackService<'a> {
    pub fn new(paths: &'a AppPaths) -> Self {
        RollbackService { paths }
    }

    /// Roll back to `target`, or to the previous release when `None`
    pub fn rollback(&self, target: Option<&str>) -> Result<Release> {
        let store = ReleaseStore::new(self.paths);
        let releases = store.list_releases()?;

        if releases.len() < 2 {
            return Err(HarvestError::validation("no releases available for rollback"));
        }

        let current = store
            .resolve_current_release()?
            .ok_or_else(|| HarvestError::validation("no current release found"))?;

        let target = match target {
            Some(name) => Self::explicit_target(name, &releases, &current)?,
            None => Self::previous_target(&releases, &current)?,
        };

        info!(release = %target.id, "Rolling back");
        activation::activate(self.paths, &target.path)?;
        Ok(target)
    }

    fn explicit_target(name: &str, releases: &[Release], current: &Release) -> Result<Release> {
        if name == current.id.as_str() {
            return Err(HarvestError::validation(format!(
                "already on release {}",
                name
            )));
        }

        releases
            .iter()
            .find(|release| release.id.as_str() == name)
            .cloned()
            .ok_or_else(|| HarvestError::validation(format!("release {} not found", name)))
    }

    /// The entry immediately after current in the newest-first list
    fn previous_target(releases: &[Release], current: &Release) -> Result<Release> {
        let position = releases
            .iter()
            .position(|release| release.id == current.id)
            .ok_or_else(|| {
                HarvestError::validation("current release not found in the releases directory")
            })?;

        releases
            .get(position + 1)
            .cloned()
            .ok_or_else(|| HarvestError::validation("no previous release found for rollback"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::fs::symlink;
    use std::fs;
    use tempfile::TempDir;

    fn fixture(names: &[&str], current: Option<&str>) -> (TempDir, AppPaths) {
        let tmp = TempDir::new().unwrap();
        let paths = AppPaths::new(tmp.path());
        for name in names {
            fs::create_dir_all(paths.releases.join(name)).unwrap();
        }
        if let Some(name) = current {
            symlink(&paths.releases.join(name), &paths.current).unwrap();
        }
        (tmp, paths)
    }

    fn current_name(paths: &AppPaths) -> String {
        fs::read_link(&paths.current)
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_rollback_previous() {
        let (_tmp, paths) = fixture(
            &["20240101000000", "20240102000000", "20240103000000"],
            Some("20240103000000"),
        );

        let release = RollbackService::new(&paths).rollback(None).unwrap();

        assert_eq!(release.id.as_str(), "20240102000000");
        assert_eq!(current_name(&paths), "20240102000000");
        // All three releases stay on disk.
        for name in ["20240101000000", "20240102000000", "20240103000000"] {
            assert!(paths.releases.join(name).is_dir());
        }
    }

    #[test]
    fn test_rollback_explicit_target() {
        let (_tmp, paths) = fixture(
            &["20240101000000", "20240102000000", "20240103000000"],
            Some("20240103000000"),
        );

        let release = RollbackService::new(&paths)
            .rollback(Some("20240101000000"))
            .unwrap();

        assert_eq!(release.id.as_str(), "20240101000000");
        assert_eq!(current_name(&paths), "20240101000000");
    }

    #[test]
    fn test_rollback_fails_with_single_release() {
        let (_tmp, paths) = fixture(&["20240101000000"], Some("20240101000000"));
        let service = RollbackService::new(&paths);

        assert!(matches!(
            service.rollback(None),
            Err(HarvestError::Validation(_))
        ));
        assert!(matches!(
            service.rollback(Some("20240101000000")),
            Err(HarvestError::Validation(_))
        ));
        assert_eq!(current_name(&paths), "20240101000000");
    }

    #[test]
    fn test_rollback_fails_without_current_pointer() {
        let (_tmp, paths) = fixture(&["20240101000000", "20240102000000"], None);
        assert!(matches!(
            RollbackService::new(&paths).rollback(None),
            Err(HarvestError::Validation(_))
        ));
    }

    #[test]
    fn test_rollback_rejects_current_as_target() {
        let (_tmp, paths) = fixture(
            &["20240101000000", "20240102000000"],
            Some("20240102000000"),
        );

        let err = RollbackService::new(&paths)
            .rollback(Some("20240102000000"))
            .unwrap_err();
        assert!(matches!(err, HarvestError::Validation(_)));
        assert!(err.to_string().contains("already on"));
        assert_eq!(current_name(&paths), "20240102000000");
    }

    #[test]
    fn test_rollback_rejects_unknown_target() {
        let (_tmp, paths) = fixture(
            &["20240101000000", "20240102000000"],
            Some("20240102000000"),
        );

        let err = RollbackService::new(&paths)
            .rollback(Some("20991231235959"))
            .unwrap_err();
        assert!(matches!(err, HarvestError::Validation(_)));
        assert_eq!(current_name(&paths), "20240102000000");
    }

    #[test]
    fn test_rollback_fails_when_current_is_oldest() {
        let (_tmp, paths) = fixture(
            &["20240101000000", "20240102000000"],
            Some("20240101000000"),
        );

        let err = RollbackService::new(&paths).rollback(None).unwrap_err();
        assert!(err.to_string().contains("no previous release"));
        assert_eq!(current_name(&paths), "20240101000000");
    }
}
