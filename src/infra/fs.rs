//! Filesystem helpers
//!
//! Everything here is symlink-aware: entries are classified with
//! `symlink_metadata` and links are never followed, so a nested symlink into
//! shared storage can be unlinked without touching what it points at.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HarvestError, Result};

/// What a directory entry is, without following links
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Symlink,
    File,
}

/// Classify a path, or `None` if nothing exists there
pub fn classify(path: &Path) -> Result<Option<EntryKind>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            let file_type = meta.file_type();
            let kind = if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            Ok(Some(kind))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(HarvestError::io(path, err)),
    }
}

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|err| HarvestError::io(path, err))
}

/// Remove a path of any kind without ever following a symlink
///
/// Directories are deleted recursively with an explicit stack instead of
/// call recursion, so arbitrarily deep trees cannot overflow. Symlinks found
/// inside are unlinked, never descended into.
pub fn remove_tree(root: &Path) -> Result<()> {
    let Some(kind) = classify(root)? else {
        return Ok(());
    };

    if kind != EntryKind::Directory {
        return fs::remove_file(root).map_err(|err| HarvestError::io(root, err));
    }

    // (path, children_done): a directory is pushed twice, first to expand
    // its children and again to remove it once they are gone.
    let mut stack: Vec<(PathBuf, bool)> = vec![(root.to_path_buf(), false)];

    while let Some((path, children_done)) = stack.pop() {
        if children_done {
            fs::remove_dir(&path).map_err(|err| HarvestError::io(&path, err))?;
            continue;
        }

        match classify(&path)? {
            Some(EntryKind::Directory) => {
                stack.push((path.clone(), true));
                let entries = fs::read_dir(&path).map_err(|err| HarvestError::io(&path, err))?;
                for entry in entries {
                    let entry = entry.map_err(|err| HarvestError::io(&path, err))?;
                    stack.push((entry.path(), false));
                }
            }
            Some(_) => {
                fs::remove_file(&path).map_err(|err| HarvestError::io(&path, err))?;
            }
            None => {}
        }
    }

    Ok(())
}

/// Create a symlink at `link` pointing at `target`
pub fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|err| HarvestError::io(link, err))
}

/// Read a symlink's target, or `None` when the path is absent or not a link
pub fn read_link(path: &Path) -> Result<Option<PathBuf>> {
    match classify(path)? {
        Some(EntryKind::Symlink) => {
            fs::read_link(path).map(Some).map_err(|err| HarvestError::io(path, err))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_distinguishes_kinds() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dir");
        let file = tmp.path().join("file");
        let link = tmp.path().join("link");
        fs::create_dir(&dir).unwrap();
        fs::write(&file, b"x").unwrap();
        symlink(&dir, &link).unwrap();

        assert_eq!(classify(&dir).unwrap(), Some(EntryKind::Directory));
        assert_eq!(classify(&file).unwrap(), Some(EntryKind::File));
        assert_eq!(classify(&link).unwrap(), Some(EntryKind::Symlink));
        assert_eq!(classify(&tmp.path().join("missing")).unwrap(), None);
    }

    #[test]
    fn test_classify_dangling_link_is_symlink() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("dangling");
        symlink(&tmp.path().join("gone"), &link).unwrap();
        assert_eq!(classify(&link).unwrap(), Some(EntryKind::Symlink));
    }

    #[test]
    fn test_remove_tree_missing_path_is_noop() {
        let tmp = TempDir::new().unwrap();
        assert!(remove_tree(&tmp.path().join("missing")).is_ok());
    }

    #[test]
    fn test_remove_tree_deep_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        let mut deep = root.clone();
        for i in 0..50 {
            deep = deep.join(format!("level{}", i));
        }
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("leaf.txt"), b"x").unwrap();

        remove_tree(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_remove_tree_does_not_follow_nested_symlink() {
        let tmp = TempDir::new().unwrap();
        let shared = tmp.path().join("shared");
        fs::create_dir(&shared).unwrap();
        fs::write(shared.join("keep.txt"), b"precious").unwrap();

        let victim = tmp.path().join("victim");
        fs::create_dir(&victim).unwrap();
        symlink(&shared, &victim.join("into-shared")).unwrap();

        remove_tree(&victim).unwrap();
        assert!(!victim.exists());
        // The link was unlinked, not followed: shared storage is intact.
        assert!(shared.join("keep.txt").exists());
    }

    #[test]
    fn test_remove_tree_unlinks_plain_symlink() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");
        fs::create_dir(&target).unwrap();
        let link = tmp.path().join("link");
        symlink(&target, &link).unwrap();

        remove_tree(&link).unwrap();
        assert!(classify(&link).unwrap().is_none());
        assert!(target.exists());
    }

    #[test]
    fn test_read_link_on_regular_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(read_link(&file).unwrap().is_none());
    }
}
