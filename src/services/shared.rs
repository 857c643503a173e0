//! Shared resource linking
//!
//! Wires the configured shared directories and files of a fresh release into
//! the persistent `shared/` storage. Runs once per deploy, before the build
//! pipeline; any failure aborts the deploy.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::domain::release::AppPaths;
use crate::error::{HarvestError, Result};
use crate::infra::fs::{classify, ensure_dir_exists, remove_tree, symlink, EntryKind};

/// Links shared dirs/files from a release into shared storage
pub struct SharedResourceLinker<'a> {
    app: &'a AppConfig,
    paths: &'a AppPaths,
}

impl<'a> SharedResourceLinker<'a> {
    pub fn new(app: &'a AppConfig, paths: &'a AppPaths) -> Self {
        SharedResourceLinker { app, paths }
    }

    /// Link every configured shared directory and file, dirs first
    pub fn link(&self, release_path: &Path) -> Result<()> {
        info!("Setting up shared files and directories");

        for dir in &self.app.shared_dirs {
            self.link_dir(release_path, dir)?;
        }
        for file in &self.app.shared_files {
            self.link_file(release_path, file)?;
        }
        Ok(())
    }

    fn link_dir(&self, release_path: &Path, name: &str) -> Result<()> {
        let release_side = release_path.join(name);
        let shared_side = self.paths.shared_path(name);

        // A nested name like "storage/logs" whose parent is already linked
        // resolves into shared storage itself; touching it through the link
        // would delete live data. The shared directory still gets created.
        if crosses_symlink(release_path, &release_side)? {
            ensure_dir_exists(&shared_side)?;
            debug!(dir = name, "Parent already linked into shared storage, skipping");
            return Ok(());
        }

        // Whatever the checkout shipped at this path gives way to the link.
        // remove_tree never follows symlinks, so a link nested inside the
        // shipped directory cannot drag shared storage down with it.
        remove_tree(&release_side)?;

        ensure_dir_exists(&shared_side)?;
        ensure_parent(&release_side)?;
        symlink(&shared_side, &release_side)?;
        debug!(dir = name, "Linked shared directory");
        Ok(())
    }

    fn link_file(&self, release_path: &Path, name: &str) -> Result<()> {
        let release_side = release_path.join(name);
        let shared_side = self.paths.shared_path(name);

        if crosses_symlink(release_path, &release_side)? {
            debug!(file = name, "Parent already linked into shared storage, skipping");
            return Ok(());
        }

        // One-time bootstrap: seed the shared copy from the release's
        // `<name>.example` template, and never overwrite it afterwards.
        if classify(&shared_side)?.is_none() {
            let template = example_path(&release_side);
            if classify(&template)? == Some(EntryKind::File) {
                info!(file = name, "Bootstrapping shared file from template");
                ensure_parent(&shared_side)?;
                fs::copy(&template, &shared_side)
                    .map_err(|err| HarvestError::io(&shared_side, err))?;
            }
        }

        remove_tree(&release_side)?;
        ensure_parent(&release_side)?;
        symlink(&shared_side, &release_side)?;
        debug!(file = name, "Linked shared file");
        Ok(())
    }
}

/// Whether any path component strictly between `root` and `leaf` is a symlink
fn crosses_symlink(root: &Path, leaf: &Path) -> Result<bool> {
    let Ok(relative) = leaf.strip_prefix(root) else {
        return Ok(false);
    };

    let mut probe = root.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        probe.push(component);
        if classify(&probe)? == Some(EntryKind::Symlink) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir_exists(parent),
        None => Ok(()),
    }
}

/// `<path>.example`, appended to the full file name
fn example_path(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".example");
    PathBuf::from(raw)
}
