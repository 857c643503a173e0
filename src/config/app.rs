//! Per-application configuration

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{HarvestError, Result};

/// One deployable application
///
/// Loaded once at startup and passed by reference into the services;
/// immutable for the duration of an operation.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Application name, used in output only
    pub name: String,
    /// Git repository URL
    pub repository: String,
    /// Branch to deploy
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Deployment base path (`{path}/releases`, `{path}/shared`, ...)
    pub path: PathBuf,
    /// Number of releases kept on disk for rollback
    #[serde(default = "default_releases_to_keep")]
    pub releases_to_keep: usize,
    /// Directories shared between releases
    #[serde(default = "default_shared_dirs")]
    pub shared_dirs: Vec<String>,
    /// Files shared between releases
    #[serde(default = "default_shared_files")]
    pub shared_files: Vec<String>,
    /// Directories made group-writable inside each new release
    #[serde(default)]
    pub writable_dirs: Vec<String>,
    /// Shell commands run around activation
    #[serde(default)]
    pub hooks: Hooks,
}

/// Hook command lists, run as raw shell lines in the release directory
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Hooks {
    #[serde(default)]
    pub before_deploy: Vec<String>,
    #[serde(default)]
    pub after_deploy: Vec<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_releases_to_keep() -> usize {
    5
}

fn default_shared_dirs() -> Vec<String> {
    vec!["storage".to_string()]
}

fn default_shared_files() -> Vec<String> {
    vec![".env".to_string()]
}

impl AppConfig {
    /// Assert the fields the core relies on are present
    ///
    /// Full validation belongs to the caller; this only rejects
    /// configurations the services cannot operate on at all.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(HarvestError::configuration("application name is empty"));
        }
        if self.repository.is_empty() {
            return Err(HarvestError::configuration(format!(
                "application `{}` has no repository",
                self.name
            )));
        }
        if self.path.as_os_str().is_empty() {
            return Err(HarvestError::configuration(format!(
                "application `{}` has no deployment path",
                self.name
            )));
        }
        Ok(())
    }
}
