//! Configuration file loading
//!
//! The config file is JSON, looked up in the working directory first and the
//! user's home directory last. When no file exists the built-in defaults
//! apply, which leaves an empty application table.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::config::app::AppConfig;
use crate::error::{HarvestError, Result};

/// Global configuration: the application table plus tool binaries
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Deployable applications, keyed by name
    #[serde(default)]
    pub applications: HashMap<String, AppConfig>,
    /// Application used when the CLI names none
    #[serde(default = "default_app_name")]
    pub default_app: String,
    /// PHP binary path
    #[serde(default = "default_php_binary")]
    pub php_binary: String,
    /// Composer binary path
    #[serde(default = "default_composer_binary")]
    pub composer_binary: String,
    /// NPM binary path
    #[serde(default = "default_npm_binary")]
    pub npm_binary: String,
    /// Whether deploys run the test suite
    #[serde(default = "default_true")]
    pub run_tests: bool,
    /// Whether deploys run database migrations
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_app_name() -> String {
    "default".to_string()
}

fn default_php_binary() -> String {
    "php".to_string()
}

fn default_composer_binary() -> String {
    "composer".to_string()
}

fn default_npm_binary() -> String {
    "npm".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            applications: HashMap::new(),
            default_app: default_app_name(),
            php_binary: default_php_binary(),
            composer_binary: default_composer_binary(),
            npm_binary: default_npm_binary(),
            run_tests: true,
            run_migrations: true,
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, or defaults
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration");
                let raw = std::fs::read_to_string(&path)
                    .map_err(|err| HarvestError::io(&path, err))?;
                serde_json::from_str(&raw).map_err(|err| {
                    HarvestError::configuration(format!(
                        "invalid config file {}: {}",
                        path.display(),
                        err
                    ))
                })
            }
            None => Ok(Config::default()),
        }
    }

    /// Look up an application by name, falling back to the default
    pub fn application(&self, name: Option<&str>) -> Result<&AppConfig> {
        let name = name.unwrap_or(&self.default_app);
        self.applications.get(name).ok_or_else(|| {
            HarvestError::configuration(format!(
                "application `{}` not found in configuration",
                name
            ))
        })
    }
}

/// Search order: working directory, its `config/` subdirectory, then
/// `~/.harvest/config.json`
fn find_config_file() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("harvest.json"));
        candidates.push(cwd.join("config").join("harvest.json"));
    }
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(home).join(".harvest").join("config.json"));
    }
    candidates.into_iter().find(|path| path.is_file())
}
