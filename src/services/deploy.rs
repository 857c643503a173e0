//! Deploy pipeline
//!
//! Sequences one deployment end to end: allocate a release, check out the
//! code, wire shared resources, run the build/verify steps, activate, then
//! prune old releases. Strictly sequential; every external command blocks
//! until it finishes or times out.
//!
//! Failure policy: anything that fails before activation aborts the deploy
//! and removes the half-built release directory (best effort, never masking
//! the original error). A failing after-deploy hook is surfaced but the
//! activation stands. Retention problems are reported and do not fail an
//! otherwise successful deploy.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{AppConfig, Config, STEP_TIMEOUT_SECS};
use crate::domain::release::{AppPaths, Release, EXECUTED_DIR, SCRIPTS_DIR};
use crate::error::{HarvestError, Result};
use crate::infra::fs::{classify, ensure_dir_exists, remove_tree, EntryKind};
use crate::infra::CommandRunner;
use crate::services::activation;
use crate::services::retention;
use crate::services::shared::SharedResourceLinker;
use crate::services::store::ReleaseStore;

/// Per-invocation deploy options, set from CLI flags
#[derive(Clone, Debug, Default)]
pub struct DeployOptions {
    /// Deploy this branch instead of the configured one
    pub branch: Option<String>,
    /// Skip the test step
    pub skip_tests: bool,
    /// Skip the migration step
    pub skip_migrations: bool,
    /// Treat a failing test suite as non-fatal
    pub force: bool,
}

/// Runs the deployment pipeline for one application
pub struct DeployService<'a> {
    app: &'a AppConfig,
    config: &'a Config,
    paths: AppPaths,
}

impl<'a> DeployService<'a> {
    pub fn new(app: &'a AppConfig, config: &'a Config) -> Self {
        let paths = AppPaths::new(&app.path);
        DeployService { app, config, paths }
    }

    /// Deploy a new release and return it
    pub async fn deploy(&self, options: &DeployOptions) -> Result<Release> {
        self.app.validate()?;
        self.prepare()?;

        let store = ReleaseStore::new(&self.paths);
        let id = store.allocate_release_id()?;
        let release = Release::new(id, &self.paths.releases);
        info!(release = %release.id, app = %self.app.name, "Starting deployment");

        if let Err(err) = self.build_and_activate(&release, options).await {
            self.cleanup_failed_release(&release);
            return Err(err);
        }

        // The release is live from here on; nothing below may undo it.
        self.run_hooks(&release, &self.app.hooks.after_deploy, "after_deploy")
            .await?;

        if let Err(err) = self.prune_old_releases() {
            warn!(error = %err, "Failed to prune old releases");
        }

        info!(release = %release.id, "Deployment finished");
        Ok(release)
    }

    /// Everything whose failure must tear the new release down again
    async fn build_and_activate(&self, release: &Release, options: &DeployOptions) -> Result<()> {
        self.clone_repository(release, options).await?;
        SharedResourceLinker::new(self.app, &self.paths).link(&release.path)?;
        self.make_writable_dirs(release)?;
        self.composer_install(release).await?;
        self.npm_build(release).await?;

        if self.config.run_tests && !options.skip_tests {
            self.run_tests(release, options.force).await?;
        }
        if self.config.run_migrations && !options.skip_migrations {
            self.run_migrations(release).await?;
        }

        self.optimize(release).await?;
        self.run_custom_scripts(release).await?;
        self.run_hooks(release, &self.app.hooks.before_deploy, "before_deploy")
            .await?;

        activation::activate(&self.paths, &release.path)
    }

    /// Create the base layout and the configured shared directories
    fn prepare(&self) -> Result<()> {
        ensure_dir_exists(&self.paths.releases)?;
        ensure_dir_exists(&self.paths.shared)?;
        for dir in &self.app.shared_dirs {
            ensure_dir_exists(&self.paths.shared_path(dir))?;
        }
        Ok(())
    }

    async fn clone_repository(&self, release: &Release, options: &DeployOptions) -> Result<()> {
        let branch = options.branch.as_deref().unwrap_or(&self.app.branch);
        info!(repository = %self.app.repository, branch, "Cloning repository");

        let target = release.path.display().to_string();
        CommandRunner::run(
            "git",
            &[
                "clone",
                "-b",
                branch,
                "--depth",
                "1",
                self.app.repository.as_str(),
                target.as_str(),
            ],
            &self.paths.releases,
            step_timeout(),
        )
        .await
    }

    /// Make the configured writable directories group-writable
    fn make_writable_dirs(&self, release: &Release) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        for dir in &self.app.writable_dirs {
            let path = release.path.join(dir);
            ensure_dir_exists(&path)?;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o775))
                .map_err(|err| HarvestError::io(&path, err))?;
        }
        Ok(())
    }

    async fn composer_install(&self, release: &Release) -> Result<()> {
        info!("Running composer install");
        let working_dir_flag = format!("--working-dir={}", release.path.display());
        CommandRunner::run(
            &self.config.composer_binary,
            &[
                "install",
                "--no-dev",
                "--prefer-dist",
                "--optimize-autoloader",
                "--no-interaction",
                working_dir_flag.as_str(),
            ],
            &release.path,
            step_timeout(),
        )
        .await
    }

    async fn npm_build(&self, release: &Release) -> Result<()> {
        if classify(&release.path.join("package.json"))?.is_none() {
            info!("No package.json found, skipping npm build");
            return Ok(());
        }

        info!("Running npm install and build");
        let prefix_flag = format!("--prefix={}", release.path.display());
        CommandRunner::run(
            &self.config.npm_binary,
            &["ci", prefix_flag.as_str()],
            &release.path,
            step_timeout(),
        )
        .await?;
        CommandRunner::run(
            &self.config.npm_binary,
            &["run", "build", prefix_flag.as_str()],
            &release.path,
            step_timeout(),
        )
        .await
    }

    async fn run_tests(&self, release: &Release, force: bool) -> Result<()> {
        info!("Running tests");
        match self.artisan(release, &["test"]).await {
            Ok(()) => Ok(()),
            Err(err) if force => {
                warn!(error = %err, "Tests failed, continuing deployment due to --force");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn run_migrations(&self, release: &Release) -> Result<()> {
        info!("Running database migrations");
        self.artisan(release, &["migrate", "--force"]).await
    }

    async fn optimize(&self, release: &Release) -> Result<()> {
        info!("Optimizing application");
        self.artisan(release, &["view:clear"]).await?;
        self.artisan(release, &["cache:clear"]).await?;
        self.artisan(release, &["config:cache"]).await?;
        self.artisan(release, &["route:cache"]).await?;
        self.artisan(release, &["view:cache"]).await
    }

    async fn artisan(&self, release: &Release, args: &[&str]) -> Result<()> {
        let artisan = release.path.join("artisan").display().to_string();
        let mut full_args = vec![artisan.as_str()];
        full_args.extend_from_slice(args);
        CommandRunner::run(
            &self.config.php_binary,
            &full_args,
            &release.path,
            step_timeout(),
        )
        .await
    }

    /// Run one-shot scripts shipped under `deploy-scripts/`
    ///
    /// Each script runs once and is then moved into `deploy-scripts/executed`,
    /// so re-deploying the same tree never re-runs it.
    async fn run_custom_scripts(&self, release: &Release) -> Result<()> {
        let scripts_dir = release.path.join(SCRIPTS_DIR);
        if classify(&scripts_dir)? != Some(EntryKind::Directory) {
            return Ok(());
        }

        info!("Executing custom deployment scripts");
        let executed_dir = scripts_dir.join(EXECUTED_DIR);
        ensure_dir_exists(&executed_dir)?;

        for script in pending_scripts(&scripts_dir)? {
            let name = script
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(script = %name, "- Executing script");

            let script_arg = script.display().to_string();
            CommandRunner::run(
                &self.config.php_binary,
                &[script_arg.as_str()],
                &release.path,
                step_timeout(),
            )
            .await?;

            let done = executed_dir.join(&name);
            fs::rename(&script, &done).map_err(|err| HarvestError::io(&script, err))?;
        }
        Ok(())
    }

    async fn run_hooks(&self, release: &Release, hooks: &[String], phase: &str) -> Result<()> {
        if hooks.is_empty() {
            return Ok(());
        }

        info!(phase, "Running hooks");
        for hook in hooks {
            info!(command = %hook, "- Hook");
            CommandRunner::run_shell(hook, &release.path, step_timeout()).await?;
        }
        Ok(())
    }

    /// Best-effort removal of a half-built release
    fn cleanup_failed_release(&self, release: &Release) {
        info!(release = %release.id, "Cleaning up failed deployment");
        if let Err(err) = remove_tree(&release.path) {
            warn!(error = %err, "Failed to clean up release directory");
        }
    }

    fn prune_old_releases(&self) -> Result<()> {
        let store = ReleaseStore::new(&self.paths);
        let releases = store.list_releases()?;
        let current = store.resolve_current_release()?;
        retention::prune(
            &releases,
            self.app.releases_to_keep,
            current.as_ref().map(|release| &release.id),
        )?;
        Ok(())
    }
}

fn step_timeout() -> Duration {
    Duration::from_secs(STEP_TIMEOUT_SECS)
}

/// `deploy-scripts/*.php`, in name order for a deterministic run sequence
fn pending_scripts(scripts_dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(scripts_dir).map_err(|err| HarvestError::io(scripts_dir, err))?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| HarvestError::io(scripts_dir, err))?;
        let path = entry.path();
        let is_php = path
            .extension()
            .map(|ext| ext == "php")
            .unwrap_or(false);
        // `is_file` follows symlinks, so a linked script still counts.
        if is_php && path.is_file() {
            scripts.push(path);
        }
    }
    scripts.sort();
    Ok(scripts)
}
