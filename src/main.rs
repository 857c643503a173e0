//! Harvest - zero-downtime release deployment CLI
//!
//! Usage:
//! - Deploy the default application: `harvest deploy`
//! - Deploy a named application:     `harvest deploy my-app --branch production`
//! - Roll back one release:          `harvest rollback my-app`
//! - Roll back to a named release:   `harvest rollback my-app --release 20240101000000`
//! - List releases:                  `harvest releases my-app`

use harvest::config::Config;
use harvest::domain::release::AppPaths;
use harvest::services::{DeployOptions, DeployService, ReleaseStore, RollbackService};

enum Command {
    Deploy {
        app: Option<String>,
        options: DeployOptions,
    },
    Rollback {
        app: Option<String>,
        release: Option<String>,
    },
    Releases {
        app: Option<String>,
    },
    Help,
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> Option<Command> {
    if args.len() < 2 {
        return None;
    }

    match args[1].as_str() {
        "--help" | "-h" | "help" => Some(Command::Help),
        "deploy" => {
            let mut app = None;
            let mut options = DeployOptions::default();
            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--branch" | "-b" if i + 1 < args.len() => {
                        options.branch = Some(args[i + 1].clone());
                        i += 2;
                    }
                    "--no-tests" => {
                        options.skip_tests = true;
                        i += 1;
                    }
                    "--no-migrations" => {
                        options.skip_migrations = true;
                        i += 1;
                    }
                    "--force" | "-f" => {
                        options.force = true;
                        i += 1;
                    }
                    "--help" | "-h" => return Some(Command::Help),
                    value if !value.starts_with('-') && app.is_none() => {
                        app = Some(value.to_string());
                        i += 1;
                    }
                    _ => return None,
                }
            }
            Some(Command::Deploy { app, options })
        }
        "rollback" => {
            let mut app = None;
            let mut release = None;
            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--release" | "-r" if i + 1 < args.len() => {
                        release = Some(args[i + 1].clone());
                        i += 2;
                    }
                    "--help" | "-h" => return Some(Command::Help),
                    value if !value.starts_with('-') && app.is_none() => {
                        app = Some(value.to_string());
                        i += 1;
                    }
                    _ => return None,
                }
            }
            Some(Command::Rollback { app, release })
        }
        "releases" => {
            let mut app = None;
            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--help" | "-h" => return Some(Command::Help),
                    value if !value.starts_with('-') && app.is_none() => {
                        app = Some(value.to_string());
                        i += 1;
                    }
                    _ => return None,
                }
            }
            Some(Command::Releases { app })
        }
        _ => None,
    }
}

fn print_help() {
    println!("Harvest - zero-downtime release deployment");
    println!();
    println!("USAGE:");
    println!("    harvest <COMMAND> [APP] [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    deploy       Deploy a new release");
    println!("    rollback     Roll back to a previous release");
    println!("    releases     List all releases");
    println!();
    println!("DEPLOY OPTIONS:");
    println!("    -b, --branch <BRANCH>   Deploy this branch instead of the configured one");
    println!("    --no-tests              Skip running tests");
    println!("    --no-migrations         Skip running migrations");
    println!("    -f, --force             Continue even if tests fail");
    println!();
    println!("ROLLBACK OPTIONS:");
    println!("    -r, --release <ID>      Roll back to this specific release");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help              Show this help and exit");
    println!();
    println!("EXAMPLES:");
    println!("    harvest deploy                          # Deploy the default application");
    println!("    harvest deploy my-app -b production     # Deploy a branch");
    println!("    harvest rollback my-app                 # Back to the previous release");
    println!("    harvest releases my-app                 # Show what is on disk");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn test_parse_help_flag() {
        assert!(matches!(
            parse_args(&args(&["harvest", "--help"])),
            Some(Command::Help)
        ));
        assert!(matches!(
            parse_args(&args(&["harvest", "-h"])),
            Some(Command::Help)
        ));
        assert!(matches!(
            parse_args(&args(&["harvest", "deploy", "--help"])),
            Some(Command::Help)
        ));
        assert!(matches!(
            parse_args(&args(&["harvest", "rollback", "-h"])),
            Some(Command::Help)
        ));
    }

    #[test]
    fn test_parse_deploy_flags() {
        let parsed = parse_args(&args(&[
            "harvest",
            "deploy",
            "my-app",
            "-b",
            "production",
            "--no-tests",
        ]));
        match parsed {
            Some(Command::Deploy { app, options }) => {
                assert_eq!(app.as_deref(), Some("my-app"));
                assert_eq!(options.branch.as_deref(), Some("production"));
                assert!(options.skip_tests);
                assert!(!options.force);
            }
            _ => panic!("expected a deploy command"),
        }
    }

    #[test]
    fn test_parse_rollback_release() {
        let parsed = parse_args(&args(&["harvest", "rollback", "-r", "20240101000000"]));
        match parsed {
            Some(Command::Rollback { app, release }) => {
                assert_eq!(app, None);
                assert_eq!(release.as_deref(), Some("20240101000000"));
            }
            _ => panic!("expected a rollback command"),
        }
    }

    #[test]
    fn test_unknown_arguments_are_rejected() {
        assert!(parse_args(&args(&["harvest", "frobnicate"])).is_none());
        assert!(parse_args(&args(&["harvest", "deploy", "--frobnicate"])).is_none());
        assert!(parse_args(&args(&["harvest"])).is_none());
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = parse_args(&args) else {
        print_help();
        std::process::exit(2);
    };
    if let Command::Help = command {
        print_help();
        return;
    }

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    if let Err(err) = rt.block_on(run(command)) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> harvest::error::Result<()> {
    let config = Config::load()?;

    match command {
        // Handled before the runtime starts.
        Command::Help => print_help(),
        Command::Deploy { app, options } => {
            let app = config.application(app.as_deref())?;
            println!("Deploying application: {}", app.name);
            println!("Repository: {}", app.repository);
            println!(
                "Branch: {}",
                options.branch.as_deref().unwrap_or(&app.branch)
            );

            let service = DeployService::new(app, &config);
            let release = service.deploy(&options).await?;

            println!(
                "Application {} has been successfully deployed (release {})",
                app.name, release.id
            );
        }
        Command::Rollback { app, release } => {
            let app = config.application(app.as_deref())?;
            println!("Rolling back application: {}", app.name);

            let paths = AppPaths::new(&app.path);
            let release = RollbackService::new(&paths).rollback(release.as_deref())?;

            println!(
                "Application {} has been rolled back to release: {}",
                app.name, release.id
            );
        }
        Command::Releases { app } => {
            let app = config.application(app.as_deref())?;
            let paths = AppPaths::new(&app.path);
            let store = ReleaseStore::new(&paths);

            let releases = store.list_releases()?;
            if releases.is_empty() {
                println!("No releases found for {}", app.name);
                return Ok(());
            }
            let current = store.resolve_current_release()?;

            println!("Releases for application: {}", app.name);
            println!("{:>3}  {:<16} {:<20} {}", "#", "Release", "Date", "Current");
            for (index, release) in releases.iter().enumerate() {
                let is_current = current
                    .as_ref()
                    .map(|c| c.id == release.id)
                    .unwrap_or(false);
                println!(
                    "{:>3}  {:<16} {:<20} {}",
                    index + 1,
                    release.id,
                    release.created_at().format("%Y-%m-%d %H:%M:%S"),
                    if is_current { "Yes" } else { "No" }
                );
            }
        }
    }

    Ok(())
}
