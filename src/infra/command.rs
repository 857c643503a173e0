//! External command execution
//!
//! One synchronous-in-spirit runner for every pipeline step: run a program
//! (or a raw shell line for hooks) in a working directory, wait for it under
//! a timeout, and fold any failure into a `Process` error carrying the
//! command text and exit code. A command that outlives its timeout is killed
//! and reaped before the error is returned, so no child can keep writing
//! into a release directory the caller is about to remove.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{HarvestError, Result};

/// Command executor
pub struct CommandRunner;

impl CommandRunner {
    /// Run a program with arguments, failing on a non-zero exit
    pub async fn run(
        program: &str,
        args: &[&str],
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<()> {
        let command_text = render_command(program, args);
        let mut command = Command::new(program);
        command.args(args).current_dir(work_dir);
        Self::execute(command, &command_text, timeout).await
    }

    /// Run a raw shell line with `sh -c`, used for hooks and custom commands
    pub async fn run_shell(line: &str, work_dir: &Path, timeout: Duration) -> Result<()> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(line).current_dir(work_dir);
        Self::execute(command, line, timeout).await
    }

    async fn execute(mut command: Command, command_text: &str, timeout: Duration) -> Result<()> {
        debug!(command = %command_text, "Running command");

        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = command.spawn().map_err(|err| {
            HarvestError::process(command_text, None, format!("failed to start: {}", err))
        })?;

        // Drain both pipes concurrently so a chatty build tool cannot fill
        // the pipe buffer and stall.
        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let status = tokio::select! {
            status = child.wait() => {
                status.map_err(|err| {
                    HarvestError::process(
                        command_text,
                        None,
                        format!("failed to wait for command: {}", err),
                    )
                })?
            }
            _ = tokio::time::sleep(timeout) => {
                error!(command = %command_text, "Command timed out after {:?}", timeout);
                let _ = child.kill().await;
                // Reap before returning so the child is actually gone.
                let _ = child.wait().await;
                return Err(HarvestError::process(
                    command_text,
                    None,
                    format!("timed out after {}s", timeout.as_secs()),
                ));
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        Self::check(command_text, status, &stdout, &stderr)
    }

    fn check(command_text: &str, status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Result<()> {
        if !stdout.is_empty() {
            debug!(command = %command_text, "stdout: {}", String::from_utf8_lossy(stdout).trim_end());
        }
        if !stderr.is_empty() {
            debug!(command = %command_text, "stderr: {}", String::from_utf8_lossy(stderr).trim_end());
        }

        if status.success() {
            return Ok(());
        }

        let detail = {
            let stderr = String::from_utf8_lossy(stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                String::from_utf8_lossy(stdout).trim().to_string()
            } else {
                stderr.to_string()
            }
        };

        Err(HarvestError::process(command_text, status.code(), detail))
    }
}

async fn read_stream<R>(stream: Option<R>) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buffer).await;
    }
    buffer
}

fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_success() {
        let result = CommandRunner::run(
            "true",
            &[],
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_carries_code() {
        let result = CommandRunner::run_shell(
            "exit 3",
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await;

        match result {
            Err(HarvestError::Process { command, code, .. }) => {
                assert_eq!(command, "exit 3");
                assert_eq!(code, Some(3));
            }
            other => panic!("expected process failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let result = CommandRunner::run(
            "nonexistent_command_12345",
            &[],
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(
            result,
            Err(HarvestError::Process { code: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let result = CommandRunner::run_shell(
            "sleep 5",
            &PathBuf::from("/tmp"),
            Duration::from_millis(100),
        )
        .await;

        match result {
            Err(HarvestError::Process { code, detail, .. }) => {
                assert_eq!(code, None);
                assert!(detail.contains("timed out"));
            }
            other => panic!("expected timeout failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_the_child() {
        let tmp = TempDir::new().unwrap();
        let marker = tmp.path().join("still-alive");
        let line = format!("sleep 1 && touch {}", marker.display());

        let result =
            CommandRunner::run_shell(&line, tmp.path(), Duration::from_millis(100)).await;
        assert!(matches!(
            result,
            Err(HarvestError::Process { code: None, .. })
        ));

        // If the child had survived the timeout it would create the marker
        // once its sleep finishes.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_failure_detail_prefers_stderr() {
        let result = CommandRunner::run_shell(
            "echo out; echo err >&2; exit 1",
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await;

        match result {
            Err(HarvestError::Process { detail, .. }) => assert_eq!(detail, "err"),
            other => panic!("expected process failure, got {:?}", other),
        }
    }

    #[test]
    fn test_render_command() {
        assert_eq!(
            render_command("composer", &["install", "--no-dev"]),
            "composer install --no-dev"
        );
        assert_eq!(render_command("true", &[]), "true");
    }
}
