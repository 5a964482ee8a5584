//! External registration process execution.

use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

/// Result of one process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the process exited successfully.
    pub success: bool,
}

impl ProcessOutput {
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Last non-empty line of stdout, trimmed.
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
    }
}

/// Run `command` to completion, optionally bounded by `timeout_secs` (0 = none).
///
/// The child is killed when the timeout elapses.
pub async fn execute(command: &[String], timeout_secs: u64) -> anyhow::Result<ProcessOutput> {
    let start = Instant::now();

    let Some((exe, args)) = command.split_first() else {
        anyhow::bail!("registrar command is empty");
    };

    let child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow::anyhow!("failed to spawn {exe}: {e}"))?;

    let output = if timeout_secs > 0 {
        tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("{exe} timed out after {timeout_secs} seconds"))??
    } else {
        child.wait_with_output().await?
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    tracing::debug!(exe = %exe, exit_code, duration_ms, "registrar process finished");

    Ok(ProcessOutput {
        exit_code,
        stdout,
        stderr,
        duration_ms,
        success: output.status.success(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_last_line_skips_trailing_blanks() {
        let output = ProcessOutput {
            exit_code: 0,
            stdout: "loading\n{\"a\":1}\n\n  \n".to_string(),
            stderr: String::new(),
            duration_ms: 1,
            success: true,
        };
        assert!(output.passed());
        assert_eq!(output.last_line(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let result = execute(&sh("echo hello"), 60).await.expect("execute failed");
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.last_line(), Some("hello"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let result = execute(&sh("echo boom >&2; exit 3"), 60)
            .await
            .expect("execute failed");
        assert!(!result.passed());
        assert_eq!(result.exit_code, 3);
        assert!(result.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn test_execute_empty_command_errors() {
        assert!(execute(&[], 0).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let err = execute(&sh("sleep 5"), 1).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
