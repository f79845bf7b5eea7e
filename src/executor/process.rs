// ABOUTME: Runs platform CLIs as child processes that stop on cancellation.
// ABOUTME: Classifies exit failures into transient and rejected executor errors.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::cancel::CancelSignal;
use super::error::ExecutorError;

/// Substrings of stderr (lowercased) that mark a failure worth retrying.
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "throttl",
    "too many requests",
    "temporarily unavailable",
    "service unavailable",
];

/// A fully described tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: HashMap<String, String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: HashMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn envs(mut self, envs: HashMap<String, String>) -> Self {
        self.envs.extend(envs);
        self
    }

    /// Program and arguments joined for log lines.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run to completion, or until `cancel` fires.
///
/// On cancellation the child is killed and `ExecutorError::Cancelled` is
/// returned. Failure to spawn (missing binary, bad working directory) is a
/// configuration error.
pub async fn run(
    command: &ToolCommand,
    cancel: &CancelSignal,
) -> Result<ProcessOutput, ExecutorError> {
    if cancel.is_cancelled() {
        return Err(ExecutorError::Cancelled);
    }

    tracing::debug!("running {}", command.display());

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .envs(&command.envs)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = command.cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|e| {
        ExecutorError::configuration(format!(
            "failed to start {}: {e}",
            command.program.display()
        ))
    })?;

    let output = tokio::select! {
        output = child.wait_with_output() => output.map_err(|e| {
            ExecutorError::transient(format!(
                "failed to wait for {}: {e}",
                command.program.display()
            ))
        })?,
        _ = cancel.cancelled() => {
            tracing::info!("cancelled {}", command.program.display());
            return Err(ExecutorError::Cancelled);
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        return Ok(ProcessOutput { stdout, stderr });
    }

    let status = match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    };
    let detail = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
    let message = format!(
        "{} failed with {status}: {}",
        command.program.display(),
        detail.trim()
    );
    Err(classify_failure(&stderr, message))
}

/// Transient when stderr carries a known marker, rejected otherwise.
pub fn classify_failure(stderr: &str, message: String) -> ExecutorError {
    let lower = stderr.to_lowercase();
    if TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ExecutorError::Transient(message)
    } else {
        ExecutorError::PlatformRejected(message)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::CancelHandle;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = run(&sh("echo hello"), &CancelSignal::never()).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_rejected() {
        let err = run(&sh("echo denied >&2; exit 3"), &CancelSignal::never())
            .await
            .unwrap_err();
        let ExecutorError::PlatformRejected(message) = err else {
            panic!("expected rejection, got {err:?}");
        };
        assert!(message.contains("exit code 3"));
        assert!(message.contains("denied"));
    }

    #[tokio::test]
    async fn timeout_in_stderr_is_transient() {
        let err = run(&sh("echo 'dial tcp: i/o timeout' >&2; exit 1"), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_binary_is_configuration() {
        let err = run(
            &ToolCommand::new("/nonexistent/stagehand-tool"),
            &CancelSignal::never(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExecutorError::Configuration(_)));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let handle = CancelHandle::new();
        let signal = handle.signal();
        let started = Instant::now();
        let task = tokio::spawn(async move { run(&sh("sleep 30"), &signal).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();

        let res = task.await.unwrap();
        assert!(matches!(res, Err(ExecutorError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
