// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::{Deployment, StageInstance};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
#[derive(Debug, Clone)]
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration_secs(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print one stage transition.
    pub fn stage(&self, stage: &StageInstance) {
        match self.mode {
            OutputMode::Normal => {
                let attempt = if stage.attempt() > 0 {
                    format!(" (attempt {})", stage.attempt() + 1)
                } else {
                    String::new()
                };
                println!(
                    "  → stage {} {}: {}{}",
                    stage.index(),
                    stage.kind(),
                    stage.status(),
                    attempt
                );
                if let Some(error) = stage.error() {
                    println!("    {}", error.message);
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let event = StageEvent {
                    event: "stage",
                    index: stage.index(),
                    kind: stage.kind().to_string(),
                    status: stage.status().to_string(),
                    attempt: stage.attempt(),
                    error: stage.error().map(|e| e.message.as_str()),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print the failure causes recorded on a finished deployment.
    pub fn failure_detail(&self, deployment: &Deployment) {
        if let Some(cause) = deployment.failure() {
            self.warning(&format!(
                "stage {} failed ({}): {}",
                cause.stage_index, cause.kind, cause.message
            ));
        }
        if deployment.rolled_back() {
            self.progress("  ✓ Rolled back");
        }
        if let Some(cause) = deployment.rollback_failure() {
            self.warning(&format!(
                "rollback of stage {} failed ({}): {}",
                cause.stage_index, cause.kind, cause.message
            ));
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => self.json_line("warning", message, true),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => self.json_line("success", message, false),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => self.json_line("error", message, true),
        }
    }

    fn json_line(&self, event: &str, message: &str, stderr: bool) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.duration_secs(),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct StageEvent<'a> {
    event: &'a str,
    index: u32,
    kind: String,
    status: String,
    attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}
