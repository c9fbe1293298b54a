// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes; renders stage progress.

use crate::deploy::{DeployError, Stage, StageObserver, StageOutcome, StageRecord};
use serde::Serialize;
use std::time::Instant;

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

    pub fn mode(&self) -> OutputMode {
        self.mode
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

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a plain line of command output. Printed in every mode except JSON,
    /// where it becomes a `line` event.
    pub fn line(&self, line: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => println!("{line}"),
            OutputMode::Json => self.emit(&JsonEvent::new("line", line)),
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
            OutputMode::Json => {
                let mut event = JsonEvent::new("success", message);
                event.duration_secs = self.duration();
                self.emit(&event);
            }
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => self.emit(&JsonEvent::new("warning", message)),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let mut event = JsonEvent::new("error", message);
                event.duration_secs = self.duration();
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print any serializable value as one JSON line (JSON mode only).
    pub fn json<T: Serialize>(&self, value: &T) {
        if self.mode == OutputMode::Json
            && let Ok(json) = serde_json::to_string(value)
        {
            println!("{json}");
        }
    }

    fn emit(&self, event: &JsonEvent<'_>) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }
}

impl StageObserver for Output {
    fn stage_started(&self, stage: Stage) {
        self.progress(&format!("  → {}...", capitalize(stage.description())));
    }

    fn stage_finished(&self, record: &StageRecord) {
        let name = capitalize(record.stage.description());
        match self.mode {
            OutputMode::Normal => match &record.outcome {
                StageOutcome::Completed => println!("  ✓ {name}"),
                StageOutcome::Skipped => println!("  - {name} (skipped)"),
                StageOutcome::Simulated => println!("  ✓ {name} (simulated)"),
                StageOutcome::Warned(message) => println!("  ! {name}: {message}"),
            },
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let mut event = JsonEvent::stage(record);
                event.duration_secs = self.duration();
                self.emit(&event);
            }
        }
    }

    /// The error itself is reported once, by the caller.
    fn stage_failed(&self, stage: Stage, _error: &DeployError) {
        if self.mode == OutputMode::Normal {
            eprintln!("{}", failure_line(stage));
        }
    }
}

fn failure_line(stage: Stage) -> String {
    format!("  ✗ {}", capitalize(stage.description()))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(flatten)]
    stage: Option<&'a StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

impl<'a> JsonEvent<'a> {
    fn new(event: &'a str, message: &'a str) -> Self {
        Self {
            event,
            message: Some(message),
            stage: None,
            duration_secs: None,
        }
    }

    fn stage(record: &'a StageRecord) -> Self {
        Self {
            event: "stage",
            message: None,
            stage: Some(record),
            duration_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalizes_descriptions() {
        assert_eq!(capitalize("uploading files"), "Uploading files");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn failure_line_names_only_the_stage() {
        assert_eq!(failure_line(Stage::Backup), "  ✗ Backing up current deployment");
        assert!(!failure_line(Stage::Upload).contains(':'));
    }

    #[test]
    fn stage_event_flattens_record() {
        let record = StageRecord::new(Stage::Upload, StageOutcome::Completed);
        let event = JsonEvent::stage(&record);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "stage", "stage": "upload", "outcome": "completed"})
        );
    }

    #[test]
    fn timer_is_zero_until_started() {
        let mut output = Output::new(OutputMode::Quiet);
        assert_eq!(output.elapsed_secs(), 0.0);
        assert!(output.duration().is_none());
        output.start_timer();
        assert!(output.duration().is_some());
    }
}
