use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Verification family a tool belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Tests,
    Lint,
    Typecheck,
}

impl ToolKind {
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Tests => "tests",
            ToolKind::Lint => "lint",
            ToolKind::Typecheck => "typecheck",
        }
    }
}

/// Structured log events for the collect-and-submit pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SubmitStarted {
        task: String,
        working_dir: PathBuf,
    },
    DiffParsed {
        files_changed: usize,
        additions: usize,
        deletions: usize,
        language: String,
    },
    ToolStarted {
        kind: ToolKind,
        tool: String,
    },
    ToolCompleted {
        kind: ToolKind,
        tool: String,
        passed: bool,
        /// Failures, lint errors or type errors
        issues: usize,
        duration_secs: f64,
    },
    TraceSubmitted {
        trace_id: Option<String>,
    },
    SubmitFailed {
        error: String,
    },
    BatchCompleted {
        submitted: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for pipeline events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger that also appends JSON lines to `log_path`
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SubmitStarted { task, working_dir } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {}",
                    "▶".bright_blue(),
                    "cert-code".bold().bright_white()
                );
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "Task:".dimmed(),
                    Self::truncate(task, 70).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "Dir:".dimmed(),
                    working_dir.display().to_string().dimmed()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::DiffParsed {
                files_changed,
                additions,
                deletions,
                language,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {} {}, {}, {} ({})",
                    "📁".dimmed(),
                    "Diff:".dimmed(),
                    files_changed,
                    if *files_changed == 1 { "file" } else { "files" },
                    format!("+{}", additions).green(),
                    format!("-{}", deletions).red(),
                    language
                );
            }
            LogEvent::ToolStarted { kind, tool } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_cyan(),
                    kind.label().to_uppercase().bright_cyan().bold(),
                    tool.dimmed()
                );
            }
            LogEvent::ToolCompleted {
                passed,
                issues,
                duration_secs,
                ..
            } => {
                if *passed {
                    let _ = writeln!(
                        stderr,
                        "    {} Passed ({:.1}s)",
                        "✓".bright_green(),
                        duration_secs
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} Failed, {} {} ({:.1}s)",
                        "✗".bright_red(),
                        issues,
                        if *issues == 1 { "issue" } else { "issues" },
                        duration_secs
                    );
                }
            }
            LogEvent::TraceSubmitted { trace_id } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Trace submitted: {}",
                    "✓".bright_green(),
                    trace_id.as_deref().unwrap_or("(no id)").bright_white()
                );
            }
            LogEvent::SubmitFailed { error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Submission failed: {}",
                    "✗".bright_red(),
                    error.bright_red()
                );
            }
            LogEvent::BatchCompleted {
                submitted,
                failed,
                duration_secs,
            } => {
                let status = if *failed == 0 {
                    "✓".bright_green()
                } else {
                    "⚠".bright_yellow()
                };
                let _ = writeln!(
                    stderr,
                    "{} Batch: {} submitted, {} failed ({:.1}s)",
                    status, submitted, failed, duration_secs
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::SubmitStarted { .. } => format!("[{}] submit:start", timestamp),
            LogEvent::DiffParsed {
                files_changed,
                additions,
                deletions,
                language,
            } => format!(
                "[{}] diff:{} {}f +{} -{}",
                timestamp, language, files_changed, additions, deletions
            ),
            LogEvent::ToolStarted { kind, tool } => {
                format!("[{}] {}:start {}", timestamp, kind.label(), tool)
            }
            LogEvent::ToolCompleted {
                kind,
                passed,
                issues,
                duration_secs,
                ..
            } => format!(
                "[{}] {}:done passed={} issues={} {:.1}s",
                timestamp,
                kind.label(),
                passed,
                issues,
                duration_secs
            ),
            LogEvent::TraceSubmitted { trace_id } => format!(
                "[{}] submit:done {}",
                timestamp,
                trace_id.as_deref().unwrap_or("-")
            ),
            LogEvent::SubmitFailed { error } => format!("[{}] submit:error {}", timestamp, error),
            LogEvent::BatchCompleted {
                submitted, failed, ..
            } => format!("[{}] batch:done ok={} failed={}", timestamp, submitted, failed),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate to `max_len` characters with an ellipsis
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        }
    }
}
