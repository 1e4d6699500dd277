use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ProcessSpawner;

/// Errors that can occur while running an external tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to run tool process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Tool execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// A program, its arguments and how long it may run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str], timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
        }
    }

    /// Split a command line on whitespace. Returns `None` for a blank line.
    pub fn parse(command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next()?.to_string();
        Some(Self {
            program,
            args: parts.map(str::to_string).collect(),
            timeout,
        })
    }

    /// First argument, used to tell `cargo test` from `cargo clippy`
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs one external tool and converts its native output into a
/// canonical result.
///
/// Implementors supply the parsing and the three degraded outcomes; the
/// provided [`Normalizer::run`] wires them to process execution.
#[async_trait]
pub trait Normalizer: Send + Sync {
    type Output: Send;

    /// Tool label reported in results (e.g. "ruff", "go test")
    fn tool(&self) -> &str;

    fn command(&self) -> &ToolCommand;

    /// Normalize already-captured output. Never fails: malformed
    /// structured output falls back to text heuristics.
    fn parse(&self, output: &str, exit_code: i32) -> Self::Output;

    /// The executable is not installed. Must not block submission.
    fn not_found(&self) -> Self::Output;

    /// The tool exceeded its timeout
    fn timed_out(&self, timeout: Duration) -> Self::Output;

    /// The process could not be run for any other reason
    fn spawn_failed(&self, error: &ToolError) -> Self::Output;

    /// Run the tool in `working_dir` and normalize whatever happened
    async fn run(&self, working_dir: &Path) -> Self::Output {
        match ProcessSpawner::spawn(self.command(), working_dir).await {
            Ok(output) => {
                debug!(tool = self.tool(), exit_code = output.exit_code, "Parsing tool output");
                self.parse(&output.combined_output(), output.exit_code)
            }
            Err(ToolError::NotFound(program)) => {
                warn!(tool = self.tool(), program = %program, "Tool not found, skipping");
                self.not_found()
            }
            Err(ToolError::Timeout(timeout)) => {
                warn!(tool = self.tool(), timeout = ?timeout, "Tool timed out");
                self.timed_out(timeout)
            }
            Err(e) => {
                warn!(tool = self.tool(), error = %e, "Tool failed to run");
                self.spawn_failed(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let cmd = ToolCommand::parse("  cargo clippy --message-format=json ", Duration::from_secs(5))
            .unwrap();
        assert_eq!(cmd.program, "cargo");
        assert_eq!(cmd.subcommand(), Some("clippy"));
        assert_eq!(cmd.display(), "cargo clippy --message-format=json");
    }

    #[test]
    fn test_parse_blank_command_line() {
        assert!(ToolCommand::parse("   ", Duration::from_secs(5)).is_none());
    }
}
