use std::time::Duration;

/// Output captured from an external tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, -1 when the process was killed by a signal
    pub exit_code: i32,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    /// Check if the tool exited successfully
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout and stderr joined by a newline, the text every parser sees
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}
