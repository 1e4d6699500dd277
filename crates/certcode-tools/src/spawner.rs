use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{ToolCommand, ToolError, ToolOutput};

/// Utility for running external tools
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Run a command to completion under its timeout and capture its output.
    ///
    /// A missing executable maps to [`ToolError::NotFound`]. On timeout the
    /// child is killed when its handle is dropped.
    pub async fn spawn(command: &ToolCommand, working_dir: &Path) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();

        debug!(
            program = %command.program,
            args = ?command.args,
            working_dir = %working_dir.display(),
            timeout_secs = command.timeout.as_secs(),
            "Spawning tool process"
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound(command.program.clone()),
            _ => ToolError::SpawnFailed(e),
        })?;

        let output = match tokio::time::timeout(command.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(program = %command.program, "Tool process timed out");
                return Err(ToolError::Timeout(command.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        trace!(stdout = %stdout, stderr = %stderr, "Tool output");

        let duration = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            program = %command.program,
            exit_code,
            duration_ms = duration.as_millis(),
            "Tool process completed"
        );

        Ok(ToolOutput::new(stdout, stderr, exit_code, duration))
    }
}
