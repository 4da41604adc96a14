use crate::error::{Result, ServerError};
use crate::stdio::ConsoleSink;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Unique identifier for a process
pub type ProcessId = u32;

/// Status of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process is currently running
    Running,
    /// Process exited with the given exit code
    Exited(i32),
    /// Process was terminated by a signal (Unix) or forcibly terminated (Windows)
    Terminated,
}

impl From<std::process::ExitStatus> for ProcessStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        status
            .code()
            .map_or(ProcessStatus::Terminated, ProcessStatus::Exited)
    }
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Permission denied (insufficient privileges)
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

/// Information about a running process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub command: String,
    pub args: Vec<String>,
    pub status: ProcessStatus,
    /// Resident memory in bytes, when the platform could report it
    pub memory_bytes: Option<u64>,
}

/// Handle to the spawned server process
///
/// The handle owns the process's standard input; lines written through
/// [`ProcessHandle::send_line`] are the only way to talk to the server.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID recorded at spawn time
    fn get_pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn get_command(&self) -> &str;

    /// Get the arguments passed to this process
    fn get_args(&self) -> &[String];

    /// Poll whether the process is still alive (non-blocking, never cached)
    fn is_running(&mut self) -> bool;

    /// Write one command line to the process's input stream
    async fn send_line(&mut self, line: &str) -> Result<()>;

    /// Wait for the process to exit (blocking)
    async fn wait(&mut self) -> Result<ProcessStatus>;

    /// Kill the process through the handle itself
    async fn kill(&mut self) -> Result<()>;
}

/// Platform-specific spawning and termination of the server process
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// The type of process handle this launcher produces
    type Handle: ProcessHandle;

    /// Spawn the server with piped stdio, forwarding its output to `console`
    async fn spawn_process(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        console: ConsoleSink,
    ) -> Result<Self::Handle>;

    /// Hard-stop the process without giving it a chance to save
    async fn force_kill(&self, handle: &mut Self::Handle) -> TerminationResult;

    /// Get detailed information about a process
    fn process_info(&self, handle: &Self::Handle) -> Option<ProcessInfo>;

    /// Wait for a process to exit with optional timeout
    async fn wait_for_exit(
        &self,
        handle: &mut Self::Handle,
        timeout: Option<Duration>,
    ) -> Result<ProcessStatus> {
        match timeout {
            Some(duration) => tokio::time::timeout(duration, handle.wait())
                .await
                .map_err(|_| {
                    ServerError::Timeout(format!(
                        "process did not exit within {}ms",
                        duration.as_millis()
                    ))
                })?,
            None => handle.wait().await,
        }
    }
}

/// Factory trait for creating platform-specific launchers
pub trait ProcessLauncherFactory {
    /// The type of launcher this factory creates
    type Launcher: ProcessLauncher;

    /// Create a launcher for the current platform
    fn create_launcher() -> Self::Launcher;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_status_from_exit_status() {
        use std::os::unix::process::ExitStatusExt;

        let exited = std::process::ExitStatus::from_raw(3 << 8);
        assert_eq!(ProcessStatus::from(exited), ProcessStatus::Exited(3));

        // SIGKILL
        let signalled = std::process::ExitStatus::from_raw(9);
        assert_eq!(ProcessStatus::from(signalled), ProcessStatus::Terminated);
    }
}
