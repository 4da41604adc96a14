use async_trait::async_trait;
use mcserver_core::{
    ConsoleSink, ControlChannel, ProcessHandle, ProcessId, ProcessInfo, ProcessLauncher,
    ProcessStatus, Result, TerminationResult, spawn_console_forwarder,
};
use std::path::Path;
use std::process::Stdio;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

/// Windows-specific handle to the server process
pub struct WindowsProcessHandle {
    child: Child,
    pid: Option<ProcessId>,
    command: String,
    args: Vec<String>,
    channel: ControlChannel<ChildStdin>,
}

impl WindowsProcessHandle {
    fn new(
        child: Child,
        channel: ControlChannel<ChildStdin>,
        command: String,
        args: Vec<String>,
    ) -> Self {
        Self {
            pid: child.id(),
            child,
            command,
            args,
            channel,
        }
    }
}

#[async_trait]
impl ProcessHandle for WindowsProcessHandle {
    fn get_pid(&self) -> Option<ProcessId> {
        self.pid
    }

    fn get_command(&self) -> &str {
        &self.command
    }

    fn get_args(&self) -> &[String] {
        &self.args
    }

    fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(pid = ?self.pid, status = %status, "Windows process is no longer running");
                false
            }
            Err(e) => {
                warn!(pid = ?self.pid, error = %e, "Failed to poll Windows process");
                false
            }
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.channel.send(line).await
    }

    async fn wait(&mut self) -> Result<ProcessStatus> {
        let status = self.child.wait().await?;
        self.channel.close();
        Ok(ProcessStatus::from(status))
    }

    async fn kill(&mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}

/// Windows-specific launcher with process tree termination
pub struct WindowsProcessLauncher {
    system: std::sync::Mutex<System>,
}

impl WindowsProcessLauncher {
    pub fn new() -> Self {
        info!("Initializing Windows process launcher");
        Self {
            system: std::sync::Mutex::new(System::new()),
        }
    }

    /// Use taskkill with /T to terminate the process tree
    async fn taskkill_tree(&self, pid: ProcessId) -> std::io::Result<bool> {
        let output = Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .output()
            .await?;

        Ok(output.status.success())
    }
}

impl Default for WindowsProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLauncher for WindowsProcessLauncher {
    type Handle = WindowsProcessHandle;

    async fn spawn_process(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        console: ConsoleSink,
    ) -> Result<WindowsProcessHandle> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW
            cmd.creation_flags(0x08000000);
        }

        let mut child = cmd.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("server stdin was not captured"))?;

        if let Some(stdout) = child.stdout.take() {
            spawn_console_forwarder(stdout, console.clone(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_console_forwarder(stderr, console, "stderr");
        }

        if let Some(pid) = child.id() {
            info!(
                pid = %pid,
                command = %command,
                args = ?args,
                "Spawned Windows process"
            );
        }

        Ok(WindowsProcessHandle::new(
            child,
            ControlChannel::new(stdin),
            command.to_string(),
            args.to_vec(),
        ))
    }

    async fn force_kill(&self, handle: &mut WindowsProcessHandle) -> TerminationResult {
        let Some(pid) = handle.get_pid() else {
            return TerminationResult::ProcessNotFound;
        };

        match self.taskkill_tree(pid).await {
            Ok(true) => {
                info!(pid = %pid, "Successfully force killed process tree");
                TerminationResult::Success
            }
            Ok(false) => {
                warn!(pid = %pid, "taskkill could not terminate process tree");
                TerminationResult::Failed(format!("taskkill failed for PID {pid}"))
            }
            Err(e) => {
                warn!(pid = %pid, error = %e, "taskkill unavailable, killing process directly");
                match handle.kill().await {
                    Ok(()) => TerminationResult::Success,
                    Err(e) => TerminationResult::Failed(format!("Force kill failed: {e}")),
                }
            }
        }
    }

    fn process_info(&self, handle: &WindowsProcessHandle) -> Option<ProcessInfo> {
        let pid = handle.get_pid()?;
        let sys_pid = Pid::from_u32(pid);

        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        let process = system.process(sys_pid)?;

        Some(ProcessInfo {
            pid,
            command: handle.get_command().to_string(),
            args: handle.get_args().to_vec(),
            status: ProcessStatus::Running,
            memory_bytes: Some(process.memory()),
        })
    }
}
