use async_trait::async_trait;
use mcserver_core::{
    ConsoleSink, ControlChannel, ProcessHandle, ProcessId, ProcessInfo, ProcessLauncher,
    ProcessStatus, Result, TerminationResult,
};
use std::path::Path;

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use mcserver_core::spawn_console_forwarder;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use std::process::Stdio;
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
    use tokio::process::{Child, ChildStdin, Command};
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    /// Unix-specific handle to the server process
    pub struct UnixProcessHandle {
        child: Child,
        pid: Option<ProcessId>,
        command: String,
        args: Vec<String>,
        channel: ControlChannel<ChildStdin>,
        console: Vec<JoinHandle<()>>,
    }

    impl UnixProcessHandle {
        fn new(
            child: Child,
            channel: ControlChannel<ChildStdin>,
            console: Vec<JoinHandle<()>>,
            command: String,
            args: Vec<String>,
        ) -> Self {
            Self {
                pid: child.id(),
                child,
                command,
                args,
                channel,
                console,
            }
        }
    }

    #[async_trait]
    impl ProcessHandle for UnixProcessHandle {
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
                    debug!(pid = ?self.pid, status = %status, "Unix process is no longer running");
                    false
                }
                Err(e) => {
                    warn!(pid = ?self.pid, error = %e, "Failed to poll Unix process");
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
            // Forwarders finish on their own once the pipes hit EOF.
            self.console.retain(|task| !task.is_finished());
            Ok(ProcessStatus::from(status))
        }

        async fn kill(&mut self) -> Result<()> {
            self.child.kill().await?;
            Ok(())
        }
    }

    /// Unix-specific launcher: every server runs in its own process group
    pub struct UnixProcessLauncher {
        system: std::sync::Mutex<System>,
    }

    impl UnixProcessLauncher {
        pub fn new() -> Self {
            info!("Initializing Unix process launcher");
            Self {
                system: std::sync::Mutex::new(System::new()),
            }
        }
    }

    impl Default for UnixProcessLauncher {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessLauncher for UnixProcessLauncher {
        type Handle = UnixProcessHandle;

        async fn spawn_process(
            &self,
            command: &str,
            args: &[String],
            working_dir: &Path,
            console: ConsoleSink,
        ) -> Result<UnixProcessHandle> {
            let mut cmd = Command::new(command);
            cmd.args(args)
                .current_dir(working_dir)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                // New process group so a hard kill takes anything the server forked with it
                .process_group(0)
                .kill_on_drop(true);

            let mut child = cmd.spawn()?;

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| std::io::Error::other("server stdin was not captured"))?;

            let mut forwarders = Vec::with_capacity(2);
            if let Some(stdout) = child.stdout.take() {
                forwarders.push(spawn_console_forwarder(stdout, console.clone(), "stdout"));
            }
            if let Some(stderr) = child.stderr.take() {
                forwarders.push(spawn_console_forwarder(stderr, console, "stderr"));
            }

            if let Some(pid) = child.id() {
                info!(
                    "Spawned Unix process: {} (PID: {}) with args: {:?}",
                    command, pid, args
                );
            }

            Ok(UnixProcessHandle::new(
                child,
                ControlChannel::new(stdin),
                forwarders,
                command.to_string(),
                args.to_vec(),
            ))
        }

        async fn force_kill(&self, handle: &mut UnixProcessHandle) -> TerminationResult {
            let Some(pid) = handle.get_pid() else {
                return TerminationResult::ProcessNotFound;
            };
            let Ok(raw) = i32::try_from(pid) else {
                return TerminationResult::Failed(format!("PID {pid} out of range"));
            };

            match signal::killpg(NixPid::from_raw(raw), Signal::SIGKILL) {
                Ok(()) => {
                    info!("Sent SIGKILL to process group {}", pid);
                    TerminationResult::Success
                }
                Err(nix::errno::Errno::ESRCH) => {
                    info!("Process group {} not found (already terminated)", pid);
                    TerminationResult::ProcessNotFound
                }
                Err(nix::errno::Errno::EPERM) => {
                    warn!("Permission denied to kill process group {}", pid);
                    TerminationResult::AccessDenied
                }
                Err(e) => {
                    warn!("Failed to send SIGKILL to process group {}: {}", pid, e);
                    TerminationResult::Failed(format!("SIGKILL failed: {e}"))
                }
            }
        }

        fn process_info(&self, handle: &UnixProcessHandle) -> Option<ProcessInfo> {
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
}

// Re-export the Unix implementation when on Unix systems
#[cfg(unix)]
pub use unix_impl::{UnixProcessHandle, UnixProcessLauncher};

// Provide stub implementations for non-Unix systems
#[cfg(not(unix))]
pub struct UnixProcessHandle;

#[cfg(not(unix))]
pub struct UnixProcessLauncher;

#[cfg(not(unix))]
impl UnixProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(unix))]
impl Default for UnixProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    const FAKE_CONSOLE: &str = r#"
echo ready
while IFS= read -r line; do
  case "$line" in
    stop) echo "Stopping server"; exit 0 ;;
    *) echo "got $line" ;;
  esac
done
"#;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_commands_reach_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = UnixProcessLauncher::new();
        let (sink_writer, sink_reader) = tokio::io::duplex(1024);
        let console = ConsoleSink::new(Box::new(sink_writer));

        let mut handle = launcher
            .spawn_process("sh", &sh(FAKE_CONSOLE), dir.path(), console)
            .await
            .unwrap();
        assert!(handle.get_pid().is_some());
        assert!(handle.is_running());

        handle.send_line("say hi").await.unwrap();

        let mut lines = BufReader::new(sink_reader).lines();
        let mut seen = Vec::new();
        while seen.len() < 2 {
            let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            seen.push(line);
        }
        assert_eq!(seen, vec!["ready", "got say hi"]);

        handle.send_line("stop").await.unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status, ProcessStatus::Exited(0));
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_force_kill_terminates_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = UnixProcessLauncher::new();

        let mut handle = launcher
            .spawn_process("sh", &sh("sleep 30 & wait"), dir.path(), ConsoleSink::discard())
            .await
            .unwrap();

        assert_eq!(launcher.force_kill(&mut handle).await, TerminationResult::Success);
        let status = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status, ProcessStatus::Terminated);
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = UnixProcessLauncher::new();

        let mut handle = launcher
            .spawn_process("sh", &sh("exit 3"), dir.path(), ConsoleSink::discard())
            .await
            .unwrap();

        let status = handle.wait().await.unwrap();
        assert_eq!(status, ProcessStatus::Exited(3));
        assert!(matches!(
            handle.send_line("list").await,
            Err(mcserver_core::ServerError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_spawn_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = UnixProcessLauncher::new();

        let result = launcher
            .spawn_process(
                "sh",
                &sh(FAKE_CONSOLE),
                &dir.path().join("absent"),
                ConsoleSink::discard(),
            )
            .await;
        assert!(matches!(result, Err(mcserver_core::ServerError::Io(_))));
    }

    #[tokio::test]
    async fn test_process_info_reports_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = UnixProcessLauncher::new();

        let mut handle = launcher
            .spawn_process("sh", &sh(FAKE_CONSOLE), dir.path(), ConsoleSink::discard())
            .await
            .unwrap();

        let info = launcher.process_info(&handle).unwrap();
        assert_eq!(Some(info.pid), handle.get_pid());
        assert_eq!(info.command, "sh");
        assert_eq!(info.status, ProcessStatus::Running);

        launcher.force_kill(&mut handle).await;
        handle.wait().await.unwrap();
    }
}
