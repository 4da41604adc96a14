use crate::backup;
use crate::cleaner::clean_dir;
use crate::config::ServerConfig;
use crate::control::STOP;
use crate::error::{Result, ServerError};
use crate::fetcher::ArtifactFetcher;
use crate::process::{ProcessHandle, ProcessId, ProcessLauncher, ProcessStatus, TerminationResult};
use crate::stdio::ConsoleSink;
use crate::wrappers::{Lifecycle, force_stop_first, restart_around, with_save_guard};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Snapshot of the managed server as seen by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum ServerStatus {
    Stopped,
    Running {
        pid: Option<ProcessId>,
        memory_bytes: Option<u64>,
    },
}

impl ServerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServerStatus::Running { .. })
    }
}

/// Owner of the single managed server process
///
/// Every operation takes `&mut self`: there is one process slot and callers
/// must not interleave operations on it. Wrap the manager in
/// a mutex-guarded façade when it is shared between request handlers.
pub struct ServerManager<L: ProcessLauncher> {
    config: ServerConfig,
    launcher: Arc<L>,
    fetcher: Arc<dyn ArtifactFetcher>,
    console: ConsoleSink,
    process: Option<L::Handle>,
}

impl<L: ProcessLauncher> ServerManager<L> {
    pub fn new(
        config: ServerConfig,
        launcher: Arc<L>,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            launcher,
            fetcher,
            console: ConsoleSink::discard(),
            process: None,
        })
    }

    /// Forward the server's console output to `console`
    pub fn with_console(mut self, console: ConsoleSink) -> Self {
        self.console = console;
        self
    }

    /// Takes effect from the next start
    pub fn set_console(&mut self, console: ConsoleSink) {
        self.console = console;
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// True iff a process was started and has not exited yet. Polled on
    /// every call since the server can die at any moment.
    pub fn is_running(&mut self) -> bool {
        self.process.as_mut().is_some_and(|h| h.is_running())
    }

    pub fn status(&mut self) -> ServerStatus {
        if !self.is_running() {
            return ServerStatus::Stopped;
        }
        match self.process.as_ref() {
            Some(handle) => ServerStatus::Running {
                pid: handle.get_pid(),
                memory_bytes: self
                    .launcher
                    .process_info(handle)
                    .and_then(|info| info.memory_bytes),
            },
            None => ServerStatus::Stopped,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }

        let (program, args) = self.config.command_line();
        info!(
            command = %program,
            args = ?args,
            working_dir = %self.config.working_directory.display(),
            "Starting server"
        );

        let handle = self
            .launcher
            .spawn_process(
                &program,
                &args,
                &self.config.working_directory,
                self.console.clone(),
            )
            .await?;

        info!(pid = ?handle.get_pid(), "Server started");
        self.process = Some(handle);
        Ok(())
    }

    /// Checkpoint the world, ask the server to stop and wait for it to exit.
    ///
    /// With an exit timeout configured, a server that does not exit in time
    /// is killed and [`ServerError::Timeout`] is returned.
    pub async fn stop(&mut self) -> Result<ProcessStatus> {
        if !self.is_running() {
            return Err(ServerError::NotRunning);
        }

        info!("Stopping server");
        self.save_off().await?;
        self.save_all().await?;
        self.send_command(STOP).await?;

        let timeout = self.config.exit_timeout();
        let waited = match self.process.as_mut() {
            Some(handle) => self.launcher.wait_for_exit(handle, timeout).await,
            None => return Err(ServerError::NotRunning),
        };

        match waited {
            Ok(status) => {
                info!(status = ?status, "Server stopped");
                self.process = None;
                Ok(status)
            }
            Err(ServerError::Timeout(message)) => {
                warn!(%message, "Server did not stop in time, killing it");
                self.terminate().await?;
                Err(ServerError::Timeout(message))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn restart(&mut self) -> Result<()> {
        self.stop().await?;
        self.start().await
    }

    /// Hard-stop the server. Anything not checkpointed yet is lost.
    pub async fn kill(&mut self) -> Result<ProcessStatus> {
        if !self.is_running() {
            return Err(ServerError::NotRunning);
        }

        info!("Killing server");
        let status = self.terminate().await?;
        info!(status = ?status, "Server killed");
        Ok(status)
    }

    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        if !self.is_running() {
            return Err(ServerError::NotRunning);
        }
        let handle = self.process.as_mut().ok_or(ServerError::NotRunning)?;
        handle.send_line(command).await
    }

    /// Wipe the working directory and fetch a fresh artifact into it
    pub async fn install(&mut self) -> Result<()> {
        let working_dir = self.config.working_directory.clone();
        let jar = self.config.jar_path();
        let url = self.config.jar_url.clone();
        let fetcher = self.fetcher.clone();

        info!(url = %url, "Installing server");
        force_stop_first(self, move || async move {
            tokio::fs::create_dir_all(&working_dir).await?;
            clean_dir(&working_dir, &[]).await?;
            fetcher.fetch(&url, &jar).await
        })
        .await
    }

    /// Remove everything from the working directory, artifact included
    pub async fn uninstall(&mut self) -> Result<()> {
        let working_dir = self.config.working_directory.clone();

        info!("Uninstalling server");
        force_stop_first(self, move || async move { clean_dir(&working_dir, &[]).await }).await
    }

    /// Remove everything from the working directory except the artifact
    pub async fn clean(&mut self) -> Result<()> {
        let working_dir = self.config.working_directory.clone();
        let jar_name = self.config.jar_name.clone();

        info!("Cleaning server directory");
        force_stop_first(self, move || async move {
            clean_dir(&working_dir, &[jar_name.as_str()]).await
        })
        .await
    }

    /// Replace the artifact, restarting the server around it if it was up
    pub async fn update(&mut self) -> Result<()> {
        let jar = self.config.jar_path();
        let url = self.config.jar_url.clone();
        let fetcher = self.fetcher.clone();

        info!(url = %url, "Updating server");
        restart_around(self, move || async move { fetcher.fetch(&url, &jar).await }).await
    }

    pub async fn delete_world(&mut self) -> Result<()> {
        let world = self.config.world_path();
        match tokio::fs::metadata(&world).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ServerError::NotFound(world)),
            Err(e) => return Err(ServerError::from_io_at(e, world)),
        }

        info!(world = %world.display(), "Deleting world");
        restart_around(self, move || async move {
            tokio::fs::remove_dir_all(&world)
                .await
                .map_err(|e| ServerError::from_io_at(e, &world))
        })
        .await
    }

    /// Write a backup bundle called `name` into the backup directory while
    /// saving is paused, returning the bundle's path.
    pub async fn compress_world(&mut self, name: &str) -> Result<PathBuf> {
        let destination = self.config.backup_path(name)?;
        let world = self.config.world_path();

        with_save_guard(self, move || backup::compress_world(world, destination)).await
    }

    async fn terminate(&mut self) -> Result<ProcessStatus> {
        let Some(handle) = self.process.as_mut() else {
            return Err(ServerError::NotRunning);
        };

        // A platform kill can report failure or a missing process while the
        // child is still alive; waiting on it then would never return.
        match self.launcher.force_kill(handle).await {
            TerminationResult::Success => {}
            other if handle.is_running() => {
                warn!(result = ?other, "Platform kill left server alive, falling back to handle kill");
                handle.kill().await?;
            }
            other => debug!(result = ?other, "Server already gone"),
        }

        let status = handle.wait().await?;
        self.process = None;
        Ok(status)
    }
}

#[async_trait]
impl<L: ProcessLauncher> Lifecycle for ServerManager<L> {
    fn is_running(&mut self) -> bool {
        ServerManager::is_running(self)
    }

    async fn start(&mut self) -> Result<()> {
        ServerManager::start(self).await
    }

    async fn stop(&mut self) -> Result<ProcessStatus> {
        ServerManager::stop(self).await
    }

    async fn kill(&mut self) -> Result<ProcessStatus> {
        ServerManager::kill(self).await
    }

    async fn send_command(&mut self, command: &str) -> Result<()> {
        ServerManager::send_command(self, command).await
    }

    fn checkpoint_delay(&self) -> Duration {
        self.config.checkpoint_delay()
    }
}

impl<L: ProcessLauncher> Drop for ServerManager<L> {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(
                pid = ?self.process.as_ref().and_then(|h| h.get_pid()),
                "Server manager dropped with a live server, it will be killed"
            );
        }
    }
}
