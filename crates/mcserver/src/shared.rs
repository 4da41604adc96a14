use mcserver_core::{
    ConsoleSink, ProcessLauncher, ProcessStatus, Result, ServerConfig, ServerManager, ServerStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cloneable handle that serialises every operation on one server
///
/// Each call holds the lock for the whole operation, so a `stop` issued while
/// a backup is being written waits for the backup to finish.
pub struct SharedServer<L: ProcessLauncher> {
    inner: Arc<Mutex<ServerManager<L>>>,
}

impl<L: ProcessLauncher> Clone for SharedServer<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<L: ProcessLauncher> SharedServer<L> {
    pub fn new(manager: ServerManager<L>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    pub async fn config(&self) -> ServerConfig {
        self.inner.lock().await.config().clone()
    }

    pub async fn set_console(&self, console: ConsoleSink) {
        self.inner.lock().await.set_console(console);
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.is_running()
    }

    pub async fn status(&self) -> ServerStatus {
        self.inner.lock().await.status()
    }

    pub async fn start(&self) -> Result<()> {
        self.inner.lock().await.start().await
    }

    pub async fn stop(&self) -> Result<ProcessStatus> {
        self.inner.lock().await.stop().await
    }

    pub async fn restart(&self) -> Result<()> {
        self.inner.lock().await.restart().await
    }

    pub async fn kill(&self) -> Result<ProcessStatus> {
        self.inner.lock().await.kill().await
    }

    pub async fn send_command(&self, command: &str) -> Result<()> {
        self.inner.lock().await.send_command(command).await
    }

    pub async fn install(&self) -> Result<()> {
        self.inner.lock().await.install().await
    }

    pub async fn uninstall(&self) -> Result<()> {
        self.inner.lock().await.uninstall().await
    }

    pub async fn clean(&self) -> Result<()> {
        self.inner.lock().await.clean().await
    }

    pub async fn update(&self) -> Result<()> {
        self.inner.lock().await.update().await
    }

    pub async fn delete_world(&self) -> Result<()> {
        self.inner.lock().await.delete_world().await
    }

    pub async fn compress_world(&self, name: &str) -> Result<PathBuf> {
        self.inner.lock().await.compress_world(name).await
    }
}

impl<L: ProcessLauncher> From<ServerManager<L>> for SharedServer<L> {
    fn from(manager: ServerManager<L>) -> Self {
        Self::new(manager)
    }
}
