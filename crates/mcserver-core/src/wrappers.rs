//! Behavioural combinators around filesystem operations.
//!
//! Each wrapper takes the lifecycle it acts on plus the operation to run,
//! and returns whatever the operation returns. They compose by nesting
//! calls, never by inheritance, and hold no state of their own.

use crate::control::{SAVE_ALL, SAVE_OFF, SAVE_ON};
use crate::error::Result;
use crate::process::ProcessStatus;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// The lifecycle surface the wrappers need from a server manager
#[async_trait]
pub trait Lifecycle: Send {
    /// Poll whether the server process is alive
    fn is_running(&mut self) -> bool;

    async fn start(&mut self) -> Result<()>;

    /// Graceful stop: checkpoint, `stop`, wait for exit
    async fn stop(&mut self) -> Result<ProcessStatus>;

    /// Hard stop without a checkpoint
    async fn kill(&mut self) -> Result<ProcessStatus>;

    async fn send_command(&mut self, command: &str) -> Result<()>;

    /// How long to let the server flush after a checkpoint
    fn checkpoint_delay(&self) -> Duration;

    async fn save_off(&mut self) -> Result<()> {
        self.send_command(SAVE_OFF).await
    }

    async fn save_on(&mut self) -> Result<()> {
        self.send_command(SAVE_ON).await
    }

    /// Force a checkpoint, then sleep for the checkpoint delay.
    ///
    /// The console gives no completion signal, so the delay is a fixed
    /// heuristic rather than an acknowledgement.
    async fn save_all(&mut self) -> Result<()> {
        self.send_command(SAVE_ALL).await?;
        tokio::time::sleep(self.checkpoint_delay()).await;
        Ok(())
    }
}

/// Kill the server if it is alive, then run `op`.
///
/// For operations that are about to destroy whatever the server could
/// still be writing, so no checkpoint is taken.
pub async fn force_stop_first<L, F, Fut, T>(lifecycle: &mut L, op: F) -> Result<T>
where
    L: Lifecycle + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if lifecycle.is_running() {
        debug!("Killing server before operation");
        lifecycle.kill().await?;
    }
    op().await
}

/// Run `op` against a quiesced world: `save-off`, `save-all`, `op`, `save-on`.
///
/// `save-on` is sent exactly once whether or not `op` succeeds; the error of
/// `op` wins over a failure to re-enable saving. A stopped server is not
/// writing, so `op` then runs without any console traffic.
pub async fn with_save_guard<L, F, Fut, T>(lifecycle: &mut L, op: F) -> Result<T>
where
    L: Lifecycle + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if !lifecycle.is_running() {
        debug!("Server not running, skipping save guard");
        return op().await;
    }

    lifecycle.save_off().await?;
    if let Err(e) = lifecycle.save_all().await {
        if let Err(restore) = lifecycle.save_on().await {
            warn!(error = %restore, "Failed to re-enable saving after checkpoint failure");
        }
        return Err(e);
    }

    let outcome = op().await;
    let restored = lifecycle.save_on().await;

    match (outcome, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), restored) => {
            if let Err(restore) = restored {
                warn!(error = %restore, "Failed to re-enable saving after failed operation");
            }
            Err(e)
        }
    }
}

/// Stop the server around `op` if it was running, and start it again after.
///
/// When `op` fails the server is left stopped.
pub async fn restart_around<L, F, Fut, T>(lifecycle: &mut L, op: F) -> Result<T>
where
    L: Lifecycle + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let was_running = lifecycle.is_running();
    if was_running {
        lifecycle.stop().await?;
    }

    let value = op().await?;

    if was_running {
        lifecycle.start().await?;
    }
    Ok(value)
}
