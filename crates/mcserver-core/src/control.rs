use crate::error::{Result, ServerError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Console command that turns automatic world saving off
pub const SAVE_OFF: &str = "save-off";
/// Console command that turns automatic world saving back on
pub const SAVE_ON: &str = "save-on";
/// Console command that forces a checkpoint of the world to disk
pub const SAVE_ALL: &str = "save-all";
/// Console command that asks the server to shut down gracefully
pub const STOP: &str = "stop";

/// Fire-and-forget line channel into the server's standard input
///
/// Every command is written as `<command>\n`. Nothing is read back, so a
/// caller that needs an effect to have happened has to wait for it some
/// other way.
pub struct ControlChannel<W> {
    writer: Option<W>,
}

impl<W: AsyncWrite + Unpin + Send> ControlChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }

    /// A channel with no process behind it
    pub fn closed() -> Self {
        Self { writer: None }
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub async fn send(&mut self, command: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(ServerError::NotRunning)?;

        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');

        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                debug!(command, "Sent console command");
                Ok(())
            }
            // The reading end is gone, so is the process.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                self.writer = None;
                Err(ServerError::NotRunning)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the writer, closing the process's standard input
    pub fn close(&mut self) {
        self.writer = None;
    }
}
