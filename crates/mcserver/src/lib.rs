//! Lifecycle management for a single dedicated game server process.
//!
//! [`create_server`] wires a [`ServerManager`] to the launcher for the
//! current platform and an HTTP artifact fetcher. Wrap it in a
//! [`SharedServer`] to drive it from several tasks.

mod factory;
mod fetcher;
mod shared;

use std::sync::Arc;
use tracing::info;

pub use factory::{PlatformLauncher, PlatformLauncherFactory};
pub use fetcher::HttpArtifactFetcher;
pub use shared::SharedServer;

// Re-export core functionality
pub use mcserver_core::*;

/// Server manager bound to the current platform's launcher
pub type MinecraftServer = ServerManager<PlatformLauncher>;

/// Build a manager for `config` that downloads its artifact over HTTP
pub fn create_server(config: ServerConfig) -> Result<MinecraftServer> {
    info!(
        platform = PlatformLauncherFactory::platform_name(),
        working_dir = %config.working_directory.display(),
        "Creating server manager"
    );
    let launcher = Arc::new(PlatformLauncherFactory::create_launcher());
    ServerManager::new(config, launcher, Arc::new(HttpArtifactFetcher::new()))
}
