//! Windows-specific server process launching

mod windows_launcher;

pub use windows_launcher::{WindowsProcessHandle, WindowsProcessLauncher};

/// Windows-specific launcher factory
pub struct WindowsLauncherFactory;

impl mcserver_core::ProcessLauncherFactory for WindowsLauncherFactory {
    type Launcher = WindowsProcessLauncher;

    fn create_launcher() -> WindowsProcessLauncher {
        WindowsProcessLauncher::new()
    }

    fn platform_name() -> &'static str {
        "Windows"
    }
}
