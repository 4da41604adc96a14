mod unix_launcher;

pub use unix_launcher::{UnixProcessHandle, UnixProcessLauncher};

pub struct UnixLauncherFactory;

#[cfg(unix)]
impl mcserver_core::ProcessLauncherFactory for UnixLauncherFactory {
    type Launcher = UnixProcessLauncher;

    fn create_launcher() -> UnixProcessLauncher {
        UnixProcessLauncher::new()
    }

    fn platform_name() -> &'static str {
        "Unix"
    }
}
