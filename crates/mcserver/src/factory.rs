use mcserver_core::ProcessLauncherFactory;

/// Platform-independent factory that selects the appropriate launcher at compile time
pub struct PlatformLauncherFactory;

impl ProcessLauncherFactory for PlatformLauncherFactory {
    #[cfg(unix)]
    type Launcher = mcserver_unix::UnixProcessLauncher;

    #[cfg(windows)]
    type Launcher = mcserver_windows::WindowsProcessLauncher;

    fn create_launcher() -> Self::Launcher {
        #[cfg(unix)]
        return mcserver_unix::UnixLauncherFactory::create_launcher();

        #[cfg(windows)]
        return mcserver_windows::WindowsLauncherFactory::create_launcher();
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return mcserver_unix::UnixLauncherFactory::platform_name();

        #[cfg(windows)]
        return mcserver_windows::WindowsLauncherFactory::platform_name();
    }
}

/// Launcher used on the current platform
pub type PlatformLauncher = <PlatformLauncherFactory as ProcessLauncherFactory>::Launcher;
