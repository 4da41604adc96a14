use std::path::PathBuf;
use thiserror::Error;

/// Core error types for server lifecycle operations
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Server is not running")]
    NotRunning,

    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact fetch failed: {0}")]
    Fetch(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// Check if this error was caused by the server being in the wrong state
    /// for the requested operation
    pub fn is_state_error(&self) -> bool {
        matches!(self, ServerError::AlreadyRunning | ServerError::NotRunning)
    }

    /// Check if this error came from the filesystem, the archiver or the
    /// artifact transport
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            ServerError::Io(_) | ServerError::NotFound(_) | ServerError::Fetch(_)
        )
    }

    /// Map an IO error on `path` to [`ServerError::NotFound`] when the path
    /// is missing, keeping every other kind as [`ServerError::Io`].
    pub fn from_io_at(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ServerError::NotFound(path.into())
        } else {
            ServerError::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ServerError::NotRunning;
        assert_eq!(format!("{error}"), "Server is not running");

        let error = ServerError::NotFound(PathBuf::from("/srv/mc/world"));
        let display = format!("{error}");
        assert!(display.contains("Path not found"));
        assert!(display.contains("/srv/mc/world"));
    }

    #[test]
    fn test_error_categorization() {
        assert!(ServerError::AlreadyRunning.is_state_error());
        assert!(ServerError::NotRunning.is_state_error());
        assert!(!ServerError::Timeout("stop".to_string()).is_state_error());

        assert!(ServerError::Fetch("404".to_string()).is_io_error());
        assert!(ServerError::NotFound(PathBuf::from("x")).is_io_error());
        assert!(!ServerError::Configuration("bad".to_string()).is_io_error());
    }

    #[test]
    fn test_from_io_at_maps_missing_paths() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        let error = ServerError::from_io_at(missing, "/srv/mc/world");
        assert!(matches!(error, ServerError::NotFound(ref p) if p == &PathBuf::from("/srv/mc/world")));

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let error = ServerError::from_io_at(denied, "/srv/mc/world");
        assert!(matches!(error, ServerError::Io(_)));
    }
}
