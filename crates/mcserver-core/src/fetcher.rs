use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Retrieves the server artifact from a remote location
///
/// Implementations must leave `destination` either absent or complete;
/// transport failures surface as IO or fetch errors.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()>;
}
