use async_trait::async_trait;
use mcserver_core::{ArtifactFetcher, Result, ServerError};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Downloads the server artifact over HTTP(S)
///
/// The body is streamed into `<destination>.part` and renamed into place once
/// complete, so an interrupted download never leaves a truncated artifact.
#[derive(Clone, Default)]
pub struct HttpArtifactFetcher {
    client: reqwest::Client,
}

impl HttpArtifactFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: &str, partial: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?;

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| ServerError::from_io_at(e, partial))?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(destination);
        debug!(url, partial = %partial.display(), "Downloading artifact");

        match self.download(url, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, destination).await?;
                info!(url, bytes, destination = %destination.display(), "Artifact downloaded");
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(error = %cleanup, "Failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn fetch_error(e: reqwest::Error) -> ServerError {
    ServerError::Fetch(e.to_string())
}
