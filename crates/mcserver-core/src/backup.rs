//! Compressed snapshots of the world directory.
//!
//! Callers are expected to hold the save guard (see [`crate::wrappers`])
//! for the whole call so the server does not write while the tree is read.

use crate::error::{Result, ServerError};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Archive `world` into a gzip-compressed tarball at `destination`.
///
/// Entries are rooted at the world directory's own name, so unpacking the
/// bundle anywhere recreates `<world_name>/...`. Blocks the caller until the
/// bundle is fully written and synced, then returns its path.
pub async fn compress_world(world: PathBuf, destination: PathBuf) -> Result<PathBuf> {
    match tokio::fs::metadata(&world).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(ServerError::NotFound(world)),
        Err(e) => return Err(ServerError::from_io_at(e, world)),
    }

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!(
        world = %world.display(),
        destination = %destination.display(),
        "Compressing world"
    );

    let written = destination.clone();
    tokio::task::spawn_blocking(move || write_bundle(&world, &written))
        .await
        .map_err(|e| anyhow::anyhow!("archive task failed: {e}"))?
        .inspect_err(|_| remove_partial(&destination))?;

    info!(destination = %destination.display(), "World backup complete");
    Ok(destination)
}

fn write_bundle(world: &Path, destination: &Path) -> Result<()> {
    let root = world
        .file_name()
        .ok_or_else(|| ServerError::NotFound(world.to_path_buf()))?;

    let file = File::create(destination)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(root, world)?;

    let mut writer = builder.into_inner()?.finish()?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn remove_partial(destination: &Path) {
    if let Err(e) = std::fs::remove_file(destination) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(
                destination = %destination.display(),
                error = %e,
                "Failed to remove partial backup"
            );
        }
    }
}
