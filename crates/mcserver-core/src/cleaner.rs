use crate::error::Result;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Remove every direct child of `path` whose name is not in `exempt`.
///
/// Directories are removed recursively, everything else (files, symlinks)
/// is unlinked. Entries that disappear while we iterate are skipped. Fails
/// only when `path` itself cannot be listed.
pub async fn clean_dir(path: &Path, exempt: &[&str]) -> Result<()> {
    let mut entries = tokio::fs::read_dir(path).await?;
    let mut removed = 0usize;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_str().is_some_and(|n| exempt.contains(&n)) {
            debug!(entry = ?name, "Keeping exempt entry");
            continue;
        }

        let full_path = entry.path();
        let file_type = match entry.file_type().await {
            Ok(file_type) => file_type,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        let outcome = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&full_path).await
        } else {
            tokio::fs::remove_file(&full_path).await
        };

        match outcome {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %full_path.display(), "Entry vanished before removal");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(path = %path.display(), removed, "Cleaned directory");
    Ok(())
}
