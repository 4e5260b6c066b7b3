//! Filesystem helpers for the download directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

/// A regular file in a directory, with the metadata needed to rank it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

impl FileEntry {
    /// Lower-cased extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Create `dir` (and parents) if it does not exist yet.
pub async fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(dir).await? {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir).await?;
    info!("Created directory: {}", dir.display());
    Ok(())
}

/// List regular files directly inside `dir`.
///
/// Entries that vanish or cannot be stat'ed between the listing and the
/// metadata call are skipped; browsers rename partial files while we look.
pub async fn list_files(dir: &Path) -> std::io::Result<Vec<FileEntry>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            size: metadata.len(),
            modified,
        });
    }

    Ok(files)
}

/// Names of the files currently in `dir`.
pub async fn file_names(dir: &Path) -> std::io::Result<HashSet<String>> {
    Ok(list_files(dir)
        .await?
        .into_iter()
        .map(|f| f.name)
        .collect())
}
