//! Watch-directory access for machine trace files.
//!
//! Files appear in the watch directory, are read once and always relocated
//! to the processed directory afterwards, parse outcome notwithstanding.
//! Relocation is only invoked from the cycle's finalizing step, once per
//! processing attempt.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct TraceFileSource {
    watch_dir: PathBuf,
    processed_dir: PathBuf,
    extension: String,
}

impl TraceFileSource {
    pub fn new(
        watch_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        extension: &str,
    ) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            processed_dir: processed_dir.into(),
            extension: extension.to_string(),
        }
    }

    /// File names in the watch directory carrying the configured extension.
    /// No ordering is guaranteed.
    pub async fn list_pending(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.watch_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.extension.is_empty() || name.ends_with(&self.extension) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// All lines of one pending file, in order. An empty file yields an
    /// empty vector.
    pub async fn read_lines(&self, name: &str) -> io::Result<Vec<String>> {
        let content = fs::read_to_string(self.watch_dir.join(name)).await?;
        Ok(content.lines().map(str::to_string).collect())
    }

    /// Move a file out of the watch directory, creating the destination tree
    /// as needed. `rename` cannot cross mount points (Docker volumes hit
    /// this), so any rename failure falls back to copy-then-delete.
    pub async fn relocate(&self, name: &str) -> io::Result<()> {
        let from = self.watch_dir.join(name);
        let to = self.processed_dir.join(name);

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }

        match fs::rename(&from, &to).await {
            Ok(()) => Ok(()),
            Err(rename_err) => match copy_then_delete(&from, &to).await {
                Ok(()) => Ok(()),
                Err(_) => Err(rename_err),
            },
        }
    }
}

async fn copy_then_delete(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).await?;
    fs::remove_file(from).await
}
