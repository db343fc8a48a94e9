//! Recursive tree walker.
//!
//! Lists a directory, then fans out one listing per subdirectory and waits
//! for all of them before the flattened result is returned. At most
//! `MAX_OPEN_DIRS` listings hold a directory handle at any moment. Any
//! unreadable directory aborts the whole walk. Symbolic links are neither
//! followed nor reported.

use crate::error::NormalizeError;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::debug;

const MAX_OPEN_DIRS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A path discovered during a walk. Always absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Walks `root` and returns every file and directory below it, in no
/// particular order. `root` itself is not included.
pub async fn walk(root: &Path) -> Result<Vec<FileEntry>, NormalizeError> {
    let root = fs::canonicalize(root)
        .await
        .map_err(|source| traversal_error(root, source))?;
    walk_dir(root, Arc::new(Semaphore::new(MAX_OPEN_DIRS))).await
}

/// Collects the absolute paths of all regular files under `root`.
pub async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, NormalizeError> {
    let entries = walk(root).await?;
    let total = entries.len();
    let files: Vec<PathBuf> = entries
        .into_iter()
        .filter(|e| e.kind == EntryKind::File)
        .map(|e| e.path)
        .collect();
    debug!(
        root = %root.display(),
        files = files.len(),
        directories = total - files.len(),
        "walked tree"
    );
    Ok(files)
}

fn walk_dir(
    dir: PathBuf,
    open_dirs: Arc<Semaphore>,
) -> BoxFuture<'static, Result<Vec<FileEntry>, NormalizeError>> {
    async move {
        // Held only while the directory handle is open, never across the
        // recursion below.
        let permit = open_dirs
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| traversal_error(&dir, std::io::Error::other(err)))?;
        let mut reader = fs::read_dir(&dir)
            .await
            .map_err(|source| traversal_error(&dir, source))?;

        let mut entries = Vec::new();
        let mut nested = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|source| traversal_error(&dir, source))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|source| traversal_error(&dir, source))?;
            let path = entry.path();
            if file_type.is_dir() {
                nested.push(walk_dir(path.clone(), open_dirs.clone()));
                entries.push(FileEntry {
                    path,
                    kind: EntryKind::Directory,
                });
            } else if file_type.is_file() {
                entries.push(FileEntry {
                    path,
                    kind: EntryKind::File,
                });
            }
        }
        drop(reader);
        drop(permit);

        for children in try_join_all(nested).await? {
            entries.extend(children);
        }
        Ok(entries)
    }
    .boxed()
}

fn traversal_error(path: &Path, source: std::io::Error) -> NormalizeError {
    NormalizeError::Traversal {
        path: path.to_path_buf(),
        source,
    }
}
