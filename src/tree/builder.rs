//! One-shot snapshot builder
//!
//! Walks a directory tree once and produces a complete [`Snapshot`]. Building is
//! all-or-nothing: the first entry that cannot be read aborts the build.

use crate::error::{SyncError, SyncResult};
use crate::tree::hasher::hash_file;
use crate::tree::path::canonicalize_path;
use crate::tree::snapshot::{FileEntry, Snapshot};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Builds snapshots of a directory tree
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    root: PathBuf,
}

impl SnapshotBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and return its snapshot.
    ///
    /// Paths in the snapshot are rooted at the canonicalized root.
    pub fn build(&self) -> SyncResult<Snapshot> {
        let started = Instant::now();
        let root = canonical_dir(&self.root)?;

        let mut snapshot = Snapshot::new();
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                SyncError::io(path, io::Error::from(e))
            })?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                snapshot.insert_dir(entry.path().to_path_buf());
            } else if file_type.is_file() {
                let metadata = entry
                    .metadata()
                    .map_err(|e| SyncError::io(entry.path(), io::Error::from(e)))?;
                let file = read_file_entry(entry.path(), &metadata)
                    .map_err(|e| SyncError::io(entry.path(), e))?;
                snapshot.insert_file(file);
            } else {
                debug!(path = %entry.path().display(), "Skipping non-regular entry");
            }
        }

        info!(
            root = %root.display(),
            files = snapshot.file_count(),
            dirs = snapshot.dir_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built snapshot"
        );
        Ok(snapshot)
    }
}

/// Canonicalize `path` and require it to be a directory.
pub(crate) fn canonical_dir(path: &Path) -> SyncResult<PathBuf> {
    let canonical = canonicalize_path(path).map_err(|e| SyncError::io(path, e))?;
    if !canonical.is_dir() {
        return Err(SyncError::io(
            &canonical,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }
    Ok(canonical)
}

/// Hash a regular file and pair it with its metadata.
pub(crate) fn read_file_entry(path: &Path, metadata: &Metadata) -> io::Result<FileEntry> {
    let content_hash = hash_file(path)?;
    FileEntry::from_metadata(path.to_path_buf(), metadata, content_hash)
}
