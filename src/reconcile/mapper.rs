//! Mapping between the local and remote path spaces.

use crate::error::SyncResult;
use crate::tree::path::{rebase, relative_to};
use crate::tree::Snapshot;
use std::path::{Path, PathBuf};

/// Translates paths between two independently rooted trees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    local_root: PathBuf,
    remote_root: PathBuf,
}

impl PathMapper {
    pub fn new(local_root: impl Into<PathBuf>, remote_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root: remote_root.into(),
        }
    }

    /// Infer both roots from the snapshots' topmost directories.
    pub fn from_snapshots(local: &Snapshot, remote: &Snapshot) -> SyncResult<Self> {
        Ok(Self::new(local.root()?, remote.root()?))
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn remote_root(&self) -> &Path {
        &self.remote_root
    }

    pub fn to_local(&self, remote_path: &Path) -> SyncResult<PathBuf> {
        rebase(remote_path, &self.remote_root, &self.local_root)
    }

    pub fn to_remote(&self, local_path: &Path) -> SyncResult<PathBuf> {
        rebase(local_path, &self.local_root, &self.remote_root)
    }

    /// Remote path relative to the remote root, as used by the file endpoint.
    pub fn remote_relative<'a>(&self, remote_path: &'a Path) -> SyncResult<&'a Path> {
        relative_to(remote_path, &self.remote_root)
    }
}
