//! Canonical path helpers and root-relative path mapping.

use crate::error::{SyncError, SyncResult};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Canonicalize a path without producing UNC paths on Windows.
pub fn canonicalize_path(path: &Path) -> io::Result<PathBuf> {
    dunce::canonicalize(path)
}

/// Number of components in a path; used as its depth in the tree.
pub fn depth(path: &Path) -> usize {
    path.components().count()
}

/// True when `ancestor` is a proper component-wise prefix of `path`.
pub fn is_descendant(path: &Path, ancestor: &Path) -> bool {
    path != ancestor && path.starts_with(ancestor)
}

/// Express `path` relative to `root`.
pub fn relative_to<'a>(path: &'a Path, root: &Path) -> SyncResult<&'a Path> {
    path.strip_prefix(root)
        .map_err(|_| SyncError::path_mapping(path, root))
}

/// Move `path` from under `from_root` to the same relative position under `to_root`.
pub fn rebase(path: &Path, from_root: &Path, to_root: &Path) -> SyncResult<PathBuf> {
    let relative = relative_to(path, from_root)?;
    if relative.as_os_str().is_empty() {
        return Ok(to_root.to_path_buf());
    }
    Ok(to_root.join(relative))
}

/// Parse a client-supplied relative path, rejecting anything that could escape a root.
///
/// Only normal components are accepted (`.` is skipped); `..`, absolute roots,
/// and drive prefixes yield `None`.
pub fn sanitize_relative(raw: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}
