//! Snapshot model
//!
//! A [`Snapshot`] is the complete file/directory state of one tree. Entries are kept
//! in component-ordered B-trees so that every descendant of a directory occupies a
//! contiguous key range; cascade removal is a range query rather than a scan.

use crate::error::{SyncError, SyncResult};
use crate::tree::path::{depth, is_descendant};
use crate::types::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::Metadata;
use std::io;
use std::ops::Bound;
use std::path::{Path, PathBuf};

/// File entry: metadata and content digest for one regular file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub mod_time: DateTime<Utc>,
    pub size: u64,
    pub content_hash: ContentHash,
}

impl FileEntry {
    /// Build an entry from already-fetched metadata and a computed hash.
    pub fn from_metadata(
        path: PathBuf,
        metadata: &Metadata,
        content_hash: ContentHash,
    ) -> io::Result<Self> {
        Ok(Self {
            path,
            mod_time: DateTime::<Utc>::from(metadata.modified()?),
            size: metadata.len(),
            content_hash,
        })
    }
}

/// Entries removed by a cascade delete.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Removed {
    /// Removed directories, the cascade root first.
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl Removed {
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

/// Snapshot of one directory tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<PathBuf, FileEntry>,
    dirs: BTreeSet<PathBuf>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &BTreeMap<PathBuf, FileEntry> {
        &self.files
    }

    pub fn dirs(&self) -> &BTreeSet<PathBuf> {
        &self.dirs
    }

    pub fn file(&self, path: &Path) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn contains_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.contains_file(path) || self.contains_dir(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    /// Record a directory. A file previously recorded at the same path is dropped.
    ///
    /// Returns `true` if the directory was not known before.
    pub fn insert_dir(&mut self, path: PathBuf) -> bool {
        self.files.remove(&path);
        self.dirs.insert(path)
    }

    /// Record or replace a file entry. A directory previously recorded at the same
    /// path is removed together with everything below it.
    pub fn insert_file(&mut self, entry: FileEntry) -> Option<FileEntry> {
        if self.dirs.contains(&entry.path) {
            self.remove_tree(&entry.path.clone());
        }
        self.files.insert(entry.path.clone(), entry)
    }

    /// Insert `entry`, returning the directory subtree it displaced, if any.
    pub fn replace_with_file(&mut self, entry: FileEntry) -> Removed {
        let removed = if self.dirs.contains(&entry.path) {
            self.remove_tree(&entry.path.clone())
        } else {
            Removed::default()
        };
        self.files.insert(entry.path.clone(), entry);
        removed
    }

    pub fn remove_file(&mut self, path: &Path) -> Option<FileEntry> {
        self.files.remove(path)
    }

    /// Remove whatever is recorded at `path`.
    ///
    /// A directory is removed with every file and directory nested under it; a file
    /// only removes its own entry.
    pub fn remove_path(&mut self, path: &Path) -> Removed {
        if self.dirs.contains(path) {
            self.remove_tree(path)
        } else if self.files.remove(path).is_some() {
            Removed {
                dirs: Vec::new(),
                files: vec![path.to_path_buf()],
            }
        } else {
            Removed::default()
        }
    }

    /// Remove directory `path` and all of its descendants.
    pub fn remove_tree(&mut self, path: &Path) -> Removed {
        let mut removed = Removed::default();
        if self.dirs.remove(path) {
            removed.dirs.push(path.to_path_buf());
        }

        let nested_dirs: Vec<PathBuf> = self
            .dirs
            .range::<Path, _>((Bound::Excluded(path), Bound::Unbounded))
            .take_while(|d| d.starts_with(path))
            .cloned()
            .collect();
        for dir in &nested_dirs {
            self.dirs.remove(dir);
        }
        removed.dirs.extend(nested_dirs);

        let nested_files: Vec<PathBuf> = self
            .files
            .range::<Path, _>((Bound::Excluded(path), Bound::Unbounded))
            .map(|(p, _)| p)
            .take_while(|p| p.starts_with(path))
            .cloned()
            .collect();
        for file in &nested_files {
            self.files.remove(file);
        }
        removed.files = nested_files;

        removed
    }

    /// Directories nested under `path` (not including `path` itself).
    pub fn dirs_under<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a PathBuf> + 'a {
        self.dirs
            .range::<Path, _>((Bound::Excluded(path), Bound::Unbounded))
            .take_while(move |d| d.starts_with(path))
    }

    /// Files nested under `path` at any depth.
    pub fn files_under<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a FileEntry> + 'a {
        self.files
            .range::<Path, _>((Bound::Excluded(path), Bound::Unbounded))
            .take_while(move |(p, _)| p.starts_with(path))
            .map(|(_, entry)| entry)
    }

    /// The topmost directory: the unique directory path with the fewest components.
    pub fn root(&self) -> SyncResult<&Path> {
        let min_depth = self
            .dirs
            .iter()
            .map(|d| depth(d))
            .min()
            .ok_or_else(|| SyncError::MalformedSnapshot("snapshot has no directories".into()))?;

        let mut candidates = self.dirs.iter().filter(|d| depth(d) == min_depth);
        let root = candidates
            .next()
            .ok_or_else(|| SyncError::MalformedSnapshot("snapshot has no directories".into()))?;
        if let Some(other) = candidates.next() {
            return Err(SyncError::MalformedSnapshot(format!(
                "ambiguous root: {} and {} are both topmost",
                root.display(),
                other.display()
            )));
        }
        Ok(root.as_path())
    }

    /// Describe every structural invariant violation; empty when well formed.
    pub fn invariant_violations(&self) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }
        let root = match self.root() {
            Ok(root) => root,
            Err(e) => return vec![e.to_string()],
        };

        let mut problems = Vec::new();
        for dir in self.dirs.iter().filter(|d| d.as_path() != root) {
            if !is_descendant(dir, root) {
                problems.push(format!("directory {} is outside root", dir.display()));
            } else if let Some(parent) = dir.parent() {
                if !self.dirs.contains(parent) {
                    problems.push(format!("directory {} has no parent entry", dir.display()));
                }
            }
        }
        for (path, entry) in &self.files {
            if path != &entry.path {
                problems.push(format!(
                    "file key {} does not match entry path {}",
                    path.display(),
                    entry.path.display()
                ));
            }
            if self.dirs.contains(path) {
                problems.push(format!("{} is both a file and a directory", path.display()));
            }
            if !is_descendant(path, root) {
                problems.push(format!("file {} is outside root", path.display()));
            } else if let Some(parent) = path.parent() {
                if !self.dirs.contains(parent) {
                    problems.push(format!("file {} has no parent entry", path.display()));
                }
            }
        }
        problems
    }

    pub fn to_wire(&self) -> SyncResult<SnapshotWire> {
        let mut wire = SnapshotWire::default();
        for (path, entry) in &self.files {
            let key = path_to_wire(path)?;
            wire.files.insert(
                key.clone(),
                FileEntryWire {
                    name: key,
                    mod_time: entry.mod_time,
                    size: entry.size,
                    hash: entry.content_hash.to_hex(),
                },
            );
        }
        for dir in &self.dirs {
            wire.dirs.insert(path_to_wire(dir)?, true);
        }
        Ok(wire)
    }

    pub fn from_wire(wire: SnapshotWire) -> SyncResult<Self> {
        let mut snapshot = Snapshot::new();
        for (dir, present) in wire.dirs {
            if present {
                snapshot.dirs.insert(PathBuf::from(dir));
            }
        }
        for (key, entry) in wire.files {
            let content_hash: ContentHash = entry
                .hash
                .parse()
                .map_err(|e| SyncError::Wire(format!("file {}: {}", key, e)))?;
            let path = PathBuf::from(&key);
            if snapshot.dirs.contains(&path) {
                return Err(SyncError::Wire(format!(
                    "{} is listed as both a file and a directory",
                    key
                )));
            }
            snapshot.files.insert(
                path.clone(),
                FileEntry {
                    path,
                    mod_time: entry.mod_time,
                    size: entry.size,
                    content_hash,
                },
            );
        }
        Ok(snapshot)
    }

    pub fn to_json(&self) -> SyncResult<String> {
        serde_json::to_string(&self.to_wire()?).map_err(|e| SyncError::Wire(e.to_string()))
    }

    pub fn from_json(json: &str) -> SyncResult<Self> {
        let wire: SnapshotWire =
            serde_json::from_str(json).map_err(|e| SyncError::Wire(e.to_string()))?;
        Self::from_wire(wire)
    }
}

fn path_to_wire(path: &Path) -> SyncResult<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| SyncError::Wire(format!("path is not valid UTF-8: {}", path.display())))
}

/// Wire shape of a snapshot served by `/index`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotWire {
    #[serde(default)]
    pub files: BTreeMap<String, FileEntryWire>,
    #[serde(default)]
    pub dirs: BTreeMap<String, bool>,
}

/// Wire shape of a single file entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntryWire {
    pub name: String,
    #[serde(rename = "modTime")]
    pub mod_time: DateTime<Utc>,
    pub size: u64,
    pub hash: String,
}
