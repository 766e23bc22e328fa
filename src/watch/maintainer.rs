//! Live snapshot maintenance
//!
//! [`StateMaintainer`] is the single writer of a [`LiveState`]. It applies one
//! [`ChangeEvent`] at a time, doing all filesystem I/O outside the write lock and
//! holding the lock only to mutate. Failures are per event: they are logged and the
//! event is skipped, never touching unrelated entries.

use super::events::ChangeEvent;
use crate::error::{SyncError, SyncResult};
use crate::tree::builder::{canonical_dir, read_file_entry};
use crate::tree::snapshot::{FileEntry, Snapshot};
use parking_lot::RwLock;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Shared handle to a live snapshot
///
/// Readers get copies or scoped read access; only the maintainer mutates.
#[derive(Clone, Default)]
pub struct LiveState {
    inner: Arc<RwLock<Snapshot>>,
}

impl LiveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep copy of the current snapshot, taken under the read lock.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().clone()
    }

    /// Run `f` against the current snapshot while holding the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&self.inner.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        f(&mut self.inner.write())
    }
}

/// Directory-scoped watch registration
pub trait DirectoryWatch {
    fn watch_dir(&mut self, path: &Path) -> Result<(), notify::Error>;
    fn unwatch_dir(&mut self, path: &Path) -> Result<(), notify::Error>;
}

#[derive(Default)]
struct Discovered {
    dirs: Vec<PathBuf>,
    files: Vec<FileEntry>,
}

/// Single writer for a watched tree's [`LiveState`]
pub struct StateMaintainer<W: DirectoryWatch> {
    root: PathBuf,
    state: LiveState,
    watch: W,
}

impl<W: DirectoryWatch> StateMaintainer<W> {
    pub fn new(root: impl AsRef<Path>, watch: W) -> SyncResult<Self> {
        Ok(Self {
            root: canonical_dir(root.as_ref())?,
            state: LiveState::new(),
            watch,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> LiveState {
        self.state.clone()
    }

    pub fn watcher(&self) -> &W {
        &self.watch
    }

    /// Populate the snapshot from a full walk and register every directory.
    ///
    /// Unreadable entries are logged and left out; only an unreadable root fails.
    pub fn initialize(&mut self) -> SyncResult<()> {
        fs::read_dir(&self.root).map_err(|e| SyncError::io(&self.root, e))?;
        self.state.write(|s| *s = Snapshot::new());

        let root = self.root.clone();
        let discovered = self.discover(&root, false);
        self.commit(discovered);

        let (files, dirs) = self.state.read(|s| (s.file_count(), s.dir_count()));
        info!(root = %self.root.display(), files, dirs, "Live state initialized");
        Ok(())
    }

    /// Apply one filesystem event.
    pub fn apply(&mut self, event: ChangeEvent) {
        if !event.path().starts_with(&self.root) {
            debug!(path = %event.path().display(), "Ignoring event outside watched root");
            return;
        }
        debug!(kind = event.kind(), path = %event.path().display(), "Applying change event");

        match event {
            ChangeEvent::Created(path) => self.on_created(&path),
            ChangeEvent::Modified(path) => self.on_modified(&path),
            ChangeEvent::Removed(path) => self.on_removed(&path),
            ChangeEvent::Renamed { from, to } => self.on_renamed(&from, to.as_deref()),
        }
    }

    fn on_created(&mut self, path: &Path) {
        let Some(metadata) = self.stat(path, "created") else {
            return;
        };
        if metadata.is_dir() {
            let discovered = self.discover(path, true);
            self.commit(discovered);
            info!(path = %path.display(), "Directory created");
        } else if metadata.is_file() {
            self.refresh_file(path, &metadata);
        } else {
            debug!(path = %path.display(), "Ignoring non-regular entry");
        }
    }

    fn on_modified(&mut self, path: &Path) {
        let Some(metadata) = self.stat(path, "modified") else {
            return;
        };
        if metadata.is_dir() {
            if self.state.read(|s| s.contains_dir(path)) {
                return;
            }
            debug!(path = %path.display(), "Modify event for unknown directory, treating as create");
            let discovered = self.discover(path, true);
            self.commit(discovered);
        } else if metadata.is_file() {
            if !self.state.read(|s| s.contains_file(path)) {
                debug!(path = %path.display(), "Modify event for unknown file, treating as create");
            }
            self.refresh_file(path, &metadata);
        }
    }

    fn on_removed(&mut self, path: &Path) {
        let removed = self.state.write(|s| s.remove_path(path));
        if removed.is_empty() {
            debug!(path = %path.display(), "Remove event for unknown path");
            return;
        }
        self.unwatch_all(&removed.dirs);
        info!(
            path = %path.display(),
            dirs = removed.dirs.len(),
            files = removed.files.len(),
            "Removed entries"
        );
    }

    fn on_renamed(&mut self, from: &Path, to: Option<&Path>) {
        self.on_removed(from);

        if let Some(to) = to {
            if to.starts_with(&self.root) {
                self.on_created(to);
            } else {
                debug!(to = %to.display(), "Rename destination outside watched root");
            }
            return;
        }

        // Destination unknown: re-walk the old parent to pick up the new name.
        let Some(parent) = from.parent() else {
            return;
        };
        if !parent.starts_with(&self.root) || !parent.is_dir() {
            debug!(parent = %parent.display(), "Rename parent not rescannable");
            return;
        }
        let discovered = self.discover(parent, true);
        let found = discovered.dirs.len() + discovered.files.len();
        self.commit(discovered);
        info!(from = %from.display(), rescanned = %parent.display(), found, "Rename processed");
    }

    fn stat(&self, path: &Path, context: &str) -> Option<Metadata> {
        match fs::symlink_metadata(path) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    event = context,
                    error = %e,
                    "Failed to stat path, skipping event"
                );
                None
            }
        }
    }

    fn refresh_file(&mut self, path: &Path, metadata: &Metadata) {
        match read_file_entry(path, metadata) {
            Ok(entry) => {
                debug!(path = %path.display(), hash = %entry.content_hash, size = entry.size, "File updated");
                let displaced = self.state.write(|s| s.replace_with_file(entry));
                if !displaced.dirs.is_empty() {
                    info!(path = %path.display(), dirs = displaced.dirs.len(), "File replaced directory");
                    self.unwatch_all(&displaced.dirs);
                }
            }
            Err(e) => warn_io(path, &e, "Failed to hash file, skipping event"),
        }
    }

    /// Walk `start` and collect entries, registering each new directory as soon as
    /// it is reached so that changes made during the walk still produce events.
    ///
    /// With `skip_known`, files already in the snapshot are not re-hashed and known
    /// subdirectories are not descended into.
    fn discover(&mut self, start: &Path, skip_known: bool) -> Discovered {
        let known = self.state.inner.read();
        let mut discovered = Discovered::default();

        let mut walker = WalkDir::new(start).follow_links(false).into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| start.to_path_buf());
                    warn_io(&path, &io::Error::from(e), "Failed to read entry during scan");
                    continue;
                }
            };
            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if known.contains_dir(path) {
                    if skip_known && entry.depth() > 0 {
                        walker.skip_current_dir();
                    }
                    continue;
                }
                register(&mut self.watch, path);
                discovered.dirs.push(path.to_path_buf());
            } else if file_type.is_file() {
                if skip_known && known.contains_file(path) {
                    continue;
                }
                let read = entry
                    .metadata()
                    .map_err(io::Error::from)
                    .and_then(|metadata| read_file_entry(path, &metadata));
                match read {
                    Ok(file) => discovered.files.push(file),
                    Err(e) => warn_io(path, &e, "Failed to hash file during scan"),
                }
            }
        }
        discovered
    }

    /// Record discovered entries. Directories are recorded whether or not their
    /// watch registration succeeded.
    fn commit(&mut self, discovered: Discovered) {
        let displaced = self.state.write(|s| {
            for dir in discovered.dirs {
                s.insert_dir(dir);
            }
            let mut displaced = Vec::new();
            for file in discovered.files {
                displaced.extend(s.replace_with_file(file).dirs);
            }
            displaced
        });
        self.unwatch_all(&displaced);
    }

    fn unwatch_all(&mut self, dirs: &[PathBuf]) {
        for dir in dirs {
            if let Err(e) = self.watch.unwatch_dir(dir) {
                debug!(path = %dir.display(), error = %e, "Failed to unwatch removed directory");
            }
        }
    }
}

fn register<W: DirectoryWatch>(watch: &mut W, dir: &Path) {
    match watch.watch_dir(dir) {
        Ok(()) => debug!(path = %dir.display(), "Watching directory"),
        Err(source) => {
            let err = SyncError::WatchRegistration {
                path: dir.to_path_buf(),
                source,
            };
            warn!(error = %err, "Directory recorded without a watch");
        }
    }
}

fn warn_io(path: &Path, err: &io::Error, message: &str) {
    warn!(path = %path.display(), error = %err, "{}", message);
}
