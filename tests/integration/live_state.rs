use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use treesync::reconcile;
use treesync::tree::path::canonicalize_path;
use treesync::watch::{ChangeEvent, DirectoryWatch, StateMaintainer};
use treesync::SnapshotBuilder;

use super::support::{shape, write_tree};

/// Registration bookkeeping without an OS watcher.
#[derive(Default)]
struct Registry {
    watched: BTreeSet<PathBuf>,
}

impl DirectoryWatch for Registry {
    fn watch_dir(&mut self, path: &Path) -> Result<(), notify::Error> {
        self.watched.insert(path.to_path_buf());
        Ok(())
    }

    fn unwatch_dir(&mut self, path: &Path) -> Result<(), notify::Error> {
        self.watched.remove(path);
        Ok(())
    }
}

#[test]
fn test_live_state_tracks_edits_like_a_fresh_build() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &["a/b"], &[("a/b/one.txt", "1"), ("top.txt", "t")]);
    let root = canonicalize_path(temp.path()).unwrap();

    let mut maintainer = StateMaintainer::new(&root, Registry::default()).unwrap();
    maintainer.initialize().unwrap();
    let state = maintainer.state();

    fs::create_dir(root.join("c")).unwrap();
    maintainer.apply(ChangeEvent::Created(root.join("c")));
    fs::write(root.join("c/two.txt"), "2").unwrap();
    maintainer.apply(ChangeEvent::Created(root.join("c/two.txt")));

    fs::write(root.join("top.txt"), "changed").unwrap();
    maintainer.apply(ChangeEvent::Modified(root.join("top.txt")));

    fs::remove_dir_all(root.join("a")).unwrap();
    maintainer.apply(ChangeEvent::Removed(root.join("a")));

    let live = state.snapshot();
    let built = SnapshotBuilder::new(&root).build().unwrap();
    assert_eq!(shape(&live), shape(&built));
    assert_eq!(
        live.file(&root.join("top.txt")).unwrap().content_hash,
        built.file(&root.join("top.txt")).unwrap().content_hash
    );
    assert!(reconcile(&live, &built).unwrap().is_empty());

    let watched = &maintainer.watcher().watched;
    assert!(watched.contains(&root.join("c")));
    assert!(!watched.contains(&root.join("a")));
    assert!(!watched.contains(&root.join("a/b")));
}

#[test]
fn test_directory_rename_without_destination_rescans_parent() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &["old/inner"], &[("old/inner/f.txt", "f")]);
    let root = canonicalize_path(temp.path()).unwrap();

    let mut maintainer = StateMaintainer::new(&root, Registry::default()).unwrap();
    maintainer.initialize().unwrap();

    fs::rename(root.join("old"), root.join("new")).unwrap();
    maintainer.apply(ChangeEvent::Renamed {
        from: root.join("old"),
        to: None,
    });

    let live = maintainer.state().snapshot();
    assert!(!live.contains_dir(&root.join("old")));
    assert!(!live.contains_file(&root.join("old/inner/f.txt")));
    assert!(live.contains_file(&root.join("new/inner/f.txt")));
    assert!(maintainer.watcher().watched.contains(&root.join("new/inner")));
    assert!(live.invariant_violations().is_empty());
}
