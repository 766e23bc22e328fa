use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use treesync::reconcile::{Action, Plan};
use treesync::tree::snapshot::FileEntry;
use treesync::Snapshot;

/// Root-relative directories (root itself excluded) and files of a snapshot.
pub fn shape(snapshot: &Snapshot) -> (BTreeSet<PathBuf>, BTreeSet<PathBuf>) {
    let root = snapshot.root().unwrap().to_path_buf();
    let dirs = snapshot
        .dirs()
        .iter()
        .filter(|d| **d != root)
        .map(|d| d.strip_prefix(&root).unwrap().to_path_buf())
        .collect();
    let files = snapshot
        .files()
        .keys()
        .map(|f| f.strip_prefix(&root).unwrap().to_path_buf())
        .collect();
    (dirs, files)
}

pub fn write_tree(root: &Path, dirs: &[&str], files: &[(&str, &str)]) {
    for dir in dirs {
        fs::create_dir_all(root.join(dir)).unwrap();
    }
    for (file, contents) in files {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

/// Apply `plan` to an in-memory copy of `local`, checking that every creation
/// lands in an existing parent directory.
pub fn simulate(local: &Snapshot, plan: &Plan, remote: &Snapshot) -> Snapshot {
    let mut result = local.clone();
    for action in plan.iter() {
        match action {
            Action::RemoveDir { path } => {
                result.remove_tree(path);
            }
            Action::RemoveFile { path } => {
                result.remove_file(path);
            }
            Action::CreateDir { path } => {
                let parent = path.parent().unwrap();
                assert!(result.contains_dir(parent), "mkdir {} before its parent", path.display());
                assert!(!result.contains_file(path), "mkdir {} over a file", path.display());
                result.insert_dir(path.clone());
            }
            Action::CreateFile { path, source } | Action::UpdateFile { path, source } => {
                let parent = path.parent().unwrap();
                assert!(result.contains_dir(parent), "touch {} before its parent", path.display());
                assert!(!result.contains_dir(path), "touch {} over a directory", path.display());
                let remote_entry = remote.file(source).unwrap();
                result.insert_file(FileEntry {
                    path: path.clone(),
                    ..remote_entry.clone()
                });
            }
        }
    }
    result
}
