use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use treesync::reconcile::{Action, ReconcileOptions, Reconciler};
use treesync::tree::snapshot::FileEntry;
use treesync::types::ContentHash;
use treesync::{reconcile, Snapshot};

use super::support::{shape, simulate};

/// A tree as root-relative entries; `true` marks a directory.
fn tree_strategy() -> impl Strategy<Value = Vec<(Vec<String>, bool, u8)>> {
    let segment = prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(str::to_string);
    prop::collection::vec(
        (prop::collection::vec(segment, 1..4), any::<bool>(), any::<u8>()),
        0..12,
    )
}

/// Materialize entries under `root`; any path that is a prefix of another becomes a directory.
fn snapshot_at(root: &str, entries: &[(Vec<String>, bool, u8)]) -> Snapshot {
    let root = PathBuf::from(root);
    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
    dirs.insert(root.clone());
    for (segments, is_dir, _) in entries {
        let mut path = root.clone();
        for (i, segment) in segments.iter().enumerate() {
            path.push(segment);
            if i + 1 < segments.len() || *is_dir {
                dirs.insert(path.clone());
            }
        }
    }

    let mut snapshot = Snapshot::new();
    for dir in &dirs {
        snapshot.insert_dir(dir.clone());
    }
    for (segments, is_dir, seed) in entries {
        let path: PathBuf = segments.iter().fold(root.clone(), |p, s| p.join(s));
        if *is_dir || dirs.contains(&path) {
            continue;
        }
        snapshot.insert_file(FileEntry {
            path,
            mod_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            size: *seed as u64,
            content_hash: ContentHash([*seed; 32]),
        });
    }
    assert!(snapshot.invariant_violations().is_empty());
    snapshot
}

proptest! {
    #[test]
    fn test_reconcile_with_self_is_empty(entries in tree_strategy()) {
        let a = snapshot_at("/R", &entries);
        prop_assert!(reconcile(&a, &a).unwrap().is_empty());

        let mirrored = snapshot_at("/L", &entries);
        let full = Reconciler::new(ReconcileOptions { compare_content: true });
        prop_assert!(full.reconcile(&mirrored, &a).unwrap().is_empty());
    }

    #[test]
    fn test_applied_plan_reaches_remote_shape(
        local_entries in tree_strategy(),
        remote_entries in tree_strategy(),
    ) {
        let local = snapshot_at("/L", &local_entries);
        let remote = snapshot_at("/R", &remote_entries);

        let plan = reconcile(&local, &remote).unwrap();
        let after = simulate(&local, &plan, &remote);

        prop_assert_eq!(shape(&after), shape(&remote));
        prop_assert!(after.invariant_violations().is_empty());
        prop_assert!(reconcile(&after, &remote).unwrap().is_empty());
    }

    #[test]
    fn test_plan_has_no_redundant_removals(
        local_entries in tree_strategy(),
        remote_entries in tree_strategy(),
    ) {
        let local = snapshot_at("/L", &local_entries);
        let remote = snapshot_at("/R", &remote_entries);
        let plan = reconcile(&local, &remote).unwrap();

        let removed_dirs: Vec<&Path> = plan
            .iter()
            .filter_map(|a| match a {
                Action::RemoveDir { path } => Some(path.as_path()),
                _ => None,
            })
            .collect();
        for action in plan.iter() {
            if let Action::RemoveDir { path } | Action::RemoveFile { path } = action {
                let nested = removed_dirs
                    .iter()
                    .any(|dir| path.as_path() != *dir && path.starts_with(dir));
                prop_assert!(!nested, "{} is under a removed directory", path.display());
            }
        }
    }
}

#[test]
fn test_root_inference_picks_shallowest_directory() {
    let mut snapshot = Snapshot::new();
    for dir in ["/a", "/a/b", "/a/b/c"] {
        snapshot.insert_dir(PathBuf::from(dir));
    }
    assert_eq!(snapshot.root().unwrap(), Path::new("/a"));
}

#[test]
fn test_plan_renders_in_apply_order() {
    let local = snapshot_at("/L", &[(vec!["old.txt".to_string()], false, 1)]);
    let remote = snapshot_at(
        "/R",
        &[
            (vec!["sub".to_string()], true, 0),
            (vec!["f.txt".to_string()], false, 2),
        ],
    );

    let plan = reconcile(&local, &remote).unwrap();
    assert_eq!(
        plan.commands(),
        vec!["rm /L/old.txt", "mkdir /L/sub", "touch /L/f.txt"]
    );
}
