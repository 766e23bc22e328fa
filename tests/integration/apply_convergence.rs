use std::fs;

use tempfile::TempDir;
use treesync::reconcile::{ReconcileOptions, Reconciler};
use treesync::sync::{ActionApplier, DirectoryTransport, FsApplier, SyncCycle};
use treesync::{reconcile, SnapshotBuilder};

use super::support::{shape, write_tree};

fn directory_cycle(remote: &TempDir, options: ReconcileOptions) -> SyncCycle {
    SyncCycle::new(
        Box::new(DirectoryTransport::new(remote.path())),
        Box::new(FsApplier::new()),
        Reconciler::new(options),
    )
}

#[test]
fn test_applying_plan_then_rebuilding_matches_remote() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    write_tree(
        local.path(),
        &["gone/deeper", "kept", "was_dir"],
        &[
            ("gone/deeper/x.txt", "x"),
            ("kept/stale.txt", "stale"),
            ("was_file", "file"),
        ],
    );
    write_tree(
        remote.path(),
        &["kept", "fresh/nested", "was_file"],
        &[
            ("kept/new.txt", "new"),
            ("fresh/nested/deep.txt", "deep"),
            ("was_dir", "now a file"),
        ],
    );

    let local_before = SnapshotBuilder::new(local.path()).build().unwrap();
    let remote_snapshot = SnapshotBuilder::new(remote.path()).build().unwrap();
    let plan = reconcile(&local_before, &remote_snapshot).unwrap();
    FsApplier::new().apply(plan.actions()).unwrap();

    let local_after = SnapshotBuilder::new(local.path()).build().unwrap();
    assert_eq!(shape(&local_after), shape(&remote_snapshot));
    assert!(reconcile(&local_after, &remote_snapshot).unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_cycle_copies_contents_and_is_idempotent() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    write_tree(
        remote.path(),
        &["docs/empty"],
        &[("docs/readme.md", "# hello"), ("data.bin", "\u{0}\u{1}\u{2}")],
    );
    write_tree(local.path(), &[], &[("docs", "a file where a dir belongs")]);

    let cycle = directory_cycle(&remote, ReconcileOptions::default());
    let before = SnapshotBuilder::new(local.path()).build().unwrap();
    let report = cycle.run(&before).await.unwrap();
    assert_eq!(report.fetched, 2);

    assert_eq!(
        fs::read_to_string(local.path().join("docs/readme.md")).unwrap(),
        "# hello"
    );
    assert_eq!(fs::read(local.path().join("data.bin")).unwrap(), vec![0, 1, 2]);
    assert!(local.path().join("docs/empty").is_dir());

    let after = SnapshotBuilder::new(local.path()).build().unwrap();
    let remote_snapshot = SnapshotBuilder::new(remote.path()).build().unwrap();
    assert_eq!(shape(&after), shape(&remote_snapshot));
    assert!(cycle.run(&after).await.unwrap().is_noop());
}

#[tokio::test]
async fn test_content_comparison_refreshes_changed_files() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    write_tree(local.path(), &[], &[("notes.txt", "old text")]);
    write_tree(remote.path(), &[], &[("notes.txt", "new text")]);

    let presence_only = directory_cycle(&remote, ReconcileOptions::default());
    let snapshot = SnapshotBuilder::new(local.path()).build().unwrap();
    assert!(presence_only.run(&snapshot).await.unwrap().is_noop());
    assert_eq!(
        fs::read_to_string(local.path().join("notes.txt")).unwrap(),
        "old text"
    );

    let by_content = directory_cycle(
        &remote,
        ReconcileOptions {
            compare_content: true,
        },
    );
    let report = by_content.run(&snapshot).await.unwrap();
    assert_eq!(report.summary().update_files, 1);
    assert_eq!(
        fs::read_to_string(local.path().join("notes.txt")).unwrap(),
        "new text"
    );
}
