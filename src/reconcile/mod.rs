//! Snapshot Reconciliation
//!
//! Diffs a local snapshot against a remote snapshot and produces the ordered
//! [`Plan`] that converges the local tree toward the remote one. Reconciliation is
//! pure: it reads two materialized snapshots and performs no I/O.
//!
//! Files are compared by presence only unless [`ReconcileOptions::compare_content`]
//! is set, in which case files present on both sides with differing content hashes
//! are scheduled for update.

mod action;
mod mapper;

pub use action::{Action, Plan, PlanSummary};
pub use mapper::PathMapper;

use crate::error::SyncResult;
use crate::tree::path::depth;
use crate::tree::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

/// Reconciliation options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Schedule `UpdateFile` for files whose content hash differs on both sides.
    #[serde(default)]
    pub compare_content: bool,
}

/// Computes reconciliation plans
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Diff `local` against `remote`.
    ///
    /// Fails without a partial plan if either root cannot be inferred or any path
    /// is not rooted under its snapshot's root.
    pub fn reconcile(&self, local: &Snapshot, remote: &Snapshot) -> SyncResult<Plan> {
        let mapper = PathMapper::from_snapshots(local, remote)?;

        let (dir_actions, file_actions) = rayon::join(
            || diff_dirs(local, remote, &mapper),
            || diff_files(local, remote, &mapper, self.options.compare_content),
        );
        let mut actions = dir_actions?;
        actions.extend(file_actions?);

        let actions = order(prune_nested_removals(actions));
        debug!(
            local_root = %mapper.local_root().display(),
            remote_root = %mapper.remote_root().display(),
            actions = actions.len(),
            "Reconciled snapshots"
        );
        Ok(Plan::from_ordered(actions))
    }
}

/// Reconcile with default options (presence-only comparison).
pub fn reconcile(local: &Snapshot, remote: &Snapshot) -> SyncResult<Plan> {
    Reconciler::default().reconcile(local, remote)
}

fn diff_dirs(local: &Snapshot, remote: &Snapshot, mapper: &PathMapper) -> SyncResult<Vec<Action>> {
    let mut actions = Vec::new();
    for dir in remote.dirs() {
        let local_dir = mapper.to_local(dir)?;
        if !local.contains_dir(&local_dir) {
            actions.push(Action::CreateDir { path: local_dir });
        }
    }
    for dir in local.dirs() {
        if !remote.contains_dir(&mapper.to_remote(dir)?) {
            actions.push(Action::RemoveDir { path: dir.clone() });
        }
    }
    Ok(actions)
}

fn diff_files(
    local: &Snapshot,
    remote: &Snapshot,
    mapper: &PathMapper,
    compare_content: bool,
) -> SyncResult<Vec<Action>> {
    let mut actions = Vec::new();
    for (remote_path, remote_entry) in remote.files() {
        let local_path = mapper.to_local(remote_path)?;
        match local.file(&local_path) {
            None => actions.push(Action::CreateFile {
                path: local_path,
                source: remote_path.clone(),
            }),
            Some(local_entry)
                if compare_content && local_entry.content_hash != remote_entry.content_hash =>
            {
                actions.push(Action::UpdateFile {
                    path: local_path,
                    source: remote_path.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for local_path in local.files().keys() {
        if !remote.contains_file(&mapper.to_remote(local_path)?) {
            actions.push(Action::RemoveFile {
                path: local_path.clone(),
            });
        }
    }
    Ok(actions)
}

/// Drop removals already covered by the recursive removal of an ancestor directory.
fn prune_nested_removals(actions: Vec<Action>) -> Vec<Action> {
    let removed_dirs: BTreeSet<PathBuf> = actions
        .iter()
        .filter_map(|a| match a {
            Action::RemoveDir { path } => Some(path.clone()),
            _ => None,
        })
        .collect();
    if removed_dirs.is_empty() {
        return actions;
    }

    actions
        .into_iter()
        .filter(|action| match action {
            Action::RemoveDir { path } | Action::RemoveFile { path } => !path
                .ancestors()
                .skip(1)
                .any(|ancestor| removed_dirs.contains(ancestor)),
            _ => true,
        })
        .collect()
}

/// Deletions before creations; shallow before deep within each category.
fn order(mut actions: Vec<Action>) -> Vec<Action> {
    actions.sort_by(|a, b| {
        (a.rank(), depth(a.path()), a.path()).cmp(&(b.rank(), depth(b.path()), b.path()))
    });
    actions
}
