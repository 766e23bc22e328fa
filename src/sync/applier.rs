//! Applying reconciliation actions to the local filesystem.

use crate::error::{SyncError, SyncResult};
use crate::reconcile::Action;
use std::fs::{self, File, OpenOptions};
use std::io;
use tracing::{debug, info};

/// Executes actions in order
pub trait ActionApplier: Send + Sync {
    /// Apply `actions` in order, stopping at the first failure.
    ///
    /// Actions before the failing one stay applied; there is no rollback.
    fn apply(&self, actions: &[Action]) -> SyncResult<()>;

    /// True when actions are only reported, never executed.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// `std::fs` applier
#[derive(Debug, Clone, Default)]
pub struct FsApplier {
    dry_run: bool,
}

impl FsApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// An applier that logs each action instead of executing it.
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    fn apply_one(action: &Action) -> io::Result<()> {
        match action {
            Action::CreateDir { path } => fs::create_dir_all(path),
            Action::RemoveDir { path } => absent_is_ok(fs::remove_dir_all(path)),
            Action::CreateFile { path, .. } => File::create(path).map(drop),
            // Contents are replaced by the subsequent fetch; keep them until then.
            Action::UpdateFile { path, .. } => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(drop),
            Action::RemoveFile { path } => absent_is_ok(fs::remove_file(path)),
        }
    }
}

fn absent_is_ok(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl ActionApplier for FsApplier {
    fn apply(&self, actions: &[Action]) -> SyncResult<()> {
        for action in actions {
            if self.dry_run {
                info!(action = %action, "Dry run");
                continue;
            }
            Self::apply_one(action).map_err(|source| SyncError::Action {
                action: action.to_string(),
                source,
            })?;
            debug!(action = %action, "Applied");
        }
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
