//! Reconciliation actions and ordered plans.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// One filesystem operation against the local tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Remove a directory and everything below it.
    RemoveDir { path: PathBuf },
    RemoveFile { path: PathBuf },
    CreateDir { path: PathBuf },
    /// Create an empty file; its content is fetched from `source` on the peer.
    CreateFile { path: PathBuf, source: PathBuf },
    /// Existing file whose content differs from `source` on the peer.
    UpdateFile { path: PathBuf, source: PathBuf },
}

impl Action {
    /// The local path this action touches.
    pub fn path(&self) -> &Path {
        match self {
            Action::RemoveDir { path }
            | Action::RemoveFile { path }
            | Action::CreateDir { path }
            | Action::CreateFile { path, .. }
            | Action::UpdateFile { path, .. } => path,
        }
    }

    /// Remote path whose bytes must be fetched after this action is applied.
    pub fn fetch_source(&self) -> Option<&Path> {
        match self {
            Action::CreateFile { source, .. } | Action::UpdateFile { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Position of this action's category in a plan.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Action::RemoveDir { .. } => 0,
            Action::RemoveFile { .. } => 1,
            Action::CreateDir { .. } => 2,
            Action::CreateFile { .. } => 3,
            Action::UpdateFile { .. } => 4,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RemoveDir { path } => write!(f, "rm -r {}", path.display()),
            Action::RemoveFile { path } => write!(f, "rm {}", path.display()),
            Action::CreateDir { path } => write!(f, "mkdir {}", path.display()),
            Action::CreateFile { path, .. } | Action::UpdateFile { path, .. } => {
                write!(f, "touch {}", path.display())
            }
        }
    }
}

/// Action counts per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub remove_dirs: usize,
    pub remove_files: usize,
    pub create_dirs: usize,
    pub create_files: usize,
    pub update_files: usize,
}

/// Ordered list of actions that converges the local tree toward the remote tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    actions: Vec<Action>,
}

impl Plan {
    pub(crate) fn from_ordered(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Shell-command rendering of every action, in order.
    pub fn commands(&self) -> Vec<String> {
        self.actions.iter().map(ToString::to_string).collect()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action {
                Action::RemoveDir { .. } => summary.remove_dirs += 1,
                Action::RemoveFile { .. } => summary.remove_files += 1,
                Action::CreateDir { .. } => summary.create_dirs += 1,
                Action::CreateFile { .. } => summary.create_files += 1,
                Action::UpdateFile { .. } => summary.update_files += 1,
            }
        }
        summary
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
