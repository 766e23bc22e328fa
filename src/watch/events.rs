//! Watch events and configuration.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::path::PathBuf;
use std::time::Duration;

/// Watch mode configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Root directory of the watched tree
    pub root: PathBuf,
    /// How often the event loop checks for a stop request while idle
    pub poll_interval: Duration,
}

impl WatchConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// Filesystem change event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    /// `from` left existence. `to` is known only when the platform pairs both names.
    Renamed { from: PathBuf, to: Option<PathBuf> },
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Created(_) => "created",
            ChangeEvent::Modified(_) => "modified",
            ChangeEvent::Removed(_) => "removed",
            ChangeEvent::Renamed { .. } => "renamed",
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            ChangeEvent::Created(p) | ChangeEvent::Modified(p) | ChangeEvent::Removed(p) => p,
            ChangeEvent::Renamed { from, .. } => from,
        }
    }

    /// Translate a `notify` event; access and metadata-less events yield `None`.
    pub fn from_notify(event: Event) -> Option<ChangeEvent> {
        let mut paths = event.paths.into_iter();
        let first = paths.next()?;
        match event.kind {
            EventKind::Create(_) => Some(ChangeEvent::Created(first)),
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => Some(ChangeEvent::Renamed {
                    from: first,
                    to: None,
                }),
                RenameMode::To => Some(ChangeEvent::Created(first)),
                RenameMode::Both => Some(ChangeEvent::Renamed {
                    from: first,
                    to: paths.next(),
                }),
                RenameMode::Any | RenameMode::Other => {
                    if first.symlink_metadata().is_ok() {
                        Some(ChangeEvent::Created(first))
                    } else {
                        Some(ChangeEvent::Renamed {
                            from: first,
                            to: None,
                        })
                    }
                }
            },
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(ChangeEvent::Modified(first)),
            EventKind::Remove(_) => Some(ChangeEvent::Removed(first)),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}
