//! treesync: Directory Snapshots and Peer Synchronization
//!
//! Builds content-hashed snapshots of a directory tree, keeps a live snapshot current
//! from filesystem events, and reconciles a local tree against a peer's snapshot into
//! an ordered list of filesystem actions.

pub mod config;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod server;
pub mod sync;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod watch;

pub use error::{SyncError, SyncResult};
pub use reconcile::{reconcile, Action, Plan, Reconciler};
pub use tree::{Snapshot, SnapshotBuilder};
pub use watch::{LiveState, WatchDaemon};
