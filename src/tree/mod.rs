//! Directory tree snapshots: hashing, canonical paths, the snapshot model, and the one-shot builder.

pub mod builder;
pub mod hasher;
pub mod path;
pub mod snapshot;

pub use builder::SnapshotBuilder;
pub use hasher::hash_file;
pub use snapshot::{FileEntry, Snapshot, SnapshotWire};
