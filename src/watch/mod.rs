//! Live tree state: filesystem events, the single-writer maintainer, and the watch daemon.

mod events;
mod maintainer;
mod runtime;

pub use events::{ChangeEvent, WatchConfig};
pub use maintainer::{DirectoryWatch, LiveState, StateMaintainer};
pub use runtime::{NotifyWatch, WatchDaemon, WatchHandle};
