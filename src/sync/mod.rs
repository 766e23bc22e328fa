//! Peer synchronization: transports, action application, and the sync cycle.

mod applier;
mod cycle;
mod transport;

pub use applier::{ActionApplier, FsApplier};
pub use cycle::{SyncCycle, SyncReport};
pub use transport::{connect, DirectoryTransport, HttpTransport, Transport, DEFAULT_TIMEOUT};
