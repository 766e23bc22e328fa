//! Watch daemon and runtime logic.

use super::events::{ChangeEvent, WatchConfig};
use super::maintainer::{DirectoryWatch, LiveState, StateMaintainer};
use crate::error::{SyncError, SyncResult};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// `notify` watcher registered one directory at a time
pub struct NotifyWatch {
    inner: RecommendedWatcher,
}

impl DirectoryWatch for NotifyWatch {
    fn watch_dir(&mut self, path: &Path) -> Result<(), notify::Error> {
        self.inner.watch(path, RecursiveMode::NonRecursive)
    }

    fn unwatch_dir(&mut self, path: &Path) -> Result<(), notify::Error> {
        self.inner.unwatch(path)
    }
}

/// Watch mode daemon
pub struct WatchDaemon;

impl WatchDaemon {
    /// Initialize live state for `config.root` and start consuming events.
    ///
    /// The initial walk runs on the calling thread, so the returned handle's state is
    /// already populated. Events are then drained on a dedicated thread, the only
    /// writer of the state; watcher errors are drained on a second thread.
    pub fn spawn(config: WatchConfig) -> SyncResult<WatchHandle> {
        let (event_tx, event_rx) = mpsc::channel::<notify::Event>();
        let (error_tx, error_rx) = mpsc::channel::<notify::Error>();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let sent = match res {
                Ok(event) => event_tx.send(event).is_ok(),
                Err(e) => error_tx.send(e).is_ok(),
            };
            if !sent {
                error!("Watch channel closed, dropping notification");
            }
        })
        .map_err(|source| SyncError::WatchRegistration {
            path: config.root.clone(),
            source,
        })?;

        let mut maintainer = StateMaintainer::new(&config.root, NotifyWatch { inner: watcher })?;
        maintainer.initialize()?;
        let state = maintainer.state();
        let running = Arc::new(RwLock::new(true));

        let error_thread = thread::Builder::new()
            .name("treesync-watch-errors".to_string())
            .spawn(move || {
                for err in error_rx {
                    warn!(error = %err, paths = ?err.paths, "Watch error");
                }
            })
            .map_err(|e| SyncError::io(&config.root, e))?;

        let event_running = Arc::clone(&running);
        let poll_interval = config.poll_interval;
        let event_thread = thread::Builder::new()
            .name("treesync-watch-events".to_string())
            .spawn(move || {
                info!(root = %maintainer.root().display(), "Watching tree");
                loop {
                    if !*event_running.read() {
                        break;
                    }
                    match event_rx.recv_timeout(poll_interval) {
                        Ok(event) => {
                            if let Some(change) = ChangeEvent::from_notify(event) {
                                maintainer.apply(change);
                            }
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {}
                        Err(mpsc::RecvTimeoutError::Disconnected) => {
                            error!("Watcher channel disconnected");
                            break;
                        }
                    }
                }
                // Dropping the maintainer drops the watcher, closing the error channel.
                drop(maintainer);
                info!("Watch loop stopped");
            })
            .map_err(|e| SyncError::io(&config.root, e))?;

        Ok(WatchHandle {
            state,
            running,
            threads: vec![event_thread, error_thread],
        })
    }
}

/// Running watch daemon
pub struct WatchHandle {
    state: LiveState,
    running: Arc<RwLock<bool>>,
    threads: Vec<JoinHandle<()>>,
}

impl WatchHandle {
    /// Read handle on the live snapshot.
    pub fn state(&self) -> LiveState {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Ask the event loop to exit after its current event.
    pub fn stop(&self) {
        *self.running.write() = false;
    }

    /// Stop and wait for both threads to finish.
    pub fn join(mut self) {
        self.stop();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("Watch thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};

    fn wait_for(state: &LiveState, check: impl Fn(&crate::tree::Snapshot) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if state.read(&check) {
                return true;
            }
            thread::sleep(Duration::from_millis(50));
        }
        false
    }

    #[test]
    fn test_daemon_tracks_live_changes() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("seed.txt"), "seed").unwrap();

        let mut config = WatchConfig::new(temp.path());
        config.poll_interval = Duration::from_millis(20);
        let handle = WatchDaemon::spawn(config).unwrap();
        let state = handle.state();
        let root = crate::tree::path::canonicalize_path(temp.path()).unwrap();

        assert!(state.read(|s| s.contains_file(&root.join("seed.txt"))));

        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/new.txt"), "new").unwrap();
        assert!(wait_for(&state, |s| s.contains_file(&root.join("sub/new.txt"))));

        fs::remove_dir_all(root.join("sub")).unwrap();
        assert!(wait_for(&state, |s| !s.contains_dir(&root.join("sub"))
            && !s.contains_file(&root.join("sub/new.txt"))));

        handle.join();
    }

    #[test]
    fn test_spawn_on_missing_root_fails() {
        let temp = tempfile::tempdir().unwrap();
        assert!(WatchDaemon::spawn(WatchConfig::new(temp.path().join("missing"))).is_err());
    }
}
