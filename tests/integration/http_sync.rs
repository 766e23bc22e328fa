use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use treesync::reconcile::Reconciler;
use treesync::server::{serve_on, AppState};
use treesync::sync::{FsApplier, HttpTransport, SyncCycle, Transport};
use treesync::{SnapshotBuilder, SyncError, SyncResult};

use super::support::{shape, write_tree};

struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<SyncResult<()>>,
}

impl RunningServer {
    async fn start(root: &Path) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, signal) = oneshot::channel::<()>();
        let state = AppState::new(root).unwrap();
        let task = tokio::spawn(serve_on(listener, state, async {
            let _ = signal.await;
        }));
        Self {
            addr,
            shutdown,
            task,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sync_over_http_mirrors_peer() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    write_tree(
        remote.path(),
        &["sub/empty"],
        &[
            ("sub/with space.txt", "spaced"),
            ("hash#name.txt", "hashed"),
            ("top.txt", "top"),
        ],
    );
    write_tree(local.path(), &["obsolete"], &[("obsolete/old.txt", "old")]);

    let server = RunningServer::start(remote.path()).await;
    let cycle = SyncCycle::new(
        Box::new(HttpTransport::new(&server.url()).unwrap()),
        Box::new(FsApplier::new()),
        Reconciler::default(),
    );

    let before = SnapshotBuilder::new(local.path()).build().unwrap();
    let report = cycle.run(&before).await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.summary().remove_dirs, 1);

    assert_eq!(
        fs::read_to_string(local.path().join("sub/with space.txt")).unwrap(),
        "spaced"
    );
    assert_eq!(
        fs::read_to_string(local.path().join("hash#name.txt")).unwrap(),
        "hashed"
    );
    assert!(!local.path().join("obsolete").exists());

    let after = SnapshotBuilder::new(local.path()).build().unwrap();
    let remote_snapshot = SnapshotBuilder::new(remote.path()).build().unwrap();
    assert_eq!(shape(&after), shape(&remote_snapshot));
    assert!(cycle.plan(&after).await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_remote_file_is_not_retryable() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let server = RunningServer::start(remote.path()).await;
    let transport = HttpTransport::new(&server.url()).unwrap();

    let err = transport
        .fetch_file(Path::new("absent.txt"), &local.path().join("absent.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Transport { retryable: false, .. }));
    assert!(!local.path().join("absent.txt").exists());

    server.stop().await;
}
