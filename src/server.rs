//! Snapshot and file serving for peers.
//!
//! `GET /index` returns the wire-format snapshot of the served root, taken from the
//! live state when one is attached and built on demand otherwise. `GET /files/*path`
//! streams the bytes of a regular file addressed relative to the root.

use crate::error::{SyncError, SyncResult};
use crate::tree::builder::canonical_dir;
use crate::tree::path::sanitize_relative;
use crate::tree::snapshot::SnapshotWire;
use crate::tree::SnapshotBuilder;
use crate::watch::LiveState;
use axum::{
    body::Body,
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

/// Shared state for the handlers
#[derive(Clone)]
pub struct AppState {
    root: PathBuf,
    live: Option<LiveState>,
}

impl AppState {
    /// Serve `root`, building a fresh snapshot per `/index` request.
    pub fn new(root: impl AsRef<Path>) -> SyncResult<Self> {
        Ok(Self {
            root: canonical_dir(root.as_ref())?,
            live: None,
        })
    }

    /// Answer `/index` from the maintained live snapshot instead of rebuilding.
    pub fn with_live_state(mut self, live: LiveState) -> Self {
        self.live = Some(live);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

enum ServeError {
    Index(SyncError),
    BadPath(String),
    NotFound(PathBuf),
    Io(PathBuf, io::Error),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        match self {
            ServeError::Index(e) => {
                error!(error = %e, "Failed to build index");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build index").into_response()
            }
            ServeError::BadPath(raw) => {
                debug!(path = %raw, "Rejected file path");
                (StatusCode::BAD_REQUEST, "Invalid file path").into_response()
            }
            ServeError::NotFound(path) => {
                debug!(path = %path.display(), "File not found");
                (StatusCode::NOT_FOUND, "File not found").into_response()
            }
            ServeError::Io(path, e) => {
                error!(path = %path.display(), error = %e, "Failed to read file");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/index", get(get_index))
        .route("/files/*path", get(get_file))
        .with_state(state)
}

async fn get_index(State(state): State<AppState>) -> Result<Json<SnapshotWire>, ServeError> {
    debug!("Received request for /index");
    let snapshot = match &state.live {
        Some(live) => live.snapshot(),
        None => {
            let builder = SnapshotBuilder::new(state.root.clone());
            tokio::task::spawn_blocking(move || builder.build())
                .await
                .map_err(|e| ServeError::Index(SyncError::io(&state.root, io::Error::other(e))))?
                .map_err(ServeError::Index)?
        }
    };
    snapshot.to_wire().map(Json).map_err(ServeError::Index)
}

async fn get_file(
    State(state): State<AppState>,
    UrlPath(raw): UrlPath<String>,
) -> Result<Response, ServeError> {
    let relative = sanitize_relative(&raw).ok_or_else(|| ServeError::BadPath(raw.clone()))?;
    let (path, metadata) = resolve_regular_file(&state.root, &relative)
        .await?
        .ok_or_else(|| ServeError::BadPath(raw.clone()))?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ServeError::NotFound(path)),
        Err(e) => return Err(ServeError::Io(path, e)),
    };
    debug!(path = %path.display(), size = metadata.len(), "Serving file");

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
        ],
        body,
    )
        .into_response())
}

/// Walk `relative` under `root` one component at a time.
///
/// Symlinks are never part of a snapshot, so a symlink anywhere along the path is
/// treated as missing. Only a regular file at the end resolves.
async fn resolve_regular_file(
    root: &Path,
    relative: &Path,
) -> Result<Option<(PathBuf, std::fs::Metadata)>, ServeError> {
    let mut path = root.to_path_buf();
    let mut last = None;
    for component in relative.components() {
        if last.as_ref().is_some_and(|m: &std::fs::Metadata| !m.is_dir()) {
            return Err(ServeError::NotFound(path));
        }
        path.push(component);
        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ServeError::NotFound(path)),
            Err(e) => return Err(ServeError::Io(path, e)),
        };
        if metadata.file_type().is_symlink() {
            debug!(path = %path.display(), "Refusing to follow symlink");
            return Err(ServeError::NotFound(path));
        }
        last = Some(metadata);
    }
    match last {
        Some(metadata) if metadata.is_file() => Ok(Some((path, metadata))),
        Some(_) => Err(ServeError::NotFound(path)),
        None => Ok(None),
    }
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, state: AppState, shutdown: F) -> SyncResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| SyncError::io(state.root(), e))?;
    info!(addr = %addr, root = %state.root().display(), "Serving tree");
    let root = state.root.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SyncError::io(root, e))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> SyncResult<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| SyncError::Config(format!("failed to bind {addr}: {e}")))?;
    serve_on(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Snapshot;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::fs;
    use tower::util::ServiceExt;

    async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    fn served_tree() -> (tempfile::TempDir, Router) {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/a b.txt"), "spaced").unwrap();
        fs::write(temp.path().join("top.txt"), "top").unwrap();
        let app = router(AppState::new(temp.path()).unwrap());
        (temp, app)
    }

    #[tokio::test]
    async fn test_index_returns_wire_snapshot() {
        let (temp, app) = served_tree();
        let (status, body) = get(&app, "/index").await;
        assert_eq!(status, StatusCode::OK);

        let snapshot = Snapshot::from_json(std::str::from_utf8(&body).unwrap()).unwrap();
        let root = canonical_dir(temp.path()).unwrap();
        assert_eq!(snapshot.root().unwrap(), root.as_path());
        assert!(snapshot.contains_file(&root.join("sub/a b.txt")));
        assert!(snapshot.contains_dir(&root.join("sub")));
    }

    #[tokio::test]
    async fn test_index_prefers_live_state() {
        let temp = tempfile::tempdir().unwrap();
        let live = LiveState::new();
        let state = AppState::new(temp.path()).unwrap().with_live_state(live);
        fs::write(temp.path().join("unseen.txt"), "x").unwrap();

        let (status, body) = get(&router(state), "/index").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["files"].as_object().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_index_build_failure_is_500() {
        let temp = tempfile::tempdir().unwrap();
        let gone = temp.path().join("gone");
        fs::create_dir(&gone).unwrap();
        let app = router(AppState::new(&gone).unwrap());
        fs::remove_dir(&gone).unwrap();

        let (status, _) = get(&app, "/index").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_files_streams_bytes() {
        let (_temp, app) = served_tree();
        let (status, body) = get(&app, "/files/sub/a%20b.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"spaced");
    }

    #[tokio::test]
    async fn test_files_missing_or_directory_is_404() {
        let (_temp, app) = served_tree();
        assert_eq!(get(&app, "/files/nope.txt").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get(&app, "/files/sub").await.0, StatusCode::NOT_FOUND);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_files_never_follow_symlinks() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "outside").unwrap();
        let (temp, app) = served_tree();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            temp.path().join("sub/secret.txt"),
        )
        .unwrap();

        let (status, body) = get(&app, "/files/link/secret.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_ne!(body, b"outside");
        assert_eq!(
            get(&app, "/files/sub/secret.txt").await.0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(get(&app, "/files/top.txt").await.0, StatusCode::OK);
        assert_eq!(
            get(&app, "/files/top.txt/inner").await.0,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_files_rejects_escaping_paths() {
        let (_temp, app) = served_tree();
        assert_eq!(
            get(&app, "/files/..%2Fsecret").await.0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get(&app, "/files/sub/..%2F..%2Fsecret").await.0,
            StatusCode::BAD_REQUEST
        );
    }
}
